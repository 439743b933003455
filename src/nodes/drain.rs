use crate::core::{Node, NodeId, OwnerLink, ReadEndpoint, Readable};
use crate::observability::NodeMetrics;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Discards everything it receives, so an unused branch never backs up its sender
pub struct Drain {
    id: NodeId,
    link: OwnerLink,
    pub input: ReadEndpoint,
    metrics: Arc<NodeMetrics>,
}

impl Drain {
    pub fn new(id: impl Into<NodeId>) -> Self {
        let id = id.into();
        Self {
            input: ReadEndpoint::new(id.clone(), "in"),
            metrics: Arc::new(NodeMetrics::new(id.clone())),
            link: OwnerLink::new(),
            id,
        }
    }
}

#[async_trait]
impl Node for Drain {
    fn id(&self) -> &NodeId {
        &self.id
    }

    fn link(&self) -> &OwnerLink {
        &self.link
    }

    async fn run(&self) -> Result<()> {
        let mut input = self.input.take_receiver()?;
        while input.recv().await.is_some() {
            self.metrics.record_received();
        }
        tracing::debug!(node = %self.id, drained = self.metrics.messages_received(), "drain input closed");
        Ok(())
    }

    fn as_readable(&self) -> Option<&dyn Readable> {
        Some(self)
    }

    fn metrics(&self) -> Option<Arc<NodeMetrics>> {
        Some(self.metrics.clone())
    }
}

impl Readable for Drain {
    fn input(&self) -> &ReadEndpoint {
        &self.input
    }
}
