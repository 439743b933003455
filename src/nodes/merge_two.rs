use crate::core::{Closeable, Msg, Node, NodeId, OwnerLink, ReadEndpoint, Writable, WriteEndpoint};
use crate::observability::NodeMetrics;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Fan-in of two streams.
///
/// Per-source order is kept, the interleaving between `in_a` and `in_b` is
/// not. Returns once both inputs are closed.
pub struct MergeTwo {
    id: NodeId,
    link: OwnerLink,
    pub in_a: ReadEndpoint,
    pub in_b: ReadEndpoint,
    pub out: WriteEndpoint,
    metrics: Arc<NodeMetrics>,
}

impl MergeTwo {
    pub fn new(id: impl Into<NodeId>) -> Self {
        let id = id.into();
        Self {
            in_a: ReadEndpoint::new(id.clone(), "in_a"),
            in_b: ReadEndpoint::new(id.clone(), "in_b"),
            out: WriteEndpoint::new(id.clone(), "out"),
            metrics: Arc::new(NodeMetrics::new(id.clone())),
            link: OwnerLink::new(),
            id,
        }
    }

    async fn forward(&self, msg: Msg) -> Result<()> {
        self.metrics.record_received();
        self.out.send(msg).await?;
        self.metrics.record_forwarded();
        Ok(())
    }
}

#[async_trait]
impl Node for MergeTwo {
    fn id(&self) -> &NodeId {
        &self.id
    }

    fn link(&self) -> &OwnerLink {
        &self.link
    }

    async fn run(&self) -> Result<()> {
        let mut a = self.in_a.take_receiver()?;
        let mut b = self.in_b.take_receiver()?;
        let (mut a_open, mut b_open) = (true, true);

        while a_open || b_open {
            tokio::select! {
                next = a.recv(), if a_open => match next {
                    Some(msg) => self.forward(msg).await?,
                    None => a_open = false,
                },
                next = b.recv(), if b_open => match next {
                    Some(msg) => self.forward(msg).await?,
                    None => b_open = false,
                },
            }
        }

        tracing::debug!(node = %self.id, forwarded = self.metrics.messages_forwarded(), "merge inputs closed");
        Ok(())
    }

    fn as_writable(&self) -> Option<&dyn Writable> {
        Some(self)
    }

    fn as_closeable(&self) -> Option<&dyn Closeable> {
        Some(self)
    }

    fn metrics(&self) -> Option<Arc<NodeMetrics>> {
        Some(self.metrics.clone())
    }
}

impl Writable for MergeTwo {
    fn output(&self) -> &WriteEndpoint {
        &self.out
    }
}

impl Closeable for MergeTwo {
    fn close(&self) {
        self.out.close();
    }
}
