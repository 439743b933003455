use super::fan_out::{split_loop, FanOut};
use crate::core::{Closeable, Node, NodeId, OwnerLink, ReadEndpoint, Readable, WriteEndpoint};
use crate::observability::NodeMetrics;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Copies every input message to `out_a` and `out_b`.
/// The forwarding discipline is chosen by the caller.
pub struct SplitTwo {
    id: NodeId,
    link: OwnerLink,
    pub input: ReadEndpoint,
    pub out_a: WriteEndpoint,
    pub out_b: WriteEndpoint,
    fan_out: FanOut,
    metrics: Arc<NodeMetrics>,
}

impl SplitTwo {
    pub fn new(id: impl Into<NodeId>, fan_out: FanOut) -> Self {
        let id = id.into();
        Self {
            input: ReadEndpoint::new(id.clone(), "in"),
            out_a: WriteEndpoint::new(id.clone(), "out_a"),
            out_b: WriteEndpoint::new(id.clone(), "out_b"),
            fan_out,
            metrics: Arc::new(NodeMetrics::new(id.clone())),
            link: OwnerLink::new(),
            id,
        }
    }

    pub fn fan_out(&self) -> FanOut {
        self.fan_out
    }
}

#[async_trait]
impl Node for SplitTwo {
    fn id(&self) -> &NodeId {
        &self.id
    }

    fn link(&self) -> &OwnerLink {
        &self.link
    }

    async fn run(&self) -> Result<()> {
        let input = self.input.take_receiver()?;
        split_loop(
            &self.id,
            input,
            &[&self.out_a, &self.out_b],
            self.fan_out,
            &self.metrics,
        )
        .await
    }

    fn as_readable(&self) -> Option<&dyn Readable> {
        Some(self)
    }

    fn as_closeable(&self) -> Option<&dyn Closeable> {
        Some(self)
    }

    fn metrics(&self) -> Option<Arc<NodeMetrics>> {
        Some(self.metrics.clone())
    }
}

impl Readable for SplitTwo {
    fn input(&self) -> &ReadEndpoint {
        &self.input
    }
}

impl Closeable for SplitTwo {
    fn close(&self) {
        self.out_a.close();
        self.out_b.close();
    }
}
