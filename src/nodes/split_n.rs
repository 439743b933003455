use super::fan_out::{split_loop, FanOut};
use crate::core::{
    Closeable, Node, NodeId, OwnerLink, PortId, ReadEndpoint, Readable, WriteEndpoint,
};
use crate::observability::NodeMetrics;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Copies every input message to each registered output.
/// Concurrent fan-out unless configured otherwise.
pub struct SplitN {
    id: NodeId,
    link: OwnerLink,
    pub input: ReadEndpoint,
    outputs: Vec<WriteEndpoint>,
    fan_out: FanOut,
    metrics: Arc<NodeMetrics>,
}

impl SplitN {
    pub fn new(id: impl Into<NodeId>) -> Self {
        let id = id.into();
        Self {
            input: ReadEndpoint::new(id.clone(), "in"),
            outputs: Vec::new(),
            fan_out: FanOut::Concurrent,
            metrics: Arc::new(NodeMetrics::new(id.clone())),
            link: OwnerLink::new(),
            id,
        }
    }

    pub fn with_fan_out(mut self, fan_out: FanOut) -> Self {
        self.fan_out = fan_out;
        self
    }

    pub fn fan_out(&self) -> FanOut {
        self.fan_out
    }

    /// Register another output port
    pub fn add_output(&mut self, port: impl Into<PortId>) -> &WriteEndpoint {
        let index = self.outputs.len();
        self.outputs.push(WriteEndpoint::new(self.id.clone(), port));
        &self.outputs[index]
    }

    pub fn get_output(&self, port: &str) -> Option<&WriteEndpoint> {
        self.outputs.iter().find(|output| output.port().port.as_str() == port)
    }

    pub fn outputs(&self) -> &[WriteEndpoint] {
        &self.outputs
    }
}

#[async_trait]
impl Node for SplitN {
    fn id(&self) -> &NodeId {
        &self.id
    }

    fn link(&self) -> &OwnerLink {
        &self.link
    }

    async fn run(&self) -> Result<()> {
        let input = self.input.take_receiver()?;
        let outputs: Vec<&WriteEndpoint> = self.outputs.iter().collect();
        split_loop(&self.id, input, &outputs, self.fan_out, &self.metrics).await
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

impl Readable for SplitN {
    fn input(&self) -> &ReadEndpoint {
        &self.input
    }
}

impl Closeable for SplitN {
    fn close(&self) {
        for output in &self.outputs {
            output.close();
        }
    }
}
