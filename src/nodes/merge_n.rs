use super::fan_out::settle;
use crate::core::{
    BondError, Closeable, Node, NodeId, OwnerLink, PortId, ReadEndpoint, Writable, WriteEndpoint,
};
use crate::observability::NodeMetrics;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::task::JoinSet;

/// Fan-in of any number of streams, one forwarder task per input.
///
/// Inputs must be registered before the node is shared and started.
pub struct MergeN {
    id: NodeId,
    link: OwnerLink,
    inputs: Vec<ReadEndpoint>,
    out: Arc<WriteEndpoint>,
    metrics: Arc<NodeMetrics>,
}

impl MergeN {
    pub fn new(id: impl Into<NodeId>) -> Self {
        let id = id.into();
        Self {
            inputs: Vec::new(),
            out: Arc::new(WriteEndpoint::new(id.clone(), "out")),
            metrics: Arc::new(NodeMetrics::new(id.clone())),
            link: OwnerLink::new(),
            id,
        }
    }

    /// Register another input port
    pub fn add_input(&mut self, port: impl Into<PortId>) -> &ReadEndpoint {
        let index = self.inputs.len();
        self.inputs.push(ReadEndpoint::new(self.id.clone(), port));
        &self.inputs[index]
    }

    pub fn get_input(&self, port: &str) -> Option<&ReadEndpoint> {
        self.inputs.iter().find(|input| input.port().port.as_str() == port)
    }

    pub fn inputs(&self) -> &[ReadEndpoint] {
        &self.inputs
    }
}

#[async_trait]
impl Node for MergeN {
    fn id(&self) -> &NodeId {
        &self.id
    }

    fn link(&self) -> &OwnerLink {
        &self.link
    }

    async fn run(&self) -> Result<()> {
        // Claim every input before starting, so a wiring mistake spawns nothing
        let receivers = self
            .inputs
            .iter()
            .map(ReadEndpoint::take_receiver)
            .collect::<Result<Vec<_>, _>>()?;

        let mut forwarders = JoinSet::new();
        for mut rx in receivers {
            let out = self.out.clone();
            let metrics = self.metrics.clone();
            forwarders.spawn(async move {
                while let Some(msg) = rx.recv().await {
                    metrics.record_received();
                    out.send(msg).await?;
                    metrics.record_forwarded();
                }
                Ok::<(), BondError>(())
            });
        }

        while let Some(done) = forwarders.join_next().await {
            settle(done)?;
        }

        tracing::debug!(node = %self.id, inputs = self.inputs.len(), "merge inputs closed");
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

impl Writable for MergeN {
    fn output(&self) -> &WriteEndpoint {
        &self.out
    }
}

impl Closeable for MergeN {
    fn close(&self) {
        self.out.close();
    }
}
