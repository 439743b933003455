use crate::core::{bind, Bond, ChildOwner, ConfigError, NodeId, NodeRef, ReadEndpoint, WriteEndpoint};
use crate::engine::Graph;
use std::sync::Arc;

/// A chain of nodes bound output-to-input with one uniform capacity
pub struct Pipeline {
    nodes: Vec<NodeRef>,
    bonds: Vec<Bond>,
}

impl Pipeline {
    /// Bind `nodes[i]`'s default output to `nodes[i + 1]`'s default input.
    ///
    /// Every node must expose both a default input and a default output;
    /// this is checked for all nodes before anything is bound.
    pub fn build(capacity: usize, nodes: Vec<NodeRef>) -> Result<Self, ConfigError> {
        for node in &nodes {
            if node.as_readable().is_none() {
                return Err(ConfigError::MissingInput {
                    node: node.id().clone(),
                });
            }
            if node.as_writable().is_none() {
                return Err(ConfigError::MissingOutput {
                    node: node.id().clone(),
                });
            }
        }

        let mut bonds = Vec::with_capacity(nodes.len().saturating_sub(1));
        for pair in nodes.windows(2) {
            // Both capabilities were checked above
            if let (Some(writer), Some(reader)) = (pair[0].as_writable(), pair[1].as_readable()) {
                bonds.push(bind(writer.output(), reader.input(), capacity));
            }
        }

        tracing::debug!(nodes = nodes.len(), bonds = bonds.len(), capacity, "pipeline built");
        Ok(Self { nodes, bonds })
    }

    /// First node of the chain, `None` for an empty pipeline
    pub fn head(&self) -> Option<&NodeRef> {
        self.nodes.first()
    }

    /// Last node of the chain, `None` for an empty pipeline
    pub fn tail(&self) -> Option<&NodeRef> {
        self.nodes.last()
    }

    /// Overall input of the pipeline: the first node's default input
    pub fn input(&self) -> Option<&ReadEndpoint> {
        self.head()
            .and_then(|node| node.as_readable())
            .map(|readable| readable.input())
    }

    /// Overall output of the pipeline: the last node's default output
    pub fn output(&self) -> Option<&WriteEndpoint> {
        self.tail()
            .and_then(|node| node.as_writable())
            .map(|writable| writable.output())
    }

    pub fn bonds(&self) -> &[Bond] {
        &self.bonds
    }

    pub fn nodes(&self) -> &[NodeRef] {
        &self.nodes
    }

    /// Adopt every node of the chain into a new graph
    pub fn into_graph(self, id: impl Into<NodeId>) -> Result<Arc<Graph>, ConfigError> {
        let graph = Graph::new(id);
        for node in self.nodes {
            graph.add_child(node)?;
        }
        Ok(graph)
    }
}
