use super::{NodeId, NodePort};

/// Assembly-time wiring mistakes. Always surfaced to the assembler, before anything runs.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("node {node} has no default input port")]
    MissingInput { node: NodeId },

    #[error("node {node} has no default output port")]
    MissingOutput { node: NodeId },

    #[error("owner {owner} already holds a different node with id {child}")]
    DuplicateChild { owner: NodeId, child: NodeId },

    #[error("adding {child} to {owner} would make {child} its own ancestor")]
    OwnershipCycle { owner: NodeId, child: NodeId },

    #[error("owner {owner} is {state}, children can only change while assembling")]
    NotAssembling { owner: NodeId, state: &'static str },
}

/// Faults of a bond seen from a running node
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum BondError {
    #[error("{0} is not bound")]
    Unbound(NodePort),

    #[error("{0} is already being consumed")]
    AlreadyTaken(NodePort),

    #[error("reader behind {0} has gone away")]
    Disconnected(NodePort),
}

/// A runtime data error raised by a node, tagged with the node that raised it
#[derive(Debug, thiserror::Error)]
#[error("node {origin}: {error}")]
pub struct NodeError {
    origin: NodeId,
    error: anyhow::Error,
}

impl NodeError {
    pub fn new(origin: impl Into<NodeId>, error: impl Into<anyhow::Error>) -> Self {
        Self {
            origin: origin.into(),
            error: error.into(),
        }
    }

    pub fn msg(origin: impl Into<NodeId>, message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self::new(origin, anyhow::Error::msg(message))
    }

    pub fn origin(&self) -> &NodeId {
        &self.origin
    }

    pub fn error(&self) -> &anyhow::Error {
        &self.error
    }
}
