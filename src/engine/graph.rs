use crate::core::{
    lock, prepare_adoption, same_node, ChildOwner, Closeable, ConfigError, ErrorSink, Node, NodeId,
    NodeRef, OwnerLink, Scope, ScopedNode,
};
use crate::engine::GraphState;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use tokio::task::JoinSet;
use tracing::Instrument;

/// A node owning an open-ended set of children keyed by id.
///
/// Errors from children climb through the graph to its own owner.
/// Closing the graph closes every closeable child.
pub struct Graph {
    id: NodeId,
    link: OwnerLink,
    me: Weak<Graph>,
    nodes: RwLock<HashMap<NodeId, NodeRef>>,
    state: Mutex<GraphState>,
}

impl Graph {
    pub fn new(id: impl Into<NodeId>) -> Arc<Self> {
        let id = id.into();
        Arc::new_cyclic(|me| Self {
            id,
            link: OwnerLink::new(),
            me: me.clone(),
            nodes: RwLock::new(HashMap::new()),
            state: Mutex::new(GraphState::Assembling),
        })
    }

    pub fn state(&self) -> GraphState {
        *lock(&self.state)
    }

    pub fn len(&self) -> usize {
        self.nodes.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every node below this graph, with the scope path leading to it
    pub fn nodes(&self) -> Vec<ScopedNode> {
        let mut out = Vec::new();
        self.collect_nodes(&Scope::root(), &mut out);
        out
    }

    fn transition_to(&self, target: GraphState) -> Result<()> {
        let mut state = lock(&self.state);
        if !state.can_transition_to(&target) {
            return Err(anyhow!(
                "graph {}: invalid state transition {} -> {}",
                self.id,
                state.name(),
                target.name()
            ));
        }
        *state = target;
        Ok(())
    }
}

#[async_trait]
impl Node for Graph {
    fn id(&self) -> &NodeId {
        &self.id
    }

    fn link(&self) -> &OwnerLink {
        &self.link
    }

    /// Spawn every child's run loop on its own task and wait for all of them.
    /// A panicking child re-panics here; otherwise the first child error is returned.
    async fn run(&self) -> Result<()> {
        self.transition_to(GraphState::Running)?;

        let mut tasks = JoinSet::new();
        for child in self.children() {
            let id = child.id().clone();
            let span = tracing::debug_span!("node", id = %id);
            tasks.spawn(
                async move {
                    tracing::debug!("started");
                    let result = child.run().await;
                    tracing::debug!(ok = result.is_ok(), "finished");
                    (id, result)
                }
                .instrument(span),
            );
        }
        tracing::info!(graph = %self.id, children = tasks.len(), "graph running");

        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(()))) => {}
                Ok((id, Err(err))) => {
                    tracing::warn!(graph = %self.id, node = %id, error = %err, "node failed");
                    if first_error.is_none() {
                        first_error = Some(err.context(format!("node {} failed", id)));
                    }
                }
                Err(join_err) if join_err.is_panic() => {
                    std::panic::resume_unwind(join_err.into_panic())
                }
                Err(join_err) => {
                    if first_error.is_none() {
                        first_error = Some(anyhow!(join_err));
                    }
                }
            }
        }

        // Closing while running is allowed; stay closed in that case
        if self.state() == GraphState::Running {
            self.transition_to(GraphState::Stopped)?;
        }
        tracing::info!(graph = %self.id, "graph stopped");

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn as_closeable(&self) -> Option<&dyn Closeable> {
        Some(self)
    }

    fn as_error_sink(&self) -> Option<&dyn ErrorSink> {
        Some(self)
    }

    fn as_child_owner(&self) -> Option<&dyn ChildOwner> {
        Some(self)
    }
}

impl ErrorSink for Graph {}

impl ChildOwner for Graph {
    fn get_child(&self, id: &NodeId) -> Option<NodeRef> {
        let nodes = self.nodes.read().unwrap_or_else(PoisonError::into_inner);
        nodes.get(id).cloned()
    }

    fn add_child(&self, child: NodeRef) -> Result<(), ConfigError> {
        let state = self.state();
        if state != GraphState::Assembling {
            return Err(ConfigError::NotAssembling {
                owner: self.id.clone(),
                state: state.name(),
            });
        }

        if let Some(existing) = self.get_child(child.id()) {
            if !same_node(existing.as_ref(), child.as_ref()) {
                return Err(ConfigError::DuplicateChild {
                    owner: self.id.clone(),
                    child: child.id().clone(),
                });
            }
        }

        // Remove the node from its previous owner, this graph included
        prepare_adoption(self, &child)?;

        let me: Weak<dyn Node> = self.me.clone();
        child.link().set_parent(Some(me));
        tracing::debug!(graph = %self.id, child = %child.id(), "child added");
        self.nodes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(child.id().clone(), child);
        Ok(())
    }

    fn remove_child(&self, id: &NodeId) {
        let removed = self
            .nodes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        if let Some(child) = removed {
            child.link().set_parent(None);
            tracing::debug!(graph = %self.id, child = %id, "child removed");
        }
    }

    fn children(&self) -> Vec<NodeRef> {
        let nodes = self.nodes.read().unwrap_or_else(PoisonError::into_inner);
        nodes.values().cloned().collect()
    }
}

impl Closeable for Graph {
    /// Release every owned output queue. Does not stop run loops; they end
    /// as end-of-stream reaches them.
    ///
    /// # Panics
    /// If the graph was already closed.
    fn close(&self) {
        if let Err(err) = self.transition_to(GraphState::Closed) {
            panic!("{}", err);
        }
        for child in self.children() {
            if let Some(closeable) = child.as_closeable() {
                closeable.close();
            }
        }
        tracing::info!(graph = %self.id, "graph closed");
    }
}
