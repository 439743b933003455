use crate::core::{
    bind, lock, prepare_adoption, BondError, BondReader, ChildOwner, Closeable, ConfigError, ErrorSink,
    Msg, Node, NodeError, NodeId, NodeRef, OwnerLink, ReadEndpoint, WriteEndpoint,
};
use crate::engine::GraphState;
use crate::observability::NodeMetrics;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

/// Single-child owner that stops error propagation.
///
/// Errors raised by the child (or anything below it) are sent as ordinary
/// `Msg`s carrying a `NodeError` on the `err` output, and never reach the
/// catcher's own owner. Like a graph, the child can only be swapped while
/// assembling.
pub struct ErrorCatcher {
    id: NodeId,
    link: OwnerLink,
    me: Weak<ErrorCatcher>,
    child: RwLock<Option<NodeRef>>,
    err_out: WriteEndpoint,
    // Read side of the error bond created at construction
    err_in: ReadEndpoint,
    metrics: Arc<NodeMetrics>,
    state: Mutex<GraphState>,
}

impl ErrorCatcher {
    /// `capacity` sizes the error bond; 0 makes every reported error wait for a reader
    pub fn new(id: impl Into<NodeId>, capacity: usize) -> Arc<Self> {
        let id = id.into();
        let err_out = WriteEndpoint::new(id.clone(), "err");
        let err_in = ReadEndpoint::new(id.clone(), "err");
        bind(&err_out, &err_in, capacity);

        let metrics = Arc::new(NodeMetrics::new(id.clone()));

        Arc::new_cyclic(|me| Self {
            id,
            link: OwnerLink::new(),
            me: me.clone(),
            child: RwLock::new(None),
            err_out,
            err_in,
            metrics,
            state: Mutex::new(GraphState::Assembling),
        })
    }

    pub fn state(&self) -> GraphState {
        *lock(&self.state)
    }

    /// Stream of caught errors. Can be taken once, unless the error output is rebound elsewhere.
    pub fn take_errors(&self) -> Result<BondReader, BondError> {
        self.err_in.take_receiver()
    }

    /// The `err` write endpoint, for binding caught errors into another node
    pub fn error_output(&self) -> &WriteEndpoint {
        &self.err_out
    }

    pub fn child(&self) -> Option<NodeRef> {
        self.child
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Node for ErrorCatcher {
    fn id(&self) -> &NodeId {
        &self.id
    }

    fn link(&self) -> &OwnerLink {
        &self.link
    }

    async fn run(&self) -> Result<()> {
        {
            let mut state = lock(&self.state);
            if !state.can_transition_to(&GraphState::Running) {
                return Err(anyhow!("catcher {}: cannot run while {}", self.id, state.name()));
            }
            *state = GraphState::Running;
        }

        let result = match self.child() {
            Some(child) => child.run().await,
            None => Ok(()),
        };

        // Closing while running is allowed; stay closed in that case
        {
            let mut state = lock(&self.state);
            if *state == GraphState::Running {
                *state = GraphState::Stopped;
            }
        }
        result
    }

    async fn on_error(&self, err: NodeError) {
        tracing::debug!(catcher = %self.id, origin = %err.origin(), "caught error");
        self.metrics.record_error();
        match self.err_out.send(Msg::new(err)).await {
            Ok(()) => self.metrics.record_forwarded(),
            Err(send_err) => {
                tracing::warn!(catcher = %self.id, error = %send_err, "caught error dropped, nobody is reading")
            }
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

    /// `errors_count` counts caught errors, `messages_forwarded` the ones delivered on `err`
    fn metrics(&self) -> Option<Arc<NodeMetrics>> {
        Some(self.metrics.clone())
    }
}

impl ErrorSink for ErrorCatcher {}

impl ChildOwner for ErrorCatcher {
    fn get_child(&self, id: &NodeId) -> Option<NodeRef> {
        self.child().filter(|child| child.id() == id)
    }

    /// Replaces the current child, if any
    fn add_child(&self, child: NodeRef) -> Result<(), ConfigError> {
        let state = self.state();
        if state != GraphState::Assembling {
            return Err(ConfigError::NotAssembling {
                owner: self.id.clone(),
                state: state.name(),
            });
        }

        prepare_adoption(self, &child)?;

        let previous = self
            .child
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(previous) = previous {
            previous.link().set_parent(None);
        }

        let me: Weak<dyn Node> = self.me.clone();
        child.link().set_parent(Some(me));
        *self.child.write().unwrap_or_else(PoisonError::into_inner) = Some(child);
        Ok(())
    }

    fn remove_child(&self, id: &NodeId) {
        let mut slot = self.child.write().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|child| child.id() == id) {
            if let Some(child) = slot.take() {
                child.link().set_parent(None);
            }
        }
    }

    fn children(&self) -> Vec<NodeRef> {
        self.child().into_iter().collect()
    }
}

impl Closeable for ErrorCatcher {
    /// Close the child (if closeable) and the error output
    fn close(&self) {
        *lock(&self.state) = GraphState::Closed;
        if let Some(child) = self.child() {
            if let Some(closeable) = child.as_closeable() {
                closeable.close();
            }
        }
        self.err_out.close();
    }
}
