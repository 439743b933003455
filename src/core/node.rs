use super::{ConfigError, NodeError, NodeId, ReadEndpoint, Scope, ScopedNode, WriteEndpoint};
use crate::observability::NodeMetrics;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::{Arc, PoisonError, RwLock, Weak};

/// Shared handle to a node. Owners hold these; owner back-references are weak.
pub type NodeRef = Arc<dyn Node>;

/// Base trait for everything that lives in a graph.
///
/// Capabilities (default ports, closing, error handling, owning children)
/// are discovered through the `as_*` accessors, so the assembler can check
/// them up front and report a `ConfigError` instead of failing at runtime.
#[async_trait]
pub trait Node: Send + Sync + 'static {
    fn id(&self) -> &NodeId;

    /// Owner back-reference storage
    fn link(&self) -> &OwnerLink;

    /// Processing loop. Runs until the inputs are exhausted or the node decides to stop.
    async fn run(&self) -> Result<()>;

    /// Report a runtime error. The default hands it to the owner chain,
    /// which either delivers it to an error sink or treats it as fatal.
    async fn on_error(&self, err: NodeError) {
        self.link().escalate(err).await
    }

    fn parent(&self) -> Option<NodeRef> {
        self.link().parent()
    }

    fn as_readable(&self) -> Option<&dyn Readable> {
        None
    }

    fn as_writable(&self) -> Option<&dyn Writable> {
        None
    }

    fn as_closeable(&self) -> Option<&dyn Closeable> {
        None
    }

    fn as_error_sink(&self) -> Option<&dyn ErrorSink> {
        None
    }

    fn as_child_owner(&self) -> Option<&dyn ChildOwner> {
        None
    }

    fn metrics(&self) -> Option<Arc<NodeMetrics>> {
        None
    }
}

/// Node with a default input port
pub trait Readable {
    fn input(&self) -> &ReadEndpoint;
}

/// Node with a default output port
pub trait Writable {
    fn output(&self) -> &WriteEndpoint;
}

/// Node holding write endpoints that must be closed at shutdown
pub trait Closeable {
    fn close(&self);
}

/// Marks an owner that accepts errors forwarded by its children.
/// Forwarded errors arrive through the owner's own `Node::on_error`.
pub trait ErrorSink: Node {}

/// Node that owns children
pub trait ChildOwner: Node {
    fn get_child(&self, id: &NodeId) -> Option<NodeRef>;

    /// Detach `child` from its previous owner, then adopt it
    fn add_child(&self, child: NodeRef) -> Result<(), ConfigError>;

    /// Clear the child's owner and forget it. No-op if absent.
    fn remove_child(&self, id: &NodeId);

    /// Snapshot of the current children, in no particular order
    fn children(&self) -> Vec<NodeRef>;

    /// Flatten this owner's subtree into `out`, extending `scope` with this
    /// owner's id at each level. Order is unspecified.
    fn collect_nodes(&self, scope: &Scope, out: &mut Vec<ScopedNode>) {
        let inner = scope.inner(self.id().clone());
        for child in self.children() {
            out.push(ScopedNode {
                scope: inner.clone(),
                node: child.clone(),
            });
            if let Some(owner) = child.as_child_owner() {
                owner.collect_nodes(&inner, out);
            }
        }
    }
}

/// The child side of ownership: at most one owner, held weakly
#[derive(Default)]
pub struct OwnerLink {
    parent: RwLock<Option<Weak<dyn Node>>>,
}

impl OwnerLink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parent(&self) -> Option<NodeRef> {
        let parent = self.parent.read().unwrap_or_else(PoisonError::into_inner);
        parent.as_ref().and_then(Weak::upgrade)
    }

    /// Only owners call this, from their add/remove operations
    pub fn set_parent(&self, parent: Option<Weak<dyn Node>>) {
        *self.parent.write().unwrap_or_else(PoisonError::into_inner) = parent;
    }

    /// Forward `err` to the owner if it is an error sink.
    ///
    /// # Panics
    /// When there is no owner, or the owner does not accept errors.
    /// Unhandled errors are fatal.
    pub async fn escalate(&self, err: NodeError) {
        let Some(parent) = self.parent() else {
            unhandled(err, "no owner")
        };
        match parent.as_error_sink() {
            Some(sink) => sink.on_error(err).await,
            None => unhandled(err, "owner does not handle errors"),
        }
    }
}

fn unhandled(err: NodeError, reason: &str) -> ! {
    tracing::error!(origin = %err.origin(), reason, error = %err, "unhandled node error");
    panic!("unhandled error ({}): {}", reason, err);
}

/// Identity comparison that ignores vtable pointers
pub fn same_node(a: &dyn Node, b: &dyn Node) -> bool {
    std::ptr::addr_eq(a, b)
}

/// Shared first step of every `add_child`: reject cycles, then detach the
/// child from wherever it currently lives.
pub fn prepare_adoption(owner: &dyn Node, child: &NodeRef) -> Result<(), ConfigError> {
    let cycle = || ConfigError::OwnershipCycle {
        owner: owner.id().clone(),
        child: child.id().clone(),
    };
    if same_node(owner, child.as_ref()) {
        return Err(cycle());
    }
    let mut cursor = owner.parent();
    while let Some(ancestor) = cursor {
        if same_node(ancestor.as_ref(), child.as_ref()) {
            return Err(cycle());
        }
        cursor = ancestor.parent();
    }

    if let Some(previous) = child.parent() {
        match previous.as_child_owner() {
            Some(previous_owner) => previous_owner.remove_child(child.id()),
            None => child.link().set_parent(None),
        }
    }
    Ok(())
}
