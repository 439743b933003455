use super::{NodeId, NodeRef};
use std::fmt;

/// Path of owner ids from a root graph down to a nested node.
/// Only used for diagnostics and enumeration, never for routing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Scope(Vec<NodeId>);

impl Scope {
    pub fn root() -> Self {
        Self::default()
    }

    /// Copy of this scope with `id` appended
    pub fn inner(&self, id: NodeId) -> Self {
        let mut path = Vec::with_capacity(self.0.len() + 1);
        path.extend(self.0.iter().cloned());
        path.push(id);
        Self(path)
    }

    pub fn ids(&self) -> &[NodeId] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, id) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{}", id)?;
        }
        Ok(())
    }
}

/// A node together with the scope it was found in.
/// The scope is a snapshot: it goes stale if the node changes owner.
#[derive(Clone)]
pub struct ScopedNode {
    pub scope: Scope,
    pub node: NodeRef,
}

impl ScopedNode {
    /// Scope path including the node itself, e.g. `root/sub/leaf`
    pub fn path(&self) -> String {
        self.scope.inner(self.node.id().clone()).to_string()
    }
}

impl fmt::Debug for ScopedNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedNode")
            .field("scope", &self.scope)
            .field("node", self.node.id())
            .finish()
    }
}
