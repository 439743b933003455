pub mod bond;
pub mod endpoint;
pub mod error;
pub mod message;
pub mod node;
pub mod port;
pub mod scope;

pub use bond::{bind, bind_nodes, Bond};
pub use endpoint::{BondReader, BondWriter, ReadEndpoint, WriteEndpoint};
pub use error::{BondError, ConfigError, NodeError};
pub use message::Msg;
pub use node::{
    prepare_adoption, same_node, ChildOwner, Closeable, ErrorSink, Node, NodeRef, OwnerLink,
    Readable, Writable,
};
pub use port::{NodeId, NodePort, PortId};
pub use scope::{Scope, ScopedNode};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Endpoint state stays consistent across a panicking holder, so poisoning is ignored
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
