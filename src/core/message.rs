use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;

/// Opaque payload carried by a bond.
///
/// Cloning is cheap: clones share the same allocation, so a split that
/// forwards clones hands every output the same value.
#[derive(Clone)]
pub struct Msg {
    payload: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl Msg {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            payload: Arc::new(value),
            type_name: type_name::<T>(),
        }
    }

    pub fn is<T: Any>(&self) -> bool {
        self.payload.is::<T>()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }

    /// Take the payload out as a shared `Arc<T>`, or give the message back on a type mismatch
    pub fn downcast<T: Any + Send + Sync>(self) -> Result<Arc<T>, Msg> {
        let type_name = self.type_name;
        self.payload
            .downcast::<T>()
            .map_err(|payload| Msg { payload, type_name })
    }

    /// Name of the payload type, for diagnostics
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn same_payload(&self, other: &Msg) -> bool {
        Arc::ptr_eq(&self.payload, &other.payload)
    }
}

impl fmt::Debug for Msg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Msg<{}>", self.type_name)
    }
}
