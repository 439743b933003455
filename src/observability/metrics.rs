use crate::core::NodeId;
use std::sync::atomic::{AtomicU64, Ordering};

pub struct NodeMetrics {
    node_id: NodeId,
    messages_received: AtomicU64,
    messages_forwarded: AtomicU64,
    errors_count: AtomicU64,
}

impl NodeMetrics {
    pub fn new(node_id: impl Into<NodeId>) -> Self {
        Self {
            node_id: node_id.into(),
            messages_received: AtomicU64::new(0),
            messages_forwarded: AtomicU64::new(0),
            errors_count: AtomicU64::new(0),
        }
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    pub fn messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }

    pub fn messages_forwarded(&self) -> u64 {
        self.messages_forwarded.load(Ordering::Relaxed)
    }

    pub fn errors_count(&self) -> u64 {
        self.errors_count.load(Ordering::Relaxed)
    }

    pub fn record_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    /// One delivered copy; a split counts each output separately
    pub fn record_forwarded(&self) {
        self.messages_forwarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors_count.fetch_add(1, Ordering::Relaxed);
    }
}
