use super::endpoint::{BondReader, BondWriter, Envelope};
use super::{ConfigError, Node, NodePort, ReadEndpoint, WriteEndpoint};
use std::fmt;
use tokio::sync::mpsc;

/// Record of one installed bond. Not needed for the graph to work,
/// useful for introspection and tests.
#[derive(Clone)]
pub struct Bond {
    writer: NodePort,
    reader: NodePort,
    capacity: usize,
    liveness: mpsc::WeakSender<Envelope>,
}

impl Bond {
    pub fn writer(&self) -> &NodePort {
        &self.writer
    }

    pub fn reader(&self) -> &NodePort {
        &self.reader
    }

    /// Queue capacity, 0 for a rendezvous bond
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// False once every writer handle is gone, i.e. the reader will see end-of-stream
    pub fn is_open(&self) -> bool {
        self.liveness.upgrade().is_some()
    }
}

impl fmt::Debug for Bond {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bond")
            .field("writer", &self.writer)
            .field("reader", &self.reader)
            .field("capacity", &self.capacity)
            .finish()
    }
}

/// Allocate a new bounded queue and install it on both endpoints,
/// replacing anything installed before.
///
/// A capacity of 0 gives a rendezvous bond: each send completes only
/// once the reader has taken the message.
pub fn bind(writer: &WriteEndpoint, reader: &ReadEndpoint, capacity: usize) -> Bond {
    // tokio queues need at least one slot, rendezvous is enforced by the ack
    let (tx, rx) = mpsc::channel::<Envelope>(capacity.max(1));
    let liveness = tx.downgrade();

    writer.install(BondWriter::new(reader.port().clone(), tx, capacity == 0));
    reader.install(BondReader::new(reader.port().clone(), rx));

    tracing::debug!(
        writer = %writer.port(),
        reader = %reader.port(),
        capacity,
        "bound endpoints"
    );

    Bond {
        writer: writer.port().clone(),
        reader: reader.port().clone(),
        capacity,
        liveness,
    }
}

/// Bind `src`'s default output to `dst`'s default input
pub fn bind_nodes(src: &dyn Node, dst: &dyn Node, capacity: usize) -> Result<Bond, ConfigError> {
    let writer = src.as_writable().ok_or_else(|| ConfigError::MissingOutput {
        node: src.id().clone(),
    })?;
    let reader = dst.as_readable().ok_or_else(|| ConfigError::MissingInput {
        node: dst.id().clone(),
    })?;
    Ok(bind(writer.output(), reader.input(), capacity))
}
