use super::{lock, BondError, Msg, NodeId, NodePort, PortId};
use std::sync::Mutex;
use tokio::sync::{mpsc, oneshot};

/// What actually travels through a bond. Rendezvous bonds carry an ack
/// that the reader fires once it has taken the message.
pub(crate) struct Envelope {
    pub(crate) msg: Msg,
    pub(crate) ack: Option<oneshot::Sender<()>>,
}

/// Send half of an installed bond
#[derive(Clone)]
pub struct BondWriter {
    target: NodePort,
    tx: mpsc::Sender<Envelope>,
    rendezvous: bool,
}

impl BondWriter {
    pub(crate) fn new(target: NodePort, tx: mpsc::Sender<Envelope>, rendezvous: bool) -> Self {
        Self { target, tx, rendezvous }
    }

    /// Reader port at the other end of the bond
    pub fn target(&self) -> &NodePort {
        &self.target
    }

    /// Blocks while the queue is full. On a rendezvous bond, also waits
    /// until the reader has taken the message.
    pub async fn send(&self, msg: Msg) -> Result<(), BondError> {
        if !self.rendezvous {
            return self
                .tx
                .send(Envelope { msg, ack: None })
                .await
                .map_err(|_| BondError::Disconnected(self.target.clone()));
        }

        let (ack_tx, ack_rx) = oneshot::channel();
        self.tx
            .send(Envelope { msg, ack: Some(ack_tx) })
            .await
            .map_err(|_| BondError::Disconnected(self.target.clone()))?;
        // Reader dropped the envelope without taking it
        ack_rx
            .await
            .map_err(|_| BondError::Disconnected(self.target.clone()))
    }
}

/// Receive half of an installed bond, owned by the running reader
pub struct BondReader {
    port: NodePort,
    rx: mpsc::Receiver<Envelope>,
}

impl BondReader {
    pub(crate) fn new(port: NodePort, rx: mpsc::Receiver<Envelope>) -> Self {
        Self { port, rx }
    }

    pub fn port(&self) -> &NodePort {
        &self.port
    }

    /// Next message in FIFO order, or `None` once the writer closed and the queue is empty
    pub async fn recv(&mut self) -> Option<Msg> {
        let envelope = self.rx.recv().await?;
        if let Some(ack) = envelope.ack {
            let _ = ack.send(());
        }
        Some(envelope.msg)
    }
}

enum WriterState {
    Unbound,
    Open(BondWriter),
    Closed,
}

/// Write capability of a node: the sending side of whatever bond is installed on this port.
/// The owning node closes it when it is done producing.
pub struct WriteEndpoint {
    port: NodePort,
    state: Mutex<WriterState>,
}

impl WriteEndpoint {
    pub fn new(owner: impl Into<NodeId>, port: impl Into<PortId>) -> Self {
        Self {
            port: NodePort::new(owner, port),
            state: Mutex::new(WriterState::Unbound),
        }
    }

    pub fn port(&self) -> &NodePort {
        &self.port
    }

    pub fn is_bound(&self) -> bool {
        matches!(*lock(&self.state), WriterState::Open(_))
    }

    pub fn is_closed(&self) -> bool {
        matches!(*lock(&self.state), WriterState::Closed)
    }

    /// Overwrites whatever was installed before
    pub(crate) fn install(&self, writer: BondWriter) {
        *lock(&self.state) = WriterState::Open(writer);
    }

    /// Handle for sending from a spawned task.
    ///
    /// # Panics
    /// If the endpoint was never bound or is already closed.
    pub fn writer(&self) -> BondWriter {
        match &*lock(&self.state) {
            WriterState::Open(writer) => writer.clone(),
            WriterState::Unbound => panic!("send on unbound {}", self.port),
            WriterState::Closed => panic!("send on closed {}", self.port),
        }
    }

    /// Send one message, waiting while the bond is full.
    ///
    /// # Panics
    /// If the endpoint was never bound or is already closed.
    pub async fn send(&self, msg: Msg) -> Result<(), BondError> {
        let writer = self.writer();
        writer.send(msg).await
    }

    /// Signal end-of-stream to the reader.
    ///
    /// # Panics
    /// If the endpoint is already closed or was never bound.
    pub fn close(&self) {
        let mut state = lock(&self.state);
        // Dropping the writer is what ends the stream
        match std::mem::replace(&mut *state, WriterState::Closed) {
            WriterState::Open(_) => {
                tracing::debug!(port = %self.port, "closed write endpoint");
            }
            WriterState::Unbound => {
                *state = WriterState::Unbound;
                panic!("close of unbound {}", self.port);
            }
            WriterState::Closed => panic!("close of already closed {}", self.port),
        }
    }
}

enum ReaderState {
    Unbound,
    Ready(BondReader),
    Taken,
}

/// Read capability of a node: the receiving side of whatever bond is installed on this port
pub struct ReadEndpoint {
    port: NodePort,
    state: Mutex<ReaderState>,
}

impl ReadEndpoint {
    pub fn new(owner: impl Into<NodeId>, port: impl Into<PortId>) -> Self {
        Self {
            port: NodePort::new(owner, port),
            state: Mutex::new(ReaderState::Unbound),
        }
    }

    pub fn port(&self) -> &NodePort {
        &self.port
    }

    pub fn is_bound(&self) -> bool {
        !matches!(*lock(&self.state), ReaderState::Unbound)
    }

    /// Overwrites whatever was installed before
    pub(crate) fn install(&self, reader: BondReader) {
        *lock(&self.state) = ReaderState::Ready(reader);
    }

    /// Hand the installed queue to the running node. Only one consumer may hold it.
    pub fn take_receiver(&self) -> Result<BondReader, BondError> {
        let mut state = lock(&self.state);
        match std::mem::replace(&mut *state, ReaderState::Taken) {
            ReaderState::Ready(reader) => Ok(reader),
            ReaderState::Unbound => {
                *state = ReaderState::Unbound;
                Err(BondError::Unbound(self.port.clone()))
            }
            ReaderState::Taken => Err(BondError::AlreadyTaken(self.port.clone())),
        }
    }
}
