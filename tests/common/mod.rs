#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use bondflow::core::{
    BondReader, Msg, Node, NodeError, NodeId, OwnerLink, ReadEndpoint, Readable, Writable,
    WriteEndpoint,
};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Fail the test instead of hanging it
pub async fn within<F: Future>(fut: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(5), fut)
        .await
        .expect("timed out")
}

pub fn value(msg: &Msg) -> u64 {
    *msg.downcast_ref::<u64>().expect("u64 payload")
}

/// Read until end-of-stream
pub async fn read_all(rx: &mut BondReader) -> Vec<u64> {
    let mut out = Vec::new();
    while let Some(msg) = rx.recv().await {
        out.push(value(&msg));
    }
    out
}

/// Read exactly `n` values, fewer if the stream ends first
pub async fn read_n(rx: &mut BondReader, n: usize) -> Vec<u64> {
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        match rx.recv().await {
            Some(msg) => out.push(value(&msg)),
            None => break,
        }
    }
    out
}

type Source = Box<dyn Iterator<Item = Msg> + Send>;

/// Emits its messages, then closes `out`. Stops early on any message
/// (or end-of-stream) on `stop`, when that port is bound.
pub struct Generator {
    id: NodeId,
    link: OwnerLink,
    pub stop: ReadEndpoint,
    pub out: WriteEndpoint,
    source: Mutex<Option<Source>>,
}

impl Generator {
    pub fn new(id: &str, values: Vec<u64>) -> Self {
        Self::from_messages(id, values.into_iter().map(Msg::new).collect())
    }

    pub fn from_messages(id: &str, messages: Vec<Msg>) -> Self {
        Self::with_source(id, Box::new(messages.into_iter()))
    }

    /// Counts up from 0 until stopped
    pub fn endless(id: &str) -> Self {
        Self::with_source(id, Box::new((0u64..).map(Msg::new)))
    }

    fn with_source(id: &str, source: Source) -> Self {
        Self {
            id: id.into(),
            link: OwnerLink::new(),
            stop: ReadEndpoint::new(id, "stop"),
            out: WriteEndpoint::new(id, "out"),
            source: Mutex::new(Some(source)),
        }
    }
}

#[async_trait]
impl Node for Generator {
    fn id(&self) -> &NodeId {
        &self.id
    }

    fn link(&self) -> &OwnerLink {
        &self.link
    }

    async fn run(&self) -> Result<()> {
        let source = self.source.lock().unwrap().take();
        let Some(source) = source else {
            bail!("generator {} already ran", self.id)
        };
        let mut stop = self.stop.take_receiver().ok();

        for msg in source {
            match stop.as_mut() {
                Some(rx) => {
                    tokio::select! {
                        biased;
                        _ = rx.recv() => break,
                        sent = self.out.send(msg) => sent?,
                    }
                }
                None => self.out.send(msg).await?,
            }
        }

        self.out.close();
        Ok(())
    }

    fn as_readable(&self) -> Option<&dyn Readable> {
        Some(self)
    }

    fn as_writable(&self) -> Option<&dyn Writable> {
        Some(self)
    }
}

impl Readable for Generator {
    fn input(&self) -> &ReadEndpoint {
        &self.stop
    }
}

impl Writable for Generator {
    fn output(&self) -> &WriteEndpoint {
        &self.out
    }
}

/// Multiples of `divisor` go to `out`, other numbers to `filtered`.
/// Anything that is not a u64 is reported through `on_error` and skipped.
pub struct DivisorFilter {
    id: NodeId,
    link: OwnerLink,
    pub input: ReadEndpoint,
    pub out: WriteEndpoint,
    pub filtered: WriteEndpoint,
    divisor: u64,
}

impl DivisorFilter {
    pub fn new(id: &str, divisor: u64) -> Self {
        Self {
            id: id.into(),
            link: OwnerLink::new(),
            input: ReadEndpoint::new(id, "in"),
            out: WriteEndpoint::new(id, "out"),
            filtered: WriteEndpoint::new(id, "filtered"),
            divisor,
        }
    }
}

#[async_trait]
impl Node for DivisorFilter {
    fn id(&self) -> &NodeId {
        &self.id
    }

    fn link(&self) -> &OwnerLink {
        &self.link
    }

    async fn run(&self) -> Result<()> {
        let mut input = self.input.take_receiver()?;
        while let Some(msg) = input.recv().await {
            let number = msg.downcast_ref::<u64>().copied();
            match number {
                Some(n) if n % self.divisor == 0 => self.out.send(msg).await?,
                Some(_) => self.filtered.send(msg).await?,
                None => {
                    let err = NodeError::msg(
                        self.id.clone(),
                        format!("expected u64, got {}", msg.type_name()),
                    );
                    self.on_error(err).await;
                }
            }
        }
        self.out.close();
        self.filtered.close();
        Ok(())
    }

    fn as_readable(&self) -> Option<&dyn Readable> {
        Some(self)
    }

    fn as_writable(&self) -> Option<&dyn Writable> {
        Some(self)
    }
}

impl Readable for DivisorFilter {
    fn input(&self) -> &ReadEndpoint {
        &self.input
    }
}

impl Writable for DivisorFilter {
    fn output(&self) -> &WriteEndpoint {
        &self.out
    }
}

/// Forwards everything unchanged, closes `out` when its input ends
pub struct Passthrough {
    id: NodeId,
    link: OwnerLink,
    pub input: ReadEndpoint,
    pub out: WriteEndpoint,
}

impl Passthrough {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.into(),
            link: OwnerLink::new(),
            input: ReadEndpoint::new(id, "in"),
            out: WriteEndpoint::new(id, "out"),
        }
    }
}

#[async_trait]
impl Node for Passthrough {
    fn id(&self) -> &NodeId {
        &self.id
    }

    fn link(&self) -> &OwnerLink {
        &self.link
    }

    async fn run(&self) -> Result<()> {
        let mut input = self.input.take_receiver()?;
        while let Some(msg) = input.recv().await {
            self.out.send(msg).await?;
        }
        self.out.close();
        Ok(())
    }

    fn as_readable(&self) -> Option<&dyn Readable> {
        Some(self)
    }

    fn as_writable(&self) -> Option<&dyn Writable> {
        Some(self)
    }
}

impl Readable for Passthrough {
    fn input(&self) -> &ReadEndpoint {
        &self.input
    }
}

impl Writable for Passthrough {
    fn output(&self) -> &WriteEndpoint {
        &self.out
    }
}

/// Records every u64 it receives
pub struct Collector {
    id: NodeId,
    link: OwnerLink,
    pub input: ReadEndpoint,
    values: Arc<Mutex<Vec<u64>>>,
}

impl Collector {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.into(),
            link: OwnerLink::new(),
            input: ReadEndpoint::new(id, "in"),
            values: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn values(&self) -> Vec<u64> {
        self.values.lock().unwrap().clone()
    }
}

#[async_trait]
impl Node for Collector {
    fn id(&self) -> &NodeId {
        &self.id
    }

    fn link(&self) -> &OwnerLink {
        &self.link
    }

    async fn run(&self) -> Result<()> {
        let mut input = self.input.take_receiver()?;
        while let Some(msg) = input.recv().await {
            if let Some(n) = msg.downcast_ref::<u64>() {
                self.values.lock().unwrap().push(*n);
            }
        }
        Ok(())
    }

    fn as_readable(&self) -> Option<&dyn Readable> {
        Some(self)
    }
}

impl Readable for Collector {
    fn input(&self) -> &ReadEndpoint {
        &self.input
    }
}

/// No ports; reports `faults` errors through its owner chain, then finishes
pub struct Faulty {
    id: NodeId,
    link: OwnerLink,
    faults: usize,
}

impl Faulty {
    pub fn new(id: &str, faults: usize) -> Self {
        Self {
            id: id.into(),
            link: OwnerLink::new(),
            faults,
        }
    }
}

#[async_trait]
impl Node for Faulty {
    fn id(&self) -> &NodeId {
        &self.id
    }

    fn link(&self) -> &OwnerLink {
        &self.link
    }

    async fn run(&self) -> Result<()> {
        for i in 0..self.faults {
            self.on_error(NodeError::msg(self.id.clone(), format!("fault {}", i)))
                .await;
        }
        Ok(())
    }
}
