use anyhow::Result;
use async_trait::async_trait;
use bondflow::core::{
    bind, BondError, BondReader, ChildOwner, Closeable, Msg, Node, NodeError, NodeId, NodeRef,
    OwnerLink, ReadEndpoint, Readable, Writable, WriteEndpoint,
};
use bondflow::engine::{ErrorCatcher, Graph, Pipeline};
use bondflow::nodes::{Drain, SplitTwo};
use bondflow::observability::MetricsCollector;
use bondflow::RuntimeConfig;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Sent after the last value and forwarded by every stage down to the printer
#[derive(Debug)]
struct EndOfData;

/// Emits 1..=limit, with every 7th value replaced by a malformed message,
/// then `EndOfData`
struct Counter {
    id: NodeId,
    link: OwnerLink,
    stop: ReadEndpoint,
    out: WriteEndpoint,
    limit: u64,
    interval: Duration,
}

impl Counter {
    fn new(id: &str, limit: u64, interval: Duration) -> Self {
        Self {
            id: id.into(),
            link: OwnerLink::new(),
            stop: ReadEndpoint::new(id, "stop"),
            out: WriteEndpoint::new(id, "out"),
            limit,
            interval,
        }
    }
}

async fn stop_requested(stop: &mut Option<BondReader>) {
    match stop {
        // A closed stop bond counts as a stop request too
        Some(rx) => {
            rx.recv().await;
        }
        None => std::future::pending().await,
    }
}

#[async_trait]
impl Node for Counter {
    fn id(&self) -> &NodeId {
        &self.id
    }

    fn link(&self) -> &OwnerLink {
        &self.link
    }

    async fn run(&self) -> Result<()> {
        let mut stop = self.stop.take_receiver().ok();

        for n in 1..=self.limit {
            let msg = if n % 7 == 0 {
                Msg::new(format!("tick {}", n))
            } else {
                Msg::new(n)
            };

            tokio::select! {
                biased;
                _ = stop_requested(&mut stop) => {
                    tracing::info!(node = %self.id, at = n, "stop requested");
                    break;
                }
                sent = async {
                    self.out.send(msg).await?;
                    tokio::time::sleep(self.interval).await;
                    Ok::<(), BondError>(())
                } => sent?,
            }
        }

        self.out.send(Msg::new(EndOfData)).await?;
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

impl Readable for Counter {
    fn input(&self) -> &ReadEndpoint {
        &self.stop
    }
}

impl Writable for Counter {
    fn output(&self) -> &WriteEndpoint {
        &self.out
    }
}

/// Multiples of `divisor` go to `out`, everything else to `filtered`
struct DivisorFilter {
    id: NodeId,
    link: OwnerLink,
    input: ReadEndpoint,
    out: WriteEndpoint,
    filtered: WriteEndpoint,
    divisor: u64,
}

impl DivisorFilter {
    fn new(id: &str, divisor: u64) -> Self {
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
            if msg.is::<EndOfData>() {
                self.out.send(msg.clone()).await?;
                self.filtered.send(msg).await?;
                continue;
            }

            let value = msg.downcast_ref::<u64>().copied();
            match value {
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

/// Prints every value and reports on `exit` once `EndOfData` arrives
struct Printer {
    id: NodeId,
    link: OwnerLink,
    input: ReadEndpoint,
    exit: WriteEndpoint,
}

impl Printer {
    fn new(id: &str) -> Self {
        Self {
            id: id.into(),
            link: OwnerLink::new(),
            input: ReadEndpoint::new(id, "in"),
            exit: WriteEndpoint::new(id, "exit"),
        }
    }
}

#[async_trait]
impl Node for Printer {
    fn id(&self) -> &NodeId {
        &self.id
    }

    fn link(&self) -> &OwnerLink {
        &self.link
    }

    async fn run(&self) -> Result<()> {
        let mut input = self.input.take_receiver()?;
        // The input stays open until the graph is closed
        while let Some(msg) = input.recv().await {
            if msg.is::<EndOfData>() {
                self.exit.send(Msg::new("printer finished")).await?;
            } else if let Some(n) = msg.downcast_ref::<u64>() {
                println!("[{}] {}", self.id, n);
            } else {
                println!("[{}] <{}>", self.id, msg.type_name());
            }
        }
        Ok(())
    }

    fn as_readable(&self) -> Option<&dyn Readable> {
        Some(self)
    }

    fn as_closeable(&self) -> Option<&dyn Closeable> {
        Some(self)
    }
}

impl Readable for Printer {
    fn input(&self) -> &ReadEndpoint {
        &self.input
    }
}

impl Closeable for Printer {
    fn close(&self) {
        self.exit.close();
    }
}

/// The assembled demo graph plus the assembler's ends of its control bonds
struct Demo {
    root: Arc<Graph>,
    catcher: Arc<ErrorCatcher>,
    stop: WriteEndpoint,
    exit: ReadEndpoint,
}

/// counter -> filter -> (evens, odd_split -> (odd_tally, odds)), all under error_zone
fn assemble(config: &RuntimeConfig, limit: u64, interval: Duration) -> Result<Demo> {
    let counter = Arc::new(Counter::new("counter", limit, interval));
    let filter = Arc::new(DivisorFilter::new("filter", 2));
    let evens = Arc::new(Drain::new("evens"));
    let split = Arc::new(SplitTwo::new("odd_split", config.split_fan_out));
    let tally = Arc::new(Drain::new("odd_tally"));
    let printer = Arc::new(Printer::new("odds"));

    let pipeline = Pipeline::build(
        config.channel_capacity,
        vec![counter.clone() as NodeRef, filter.clone() as NodeRef],
    )?;
    bind(&filter.out, &evens.input, config.channel_capacity);
    bind(&filter.filtered, &split.input, config.channel_capacity);
    bind(&split.out_a, &tally.input, config.channel_capacity);
    // Last output: the split has handed `EndOfData` to every output before the printer sees it
    bind(&split.out_b, &printer.input, config.channel_capacity);

    let stop = WriteEndpoint::new("main", "stop");
    let exit = ReadEndpoint::new("main", "exit");
    bind(&stop, &counter.stop, 1);
    bind(&printer.exit, &exit, 1);

    let work = pipeline.into_graph("work")?;
    work.add_child(evens)?;
    work.add_child(split)?;
    work.add_child(tally)?;
    work.add_child(printer)?;

    let catcher = ErrorCatcher::new("error_zone", config.error_capacity);
    catcher.add_child(work)?;

    let root = Graph::new("root");
    root.add_child(catcher.clone())?;

    for scoped in root.nodes() {
        tracing::debug!(path = %scoped.path(), "assembled");
    }

    Ok(Demo {
        root,
        catcher,
        stop,
        exit,
    })
}

/// Run until the printer reports, stopping the counter early if `interrupt` fires first.
/// Then close the root so the nodes blocked on split outputs finish, and collect metrics.
async fn run_demo(demo: Demo, interrupt: impl Future<Output = ()>) -> Result<MetricsCollector> {
    let Demo {
        root,
        catcher,
        stop,
        exit,
    } = demo;

    let mut errors = catcher.take_errors()?;
    let error_log = tokio::spawn(async move {
        while let Some(msg) = errors.recv().await {
            if let Some(err) = msg.downcast_ref::<NodeError>() {
                println!("caught in error_zone: {}", err);
            }
        }
    });

    let mut exit = exit.take_receiver()?;
    let runner = tokio::spawn({
        let root = root.clone();
        async move { root.run().await }
    });

    tokio::pin!(interrupt);
    let signal = tokio::select! {
        msg = exit.recv() => msg,
        () = &mut interrupt => {
            tracing::info!("interrupted, stopping counter");
            if let Err(err) = stop.send(Msg::new(())).await {
                tracing::warn!(error = %err, "counter already gone");
            }
            exit.recv().await
        }
    };
    if let Some(reason) = signal.as_ref().and_then(|m| m.downcast_ref::<&'static str>()) {
        tracing::info!(reason, "exit signal");
    }

    root.close();
    runner.await??;
    error_log.await?;

    Ok(MetricsCollector::from_graph(&root))
}

async fn ctrl_c() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "no ctrl-c handler, running to completion");
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    bondflow::logging::init_tracing("info");

    let config = match std::env::args().nth(1) {
        Some(path) => RuntimeConfig::load(path)?,
        None => RuntimeConfig::default(),
    };
    tracing::info!(?config, "runtime config");

    println!("bondflow demo: counter -> divisor filter -> (drain, split -> (drain, printer))");
    println!("Press Ctrl-C to stop early\n");

    let demo = assemble(&config, 20, Duration::from_millis(50))?;
    let metrics = run_demo(demo, ctrl_c()).await?;

    println!("\n{}", metrics.report());
    Ok(())
}
