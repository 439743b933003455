use crate::core::{BondError, BondReader, NodeId, WriteEndpoint};
use crate::observability::NodeMetrics;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::{JoinError, JoinSet};

/// Undelivered copies a concurrent split may hold before it stops reading its input
pub const MAX_IN_FLIGHT: usize = 64;

/// How a split hands each message to its outputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FanOut {
    /// Send to each output in turn; the slowest output sets the pace for all
    Sequential,
    /// One task per copy; a stalled output does not hold up the others,
    /// but copies of consecutive messages may complete out of order.
    /// Once `MAX_IN_FLIGHT` copies are undelivered the split stops reading,
    /// so a stalled output eventually pushes back on the writer upstream.
    #[default]
    Concurrent,
}

/// Unwrap a finished forwarder task, re-raising its panic on the caller
pub(crate) fn settle(joined: Result<Result<(), BondError>, JoinError>) -> Result<()> {
    match joined {
        Ok(result) => Ok(result?),
        Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
        Err(err) => Err(err.into()),
    }
}

/// Shared run loop of the split nodes: copy every input message to every output
pub(crate) async fn split_loop(
    node: &NodeId,
    mut input: BondReader,
    outputs: &[&WriteEndpoint],
    mode: FanOut,
    metrics: &Arc<NodeMetrics>,
) -> Result<()> {
    let mut pending: JoinSet<Result<(), BondError>> = JoinSet::new();

    loop {
        tokio::select! {
            Some(done) = pending.join_next(), if !pending.is_empty() => settle(done)?,
            next = input.recv(), if pending.len() < MAX_IN_FLIGHT => {
                let Some(msg) = next else { break };
                metrics.record_received();

                match mode {
                    FanOut::Sequential => {
                        for output in outputs {
                            output.send(msg.clone()).await?;
                            metrics.record_forwarded();
                        }
                    }
                    FanOut::Concurrent => {
                        for output in outputs {
                            let writer = output.writer();
                            let msg = msg.clone();
                            let metrics = metrics.clone();
                            pending.spawn(async move {
                                writer.send(msg).await?;
                                metrics.record_forwarded();
                                Ok::<(), BondError>(())
                            });
                        }
                    }
                }
            }
        }
    }

    // Every copy is delivered before the split reports completion
    while let Some(done) = pending.join_next().await {
        settle(done)?;
    }

    tracing::debug!(
        node = %node,
        received = metrics.messages_received(),
        forwarded = metrics.messages_forwarded(),
        "split input closed"
    );
    Ok(())
}
