//! The single-consumer batching stage between ingress and the flusher
//! (spec §4.D), and the bounded-parallelism dispatch to the flusher itself
//! (spec §4.E), which share a task here because the gate is acquired
//! synchronously from the batcher before a flush is ever spawned.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio::task::JoinSet;

use crate::builder::OtlpSpanItem;
use crate::flusher::flush_batch;
use crate::metrics::Metrics;
use crate::store::BulkInserterBoxed;

/// `clamp(2000 * cores, 2000, 32000)` from spec §4.D.
pub fn derive_batch_size(cores: usize) -> usize {
    (2000 * cores.max(1)).clamp(2000, 32000)
}

pub struct BatcherConfig {
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub gate_permits: usize,
    /// Ingress channel bound. Defaults to `batch_size` (spec §4.F: "the
    /// channel, capacity = batchSize"); `--channel-capacity` lets an operator
    /// size backpressure independently of the flush batch size.
    pub channel_capacity: usize,
}

impl BatcherConfig {
    pub fn from_cores(cores: usize) -> Self {
        let batch_size = derive_batch_size(cores);
        Self {
            batch_size,
            flush_interval: Duration::from_secs(1),
            gate_permits: cores.max(1),
            channel_capacity: batch_size,
        }
    }
}

/// Runs until the channel closes or `shutdown` fires, then drains any
/// residual buffer and waits for every flush it dispatched to complete
/// before returning — this is the wait-group of spec §4.F.
pub async fn run_batcher(
    mut receiver: mpsc::Receiver<OtlpSpanItem>,
    shutdown: oneshot::Receiver<()>,
    config: BatcherConfig,
    store: Arc<dyn BulkInserterBoxed>,
    metrics: Arc<Metrics>,
) {
    let gate = Arc::new(Semaphore::new(config.gate_permits));
    let mut buffer: Vec<OtlpSpanItem> = Vec::with_capacity(config.batch_size);
    let mut timer = tokio::time::interval(config.flush_interval);
    timer.tick().await; // first tick fires immediately; consume it
    let mut in_flight: JoinSet<()> = JoinSet::new();
    let mut shutdown = std::pin::pin!(shutdown);

    loop {
        tokio::select! {
            item = receiver.recv() => {
                match item {
                    Some(item) => {
                        buffer.push(item);
                        if buffer.len() >= config.batch_size {
                            let full = std::mem::replace(&mut buffer, Vec::with_capacity(config.batch_size));
                            dispatch(full, &gate, &store, &metrics, &mut in_flight).await;
                        }
                    }
                    None => break,
                }
            }
            _ = timer.tick() => {
                if !buffer.is_empty() {
                    let full = std::mem::replace(&mut buffer, Vec::with_capacity(config.batch_size));
                    dispatch(full, &gate, &store, &metrics, &mut in_flight).await;
                }
            }
            _ = &mut shutdown => {
                tracing::info!("batcher received shutdown signal, draining");
                break;
            }
        }
    }

    // `select!` may have chosen the shutdown branch over a `recv` that was
    // simultaneously ready, so drain whatever is still sitting in the
    // channel before the final flush — otherwise items enqueued just before
    // shutdown could be dropped without ever reaching the store.
    while let Ok(item) = receiver.try_recv() {
        buffer.push(item);
        if buffer.len() >= config.batch_size {
            let full = std::mem::replace(&mut buffer, Vec::with_capacity(config.batch_size));
            dispatch(full, &gate, &store, &metrics, &mut in_flight).await;
        }
    }

    if !buffer.is_empty() {
        dispatch(buffer, &gate, &store, &metrics, &mut in_flight).await;
    }

    while in_flight.join_next().await.is_some() {}
    tracing::info!("batcher drained, all in-flight flushes complete");
}

async fn dispatch(
    batch: Vec<OtlpSpanItem>,
    gate: &Arc<Semaphore>,
    store: &Arc<dyn BulkInserterBoxed>,
    metrics: &Arc<Metrics>,
    in_flight: &mut JoinSet<()>,
) {
    let permit = gate.clone().acquire_owned().await.expect("gate semaphore never closed");
    let store = store.clone();
    let metrics = metrics.clone();
    in_flight.spawn(async move {
        flush_batch(batch, store, metrics).await;
        drop(permit);
    });
}
