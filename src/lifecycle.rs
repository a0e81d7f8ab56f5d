//! Startup and graceful shutdown wiring (spec §4.F).

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::batcher::{run_batcher, BatcherConfig};
use crate::builder::OtlpSpanItem;
use crate::metrics::Metrics;
use crate::store::BulkInserterBoxed;

/// Owns the ingress channel sender (cloned into the tonic service) and the
/// handle needed to drain and join the batcher on shutdown.
pub struct IngestionServer {
    pub sender: mpsc::Sender<OtlpSpanItem>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    batcher: JoinHandle<()>,
}

impl IngestionServer {
    /// Constructs the channel (capacity = `config.channel_capacity`, which
    /// defaults to `batch_size` but can be overridden independently), spawns
    /// the batcher, and returns a handle to both.
    pub fn start(config: BatcherConfig, store: Arc<dyn BulkInserterBoxed>, metrics: Arc<Metrics>) -> Self {
        let (sender, receiver) = mpsc::channel(config.channel_capacity);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let batcher = tokio::spawn(run_batcher(receiver, shutdown_rx, config, store, metrics));

        Self { sender, shutdown_tx: Some(shutdown_tx), batcher }
    }

    /// Signals the batcher to drain and blocks until every in-flight flush
    /// it dispatched has completed. New `Export` calls arriving during
    /// shutdown may still block on the channel send — the handler is
    /// expected to be gated by the transport's own shutdown (spec §4.F).
    pub async fn shutdown(mut self) -> anyhow::Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.batcher.await?;
        Ok(())
    }
}
