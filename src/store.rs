//! The columnar store contract consumed by the flusher (spec §6).

use std::future::Future;
use std::pin::Pin;

use crate::span::{SpanData, SpanIndex};

pub const TABLE_SPANS_INDEX: &str = "spans_index";
pub const TABLE_SPANS_DATA: &str = "spans_data";

/// One row destined for either table. Kept as a single enum so a flush can
/// hand both tables to the same `BulkInserter` implementation.
#[derive(Debug, Clone)]
pub enum Row {
    Index(SpanIndex),
    Data(SpanData),
}

/// Native-async form. Not object-safe (the `impl Future` return type can't be
/// used behind `dyn`) — see `BulkInserterBoxed` for the dynamic-dispatch form
/// the flusher actually stores.
pub trait BulkInserter: Send + Sync {
    fn insert(&self, table: &'static str, rows: Vec<Row>) -> impl Future<Output = anyhow::Result<()>> + Send;
}

/// Object-safe counterpart used wherever the store is held as `Arc<dyn _>`.
pub trait BulkInserterBoxed: Send + Sync {
    fn insert_boxed(
        &self,
        table: &'static str,
        rows: Vec<Row>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>>;
}

impl<T: BulkInserter> BulkInserterBoxed for T {
    fn insert_boxed(
        &self,
        table: &'static str,
        rows: Vec<Row>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        Box::pin(self.insert(table, rows))
    }
}

/// Stand-in used when no real columnar store driver is wired in (the driver
/// itself is out of scope for the core, spec §1): logs a summary per call
/// instead of persisting anything.
pub struct LoggingInserter;

impl BulkInserter for LoggingInserter {
    async fn insert(&self, table: &'static str, rows: Vec<Row>) -> anyhow::Result<()> {
        tracing::info!(table, rows = rows.len(), "bulk insert (no store driver configured)");
        Ok(())
    }
}

#[cfg(test)]
pub mod test_doubles {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records every call it receives, for assertions on row counts and
    /// per-table call counts.
    #[derive(Default)]
    pub struct RecordingInserter {
        pub calls: Mutex<Vec<(String, usize)>>,
    }

    impl BulkInserter for RecordingInserter {
        async fn insert(&self, table: &'static str, rows: Vec<Row>) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push((table.to_string(), rows.len()));
            Ok(())
        }
    }

    /// Sleeps before acking, used to exercise gate backpressure (spec §8
    /// property 9).
    pub struct SlowInserter {
        pub delay: Duration,
        pub calls: Mutex<Vec<(String, usize)>>,
    }

    impl SlowInserter {
        pub fn new(delay: Duration) -> Self {
            Self { delay, calls: Mutex::new(Vec::new()) }
        }
    }

    impl BulkInserter for SlowInserter {
        async fn insert(&self, table: &'static str, rows: Vec<Row>) -> anyhow::Result<()> {
            tokio::time::sleep(self.delay).await;
            self.calls.lock().unwrap().push((table.to_string(), rows.len()));
            Ok(())
        }
    }

    /// Always fails, for exercising the swallow-and-log error path.
    pub struct FailingInserter;

    impl BulkInserter for FailingInserter {
        async fn insert(&self, table: &'static str, _rows: Vec<Row>) -> anyhow::Result<()> {
            anyhow::bail!("store unavailable for table {table}")
        }
    }
}
