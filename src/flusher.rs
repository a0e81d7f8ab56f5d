//! Materializes one batch into the two-table bulk insert (spec §4.E).

use std::sync::Arc;

use crate::builder::{build, OtlpSpanItem};
use crate::metrics::Metrics;
use crate::store::{BulkInserterBoxed, Row, TABLE_SPANS_DATA, TABLE_SPANS_INDEX};

/// Runs span builder over every item in `batch`, then issues the two bulk
/// inserts independently. Each insert's error is logged with the table name
/// and batch size and then swallowed — there is no retry and no dead-letter
/// (spec §7).
pub async fn flush_batch(batch: Vec<OtlpSpanItem>, store: Arc<dyn BulkInserterBoxed>, metrics: Arc<Metrics>) {
    let n = batch.len();
    let mut index_rows = Vec::with_capacity(n);
    let mut data_rows = Vec::with_capacity(n);

    for item in &batch {
        let (_, index, data) = build(item);
        index_rows.push(Row::Index(index));
        data_rows.push(Row::Data(data));
    }

    if let Err(err) = store.insert_boxed(TABLE_SPANS_DATA, data_rows).await {
        tracing::error!(table = TABLE_SPANS_DATA, rows = n, %err, "bulk insert failed");
        metrics.record_flush_err(TABLE_SPANS_DATA);
    } else {
        metrics.record_flush_ok();
    }

    if let Err(err) = store.insert_boxed(TABLE_SPANS_INDEX, index_rows).await {
        tracing::error!(table = TABLE_SPANS_INDEX, rows = n, %err, "bulk insert failed");
        metrics.record_flush_err(TABLE_SPANS_INDEX);
    } else {
        metrics.record_flush_ok();
    }

    metrics.record_ingested(n as u64);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs::AttrMap;
    use crate::project::Project;
    use crate::store::test_doubles::{FailingInserter, RecordingInserter};
    use opentelemetry_proto::tonic::trace::v1::Span as WireSpan;

    fn item() -> OtlpSpanItem {
        OtlpSpanItem {
            project: Arc::new(Project { id: 1, name: "demo".into(), token: "t".into() }),
            resource: AttrMap::new(),
            wire: WireSpan { name: "op".into(), ..Default::default() },
        }
    }

    #[tokio::test]
    async fn flush_calls_both_tables_with_matching_row_counts() {
        let store: Arc<RecordingInserter> = Arc::new(RecordingInserter::default());
        let metrics = Arc::new(Metrics::new());
        flush_batch(vec![item(), item(), item()], store.clone(), metrics).await;

        let calls = store.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().any(|(t, n)| t == TABLE_SPANS_DATA && *n == 3));
        assert!(calls.iter().any(|(t, n)| t == TABLE_SPANS_INDEX && *n == 3));
    }

    #[tokio::test]
    async fn failing_store_is_swallowed_and_counted() {
        let store: Arc<FailingInserter> = Arc::new(FailingInserter);
        let metrics = Arc::new(Metrics::new());
        flush_batch(vec![item()], store, metrics.clone()).await;

        assert!(metrics.flush_err_data.load(std::sync::atomic::Ordering::Relaxed) >= 1);
        assert!(metrics.flush_err_index.load(std::sync::atomic::Ordering::Relaxed) >= 1);
    }
}
