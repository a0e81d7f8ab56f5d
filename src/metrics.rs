//! Counters the source never exposed but spec §9 recommends at minimum.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct Metrics {
    pub flush_ok: AtomicU64,
    pub flush_err_index: AtomicU64,
    pub flush_err_data: AtomicU64,
    pub dropped: AtomicU64,
    pub spans_ingested: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_flush_ok(&self) {
        self.flush_ok.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_flush_err(&self, table: &str) {
        match table {
            crate::store::TABLE_SPANS_INDEX => self.flush_err_index.fetch_add(1, Ordering::Relaxed),
            crate::store::TABLE_SPANS_DATA => self.flush_err_data.fetch_add(1, Ordering::Relaxed),
            _ => self.dropped.fetch_add(1, Ordering::Relaxed),
        };
    }

    pub fn record_ingested(&self, n: u64) {
        self.spans_ingested.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot_json(&self) -> serde_json::Value {
        serde_json::json!({
            "ingest.flush.ok": self.flush_ok.load(Ordering::Relaxed),
            "ingest.flush.err.spans_index": self.flush_err_index.load(Ordering::Relaxed),
            "ingest.flush.err.spans_data": self.flush_err_data.load(Ordering::Relaxed),
            "ingest.dropped": self.dropped.load(Ordering::Relaxed),
            "ingest.spans": self.spans_ingested.load(Ordering::Relaxed),
        })
    }
}
