//! The internal span representation and its two columnar projections.

use crate::attrs::AttrMap;

/// A single unit of work, fully classified and enriched. Lives only for the
/// duration of one flush.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Span {
    pub project_id: u32,
    pub id: u64,
    pub parent_id: u64,
    pub trace_id: u128,
    pub name: String,
    pub kind: String,
    pub system: String,
    pub group_id: u64,
    /// Nanoseconds since the Unix epoch.
    pub time: u64,
    /// Nanoseconds, saturating at 0 if `end <= start`.
    pub duration: u64,
    pub status_code: String,
    pub status_message: String,
    pub attrs: AttrMap,
    pub events: Vec<SpanEvent>,
    pub links: Vec<SpanLink>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SpanEvent {
    pub name: String,
    pub time: u64,
    pub attrs: AttrMap,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SpanLink {
    pub trace_id: u128,
    pub span_id: u64,
    pub attrs: AttrMap,
}

/// Narrow, queryable projection of a `Span`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SpanIndex {
    pub project_id: u32,
    pub id: u64,
    pub parent_id: u64,
    pub trace_id: u128,
    pub name: String,
    pub kind: String,
    pub system: String,
    pub group_id: u64,
    pub time: u64,
    pub duration: u64,
    pub status_code: String,
    pub status_message: String,
    pub count: u32,
    pub attr_keys: Vec<String>,
    pub attr_values: Vec<String>,
    pub service_name: String,
    pub host_name: String,
    pub event_count: u8,
    /// Reserved: never populated, see design note on future aggregation.
    pub event_error_count: u8,
    /// Reserved: never populated, see design note on future aggregation.
    pub event_log_count: u8,
}

/// Wide, blob-carrying projection of a `Span`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SpanData {
    pub trace_id: u128,
    pub id: u64,
    pub parent_id: u64,
    pub time: u64,
    pub data: Vec<u8>,
}
