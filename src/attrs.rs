//! Attribute values and the merged attribute map carried by every `Span`.

use std::collections::HashMap;

use opentelemetry_proto::tonic::common::v1::{any_value::Value as WireValue, AnyValue, KeyValue};

/// The maximum byte length a `SpanIndex` attribute value is truncated to.
pub const MAX_ATTR_VALUE_LEN: usize = 200;

/// A single OTLP attribute value, widened to the variant set the core cares about.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum AttrValue {
    String(String),
    Bool(bool),
    Int64(i64),
    Float64(f64),
    StringArray(Vec<String>),
    BoolArray(Vec<bool>),
    Int64Array(Vec<i64>),
    Float64Array(Vec<f64>),
}

impl AttrValue {
    /// Stable canonical rendering used for `SpanIndex.AttrValues` and for
    /// building fingerprint inputs: strings unquoted, scalars via their
    /// decimal/boolean forms, arrays bracketed and comma-separated.
    pub fn as_canonical_string(&self) -> String {
        match self {
            AttrValue::String(s) => s.clone(),
            AttrValue::Bool(b) => b.to_string(),
            AttrValue::Int64(i) => i.to_string(),
            AttrValue::Float64(f) => f.to_string(),
            AttrValue::StringArray(v) => format!("[{}]", v.join(", ")),
            AttrValue::BoolArray(v) => {
                format!("[{}]", v.iter().map(|b| b.to_string()).collect::<Vec<_>>().join(", "))
            }
            AttrValue::Int64Array(v) => {
                format!("[{}]", v.iter().map(|i| i.to_string()).collect::<Vec<_>>().join(", "))
            }
            AttrValue::Float64Array(v) => {
                format!("[{}]", v.iter().map(|f| f.to_string()).collect::<Vec<_>>().join(", "))
            }
        }
    }
}

/// Converts a wire `AnyValue` into our internal variant. Unrecognized/kvlist
/// values fall back to their canonical string form as a plain `String`,
/// since the data model (spec §3) does not have a map variant.
pub fn from_wire_value(value: &Option<AnyValue>) -> Option<AttrValue> {
    let v = value.as_ref()?.value.as_ref()?;
    Some(match v {
        WireValue::StringValue(s) => AttrValue::String(s.clone()),
        WireValue::BoolValue(b) => AttrValue::Bool(*b),
        WireValue::IntValue(i) => AttrValue::Int64(*i),
        WireValue::DoubleValue(d) => AttrValue::Float64(*d),
        WireValue::BytesValue(b) => AttrValue::String(hex::encode(b)),
        WireValue::ArrayValue(arr) => array_to_attr_value(arr),
        WireValue::KvlistValue(kv) => {
            let parts: Vec<String> = kv
                .values
                .iter()
                .map(|kv| {
                    let rendered = from_wire_value(&kv.value)
                        .map(|v| v.as_canonical_string())
                        .unwrap_or_default();
                    format!("{}={}", kv.key, rendered)
                })
                .collect();
            AttrValue::String(format!("{{{}}}", parts.join(", ")))
        }
    })
}

fn array_to_attr_value(arr: &opentelemetry_proto::tonic::common::v1::ArrayValue) -> AttrValue {
    let values: Vec<Option<AttrValue>> = arr.values.iter().map(|v| from_wire_value(&Some(v.clone()))).collect();
    if values.iter().all(|v| matches!(v, Some(AttrValue::Int64(_)))) {
        return AttrValue::Int64Array(
            values.into_iter().map(|v| if let Some(AttrValue::Int64(i)) = v { i } else { 0 }).collect(),
        );
    }
    if values.iter().all(|v| matches!(v, Some(AttrValue::Float64(_)))) {
        return AttrValue::Float64Array(
            values.into_iter().map(|v| if let Some(AttrValue::Float64(f)) = v { f } else { 0.0 }).collect(),
        );
    }
    if values.iter().all(|v| matches!(v, Some(AttrValue::Bool(_)))) {
        return AttrValue::BoolArray(
            values.into_iter().map(|v| if let Some(AttrValue::Bool(b)) = v { b } else { false }).collect(),
        );
    }
    AttrValue::StringArray(
        values
            .into_iter()
            .map(|v| v.map(|v| v.as_canonical_string()).unwrap_or_default())
            .collect(),
    )
}

/// Unordered mapping from attribute key to value. Keys are unique.
pub type AttrMap = HashMap<String, AttrValue>;

/// Inserts every wire `KeyValue` into `into`, overwriting on key collision.
pub fn merge_key_values(into: &mut AttrMap, kvs: &[KeyValue]) {
    for kv in kvs {
        if let Some(value) = from_wire_value(&kv.value) {
            into.insert(kv.key.clone(), value);
        }
    }
}

/// Reads a string-rendered attribute, regardless of its underlying variant.
pub fn attr_str(attrs: &AttrMap, key: &str) -> Option<String> {
    attrs.get(key).map(|v| v.as_canonical_string())
}

pub fn has_attr(attrs: &AttrMap, key: &str) -> bool {
    attrs.contains_key(key)
}

/// `ServiceName(Attrs)` from spec §4.A: `attrs["service.name"]` or empty string.
pub fn service_name(attrs: &AttrMap) -> String {
    attr_str(attrs, "service.name").unwrap_or_default()
}

/// Truncates a string to at most `MAX_ATTR_VALUE_LEN` bytes without splitting
/// a UTF-8 code point.
pub fn truncate_utf8_safe(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}
