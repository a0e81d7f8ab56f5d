//! Translates one wire span + its resource attributes into the internal
//! `Span`, `SpanIndex`, `SpanData` triple (spec §4.B).

use std::sync::Arc;

use opentelemetry_proto::tonic::trace::v1::{span as wire_span, Span as WireSpan};

use crate::attrs::{self, attr_str, AttrMap, MAX_ATTR_VALUE_LEN};
use crate::fingerprint::classify;
use crate::project::Project;
use crate::span::{Span, SpanData, SpanEvent, SpanIndex, SpanLink};

/// A single decoded OTLP span, still paired with the per-scope resource
/// attribute map it arrived with and the project it was authenticated
/// against. Lives from enqueue until flush.
#[derive(Clone)]
pub struct OtlpSpanItem {
    pub project: Arc<Project>,
    pub wire: WireSpan,
    pub resource: AttrMap,
}

/// Builds the `(Span, SpanIndex, SpanData)` triple for one queued item.
pub fn build(item: &OtlpSpanItem) -> (Span, SpanIndex, SpanData) {
    let wire = &item.wire;

    let id = decode_id_u64(&wire.span_id);
    let parent_id = decode_id_u64(&wire.parent_span_id);
    let trace_id = decode_id_u128(&wire.trace_id);

    let kind = kind_to_str(wire.kind);

    let time = wire.start_time_unix_nano;
    let duration = wire.end_time_unix_nano.saturating_sub(wire.start_time_unix_nano);

    let (status_code, status_message) = match &wire.status {
        None => ("unset".to_string(), String::new()),
        Some(status) => {
            let code = match status.code {
                1 => "ok",
                2 => "error",
                _ => "unset",
            };
            (code.to_string(), status.message.clone())
        }
    };

    let mut merged_attrs = item.resource.clone();
    attrs::merge_key_values(&mut merged_attrs, &wire.attributes);

    let original_name = wire.name.clone();
    let events: Vec<SpanEvent> = wire.events.iter().map(|e| build_event(e, &original_name)).collect();

    let links: Vec<SpanLink> = wire.links.iter().map(build_link).collect();

    let mut span = Span {
        project_id: item.project.id,
        id,
        parent_id,
        trace_id,
        name: original_name,
        kind,
        system: String::new(),
        group_id: 0,
        time,
        duration,
        status_code,
        status_message,
        attrs: merged_attrs,
        events,
        links,
    };

    classify(&mut span);

    let index = project_index(&span);
    let data = project_data(&span);

    (span, index, data)
}

fn decode_id_u64(bytes: &[u8]) -> u64 {
    if bytes.is_empty() || bytes.iter().all(|&b| b == 0) {
        return 0;
    }
    let mut buf = [0u8; 8];
    let n = bytes.len().min(8);
    buf[..n].copy_from_slice(&bytes[..n]);
    u64::from_le_bytes(buf)
}

fn decode_id_u128(bytes: &[u8]) -> u128 {
    if bytes.is_empty() || bytes.iter().all(|&b| b == 0) {
        return 0;
    }
    let mut buf = [0u8; 16];
    let n = bytes.len().min(16);
    buf[..n].copy_from_slice(&bytes[..n]);
    u128::from_le_bytes(buf)
}

fn kind_to_str(kind: i32) -> String {
    use wire_span::SpanKind;
    match SpanKind::try_from(kind).unwrap_or(SpanKind::Unspecified) {
        SpanKind::Unspecified => "unspecified",
        SpanKind::Internal => "internal",
        SpanKind::Server => "server",
        SpanKind::Client => "client",
        SpanKind::Producer => "producer",
        SpanKind::Consumer => "consumer",
    }
    .to_string()
}

/// `join(type, message)` from spec §4.B step 6.
fn join_type_message(ty: &str, message: &str) -> String {
    if message.is_empty() {
        return ty.to_string();
    }
    if ty.is_empty() {
        return message.to_string();
    }
    if message.starts_with(ty) {
        return message.to_string();
    }
    format!("{}: {}", ty, message)
}

fn build_event(event: &wire_span::Event, span_name: &str) -> SpanEvent {
    let mut event_attrs = AttrMap::new();
    attrs::merge_key_values(&mut event_attrs, &event.attributes);

    let name = match event.name.as_str() {
        "log" => {
            if let Some(message) = attr_str(&event_attrs, "log.message") {
                match attr_str(&event_attrs, "log.severity") {
                    Some(severity) => format!("{} {}", severity, message),
                    None => message,
                }
            } else {
                let ty = attr_str(&event_attrs, "exception.type");
                let message = attr_str(&event_attrs, "exception.message");
                if ty.is_some() || message.is_some() {
                    join_type_message(&ty.unwrap_or_default(), &message.unwrap_or_default())
                } else {
                    event.name.clone()
                }
            }
        }
        "exception" => {
            let ty = attr_str(&event_attrs, "exception.type").unwrap_or_default();
            let message = attr_str(&event_attrs, "exception.message").unwrap_or_default();
            join_type_message(&ty, &message)
        }
        "message" => {
            if let Some(op) = attr_str(&event_attrs, "messaging.operation") {
                format!("{} {}", span_name, op)
            } else if let Some(message_type) = attr_str(&event_attrs, "message.type") {
                format!("{} {}", span_name, message_type)
            } else {
                event.name.clone()
            }
        }
        other => other.to_string(),
    };

    SpanEvent { name, time: event.time_unix_nano, attrs: event_attrs }
}

fn build_link(link: &wire_span::Link) -> SpanLink {
    let mut link_attrs = AttrMap::new();
    attrs::merge_key_values(&mut link_attrs, &link.attributes);
    SpanLink { trace_id: decode_id_u128(&link.trace_id), span_id: decode_id_u64(&link.span_id), attrs: link_attrs }
}

fn project_index(span: &Span) -> SpanIndex {
    let mut attr_keys = Vec::with_capacity(span.attrs.len());
    let mut attr_values = Vec::with_capacity(span.attrs.len());
    for (k, v) in &span.attrs {
        attr_keys.push(k.clone());
        attr_values.push(attrs::truncate_utf8_safe(&v.as_canonical_string(), MAX_ATTR_VALUE_LEN));
    }

    SpanIndex {
        project_id: span.project_id,
        id: span.id,
        parent_id: span.parent_id,
        trace_id: span.trace_id,
        name: span.name.clone(),
        kind: span.kind.clone(),
        system: span.system.clone(),
        group_id: span.group_id,
        time: span.time,
        duration: span.duration,
        status_code: span.status_code.clone(),
        status_message: span.status_message.clone(),
        count: 1,
        attr_keys,
        attr_values,
        service_name: attr_str(&span.attrs, "service.name").unwrap_or_default(),
        host_name: attr_str(&span.attrs, "host.name").unwrap_or_default(),
        event_count: span.events.len().min(255) as u8,
        event_error_count: 0,
        event_log_count: 0,
    }
}

fn project_data(span: &Span) -> SpanData {
    let data = bincode::serialize(span).unwrap_or_else(|err| {
        tracing::error!(trace_id = %span.trace_id, id = span.id, %err, "span serialization failed, storing an empty blob");
        Vec::new()
    });
    SpanData { trace_id: span.trace_id, id: span.id, parent_id: span.parent_id, time: span.time, data }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs::AttrValue;
    use crate::project::Project;
    use opentelemetry_proto::tonic::common::v1::{any_value::Value, AnyValue, KeyValue};
    use opentelemetry_proto::tonic::trace::v1::Status as WireStatus;

    fn kv(key: &str, value: &str) -> KeyValue {
        KeyValue { key: key.to_string(), value: Some(AnyValue { value: Some(Value::StringValue(value.to_string())) }) }
    }

    fn project() -> Arc<Project> {
        Arc::new(Project { id: 9, name: "demo".into(), token: "tok".into() })
    }

    #[test]
    fn resource_then_span_attrs_merge_with_span_winning() {
        let mut resource = AttrMap::new();
        resource.insert("k".into(), AttrValue::String("A".into()));

        let item = OtlpSpanItem {
            project: project(),
            resource,
            wire: WireSpan { attributes: vec![kv("k", "B")], name: "op".into(), ..Default::default() },
        };

        let (span, _, _) = build(&item);
        assert_eq!(span.attrs.get("k"), Some(&AttrValue::String("B".into())));
    }

    #[test]
    fn zero_parent_span_id_normalizes_to_zero() {
        let item = OtlpSpanItem {
            project: project(),
            resource: AttrMap::new(),
            wire: WireSpan { parent_span_id: vec![0u8; 8], name: "op".into(), ..Default::default() },
        };
        let (span, _, _) = build(&item);
        assert_eq!(span.parent_id, 0);
    }

    #[test]
    fn exception_event_renamed() {
        let item = OtlpSpanItem {
            project: project(),
            resource: AttrMap::new(),
            wire: WireSpan {
                name: "op".into(),
                events: vec![wire_span::Event {
                    name: "exception".into(),
                    attributes: vec![kv("exception.type", "IOError"), kv("exception.message", "disk full")],
                    ..Default::default()
                }],
                ..Default::default()
            },
        };
        let (span, _, _) = build(&item);
        assert_eq!(span.events[0].name, "IOError: disk full");
    }

    #[test]
    fn log_event_with_severity() {
        let item = OtlpSpanItem {
            project: project(),
            resource: AttrMap::new(),
            wire: WireSpan {
                name: "op".into(),
                events: vec![wire_span::Event {
                    name: "log".into(),
                    attributes: vec![kv("log.message", "failed"), kv("log.severity", "ERROR")],
                    ..Default::default()
                }],
                ..Default::default()
            },
        };
        let (span, _, _) = build(&item);
        assert_eq!(span.events[0].name, "ERROR failed");
    }

    #[test]
    fn attr_values_truncated_and_parallel() {
        let long_value = "x".repeat(500);
        let item = OtlpSpanItem {
            project: project(),
            resource: AttrMap::new(),
            wire: WireSpan { attributes: vec![kv("big", &long_value)], name: "op".into(), ..Default::default() },
        };
        let (_, index, _) = build(&item);
        assert_eq!(index.attr_keys.len(), index.attr_values.len());
        for v in &index.attr_values {
            assert!(v.len() <= MAX_ATTR_VALUE_LEN);
        }
    }

    #[test]
    fn status_code_mapping() {
        let item = OtlpSpanItem {
            project: project(),
            resource: AttrMap::new(),
            wire: WireSpan {
                name: "op".into(),
                status: Some(WireStatus { code: 2, message: "boom".into() }),
                ..Default::default()
            },
        };
        let (span, _, _) = build(&item);
        assert_eq!(span.status_code, "error");
        assert_eq!(span.status_message, "boom");
    }
}
