//! Deterministic span classification (`System`) and fingerprinting (`GroupID`).

use crate::attrs::{attr_str, has_attr, service_name, AttrMap};
use crate::span::Span;

/// Fixed seed so `GroupID` is stable within a process's lifetime (spec §9);
/// cross-deployment stability is explicitly not required.
const HASH_SEED: u64 = 0;

/// SQL keywords mixed into the fingerprint when a span carries `db.statement`.
/// Everything else — literals, identifiers, whitespace — is discarded so that
/// statements differing only in literals collapse onto the same `GroupID`.
const SQL_KEYWORDS: &[&str] = &[
    "SELECT", "INSERT", "UPDATE", "DELETE", "CREATE", "DROP", "TRUNCATE", "WITH", "FROM", "TABLE",
    "JOIN", "UNION", "WHERE", "GROUP", "LIMIT", "ORDER", "HAVING",
];

/// Classifies `span` in place: assigns `System`, rewrites `Name` when a rule
/// says so (currently only the `db.statement` rule), and computes `GroupID`.
pub fn classify(span: &mut Span) {
    let svc = service_name(&span.attrs);
    let mut extra = String::new();

    let system = if has_attr(&span.attrs, "rpc.system") {
        format!("rpc:{}", svc)
    } else if let Some(messaging_system) = attr_str(&span.attrs, "messaging.system") {
        format!("messaging:{}", messaging_system)
    } else if let Some(db_system) = attr_str(&span.attrs, "db.system") {
        if let Some(table) = attr_str(&span.attrs, "db.sql.table") {
            extra.push_str(&table);
        }
        if let Some(statement) = attr_str(&span.attrs, "db.statement") {
            span.name = statement.clone();
            extra.push_str(&sql_keywords(&statement));
        }
        format!("db:{}", db_system)
    } else if has_attr(&span.attrs, "http.route") || has_attr(&span.attrs, "http.target") {
        format!("http:{}", svc)
    } else if span.parent_id == 0 || span.kind != "internal" {
        format!("service:{}", svc)
    } else {
        "internal".to_string()
    };

    let mut input = String::with_capacity(span.kind.len() + span.name.len() + system.len() + extra.len());
    input.push_str(&span.kind);
    input.push_str(&span.name);
    input.push_str(&system);
    input.push_str(&extra);

    span.group_id = xxhash_rust::xxh64::xxh64(input.as_bytes(), HASH_SEED);
    span.system = system;
}

/// Tokenizes `statement` on non-identifier boundaries and returns the
/// concatenation (uppercased, in encounter order) of tokens that match
/// `SQL_KEYWORDS` case-insensitively.
fn sql_keywords(statement: &str) -> String {
    let mut out = String::new();
    for token in statement.split(|c: char| !c.is_ascii_alphanumeric() && c != '_') {
        if token.is_empty() {
            continue;
        }
        let upper = token.to_ascii_uppercase();
        if SQL_KEYWORDS.contains(&upper.as_str()) {
            out.push_str(&upper);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs::AttrValue;

    fn base_span() -> Span {
        Span {
            project_id: 1,
            id: 1,
            parent_id: 0,
            trace_id: 1,
            name: "query".into(),
            kind: "client".into(),
            system: String::new(),
            group_id: 0,
            time: 0,
            duration: 0,
            status_code: "unset".into(),
            status_message: String::new(),
            attrs: AttrMap::new(),
            events: vec![],
            links: vec![],
        }
    }

    #[test]
    fn sql_statements_differing_only_in_literals_collapse() {
        let mut a = base_span();
        a.attrs.insert("db.system".into(), AttrValue::String("postgresql".into()));
        a.attrs.insert("db.sql.table".into(), AttrValue::String("users".into()));
        a.attrs
            .insert("db.statement".into(), AttrValue::String("SELECT * FROM users WHERE id = 1".into()));

        let mut b = base_span();
        b.attrs.insert("db.system".into(), AttrValue::String("postgresql".into()));
        b.attrs.insert("db.sql.table".into(), AttrValue::String("users".into()));
        b.attrs
            .insert("db.statement".into(), AttrValue::String("SELECT * FROM users WHERE id = 42".into()));

        classify(&mut a);
        classify(&mut b);

        assert_eq!(a.system, "db:postgresql");
        assert_eq!(b.system, "db:postgresql");
        assert_eq!(a.group_id, b.group_id);
        assert_eq!(a.name, "SELECT * FROM users WHERE id = 1");
        assert_eq!(b.name, "SELECT * FROM users WHERE id = 42");
    }

    #[test]
    fn differing_table_changes_group_id() {
        let mut a = base_span();
        a.attrs.insert("db.system".into(), AttrValue::String("postgresql".into()));
        a.attrs.insert("db.sql.table".into(), AttrValue::String("users".into()));
        a.attrs
            .insert("db.statement".into(), AttrValue::String("SELECT * FROM users WHERE id = 1".into()));

        let mut b = base_span();
        b.attrs.insert("db.system".into(), AttrValue::String("postgresql".into()));
        b.attrs.insert("db.sql.table".into(), AttrValue::String("orders".into()));
        b.attrs
            .insert("db.statement".into(), AttrValue::String("SELECT * FROM users WHERE id = 1".into()));

        classify(&mut a);
        classify(&mut b);

        assert_ne!(a.group_id, b.group_id);
    }

    #[test]
    fn rpc_wins_over_http() {
        let mut span = base_span();
        span.attrs.insert("rpc.system".into(), AttrValue::String("grpc".into()));
        span.attrs.insert("http.route".into(), AttrValue::String("/users/:id".into()));
        span.attrs.insert("service.name".into(), AttrValue::String("api".into()));

        classify(&mut span);
        assert!(span.system.starts_with("rpc:"));
    }

    #[test]
    fn service_fallback_for_root_server_span() {
        let mut span = base_span();
        span.kind = "server".into();
        span.name = "GET /home".into();
        span.parent_id = 0;
        span.attrs.insert("service.name".into(), AttrValue::String("web".into()));

        classify(&mut span);
        assert_eq!(span.system, "service:web");
    }

    #[test]
    fn http_route_cascade() {
        let mut span = base_span();
        span.kind = "server".into();
        span.attrs.insert("http.route".into(), AttrValue::String("/users/:id".into()));
        span.attrs.insert("service.name".into(), AttrValue::String("api".into()));

        classify(&mut span);
        assert_eq!(span.system, "http:api");
    }

    #[test]
    fn internal_child_with_no_system_attrs() {
        let mut span = base_span();
        span.kind = "internal".into();
        span.parent_id = 42;

        classify(&mut span);
        assert_eq!(span.system, "internal");
    }
}
