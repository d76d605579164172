//! Reserved metadata vocabulary and document key composition.
//!
//! Metadata fields are namespaced with a `&` sigil so they can never collide
//! with application fields; [`is_meta`]/[`is_not_meta`] partition every
//! document's fields into these two disjoint sets.

use serde_json::{Map, Value};

use super::status::DocStatus;

pub const META_PREFIX: char = '&';

pub const ID: &str = "&id";
pub const MODEL: &str = "&model";
pub const PARENT: &str = "&parent";
pub const TIMESTAMP: &str = "&timestamp";
pub const STATUS: &str = "&status";
pub const USER: &str = "&user";
pub const COMMENT: &str = "&comment";
pub const ANCESTOR: &str = "&ancestor";
pub const EXPIRY: &str = "&expiry";
pub const RESULT: &str = "&result";

/// Suffix deriving the shadow model a pending change is written under.
pub const APPROVAL_SUFFIX: &str = "$approval";

pub fn is_meta(field: &str) -> bool {
    field.starts_with(META_PREFIX)
}

pub fn is_not_meta(field: &str) -> bool {
    !is_meta(field)
}

/// The application (non-metadata) fields of a document.
pub fn content_fields(doc: &Map<String, Value>) -> Map<String, Value> {
    doc.iter()
        .filter(|(k, _)| is_not_meta(k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Stable key of a live document, unchanged across updates.
pub fn urn(model: &str, id: &str) -> String {
    format!("{model}:{id}")
}

/// Timestamp-qualified key, unique per write. Used as the advisory-lock token
/// and as the archived-ancestor document id.
pub fn simple_key(model: &str, parent: Option<&str>, id: &str, timestamp: i64) -> String {
    match parent {
        Some(p) => format!("{model}:{p}:{id}:{timestamp}"),
        None => format!("{model}:{id}:{timestamp}"),
    }
}

/// The shadow model name pending changes for `model` are written under.
pub fn approval_model(model: &str) -> String {
    format!("{model}{APPROVAL_SUFFIX}")
}

/// Read `&timestamp` from a stored document.
pub fn doc_timestamp(doc: &Map<String, Value>) -> Option<i64> {
    doc.get(TIMESTAMP).and_then(Value::as_i64)
}

/// Read `&status` from a stored document.
pub fn doc_status(doc: &Map<String, Value>) -> Option<DocStatus> {
    doc.get(STATUS).and_then(Value::as_str).and_then(DocStatus::parse)
}
