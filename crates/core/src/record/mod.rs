//! The mutation intent: an immutable [`IndexRecord`] plus its [`Builder`].

mod builder;

pub use builder::Builder;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::document::{meta, DocStatus};

/// What a record does to its document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordAction {
    Create,
    Update,
    Delete,
    Approve,
    Reject,
    Discard,
}

impl RecordAction {
    /// The `&result` string echoed in a commit receipt.
    pub fn result_label(&self) -> &'static str {
        match self {
            RecordAction::Create => "created",
            RecordAction::Update => "updated",
            RecordAction::Delete => "deleted",
            RecordAction::Approve => "approved",
            RecordAction::Reject => "rejected",
            RecordAction::Discard => "discarded",
        }
    }

    /// Whether the primary write removes the live document.
    pub fn is_delete(&self) -> bool {
        matches!(self, RecordAction::Delete)
    }

    /// Status stamped on the archived ancestor this action supersedes.
    pub fn archive_status(&self) -> DocStatus {
        match self {
            RecordAction::Delete => DocStatus::Deleted,
            _ => DocStatus::Updated,
        }
    }
}

/// An in-flight mutation intent against one document. Immutable once built;
/// the builder copies metadata into a fresh payload rather than mutating
/// caller-owned state.
#[derive(Debug, Clone)]
pub struct IndexRecord {
    pub(crate) index: String,
    pub(crate) model: String,
    pub(crate) id: String,
    pub(crate) parent: Option<String>,
    pub(crate) timestamp: i64,
    pub(crate) action: RecordAction,
    pub(crate) base_version: Option<i64>,
    pub(crate) source: Map<String, Value>,
    pub(crate) ancillary: Map<String, Value>,
    pub(crate) pipeline: Option<String>,
}

impl IndexRecord {
    /// A new-document record. With no explicit id the builder derives one
    /// from a content hash of the payload, making creation idempotent on
    /// content.
    pub fn create(
        index: impl Into<String>,
        model: impl Into<String>,
        source: Map<String, Value>,
    ) -> Builder {
        Builder::new(index, model, RecordAction::Create, source)
    }

    /// An update of an existing document. `base_version` is the timestamp the
    /// caller believes is current; STRICT validation rejects the write when
    /// it is stale or absent.
    pub fn update(
        index: impl Into<String>,
        model: impl Into<String>,
        id: impl Into<String>,
        base_version: Option<i64>,
        source: Map<String, Value>,
    ) -> Builder {
        let mut b = Builder::new(index, model, RecordAction::Update, source).id(id);
        if let Some(v) = base_version {
            b = b.base_version(v);
        }
        b
    }

    /// A delete of an existing document.
    pub fn delete(
        index: impl Into<String>,
        model: impl Into<String>,
        id: impl Into<String>,
        base_version: Option<i64>,
    ) -> Builder {
        let mut b = Builder::new(index, model, RecordAction::Delete, Map::new()).id(id);
        if let Some(v) = base_version {
            b = b.base_version(v);
        }
        b
    }

    /// A record with an explicit action, used by the approval workflow's
    /// shadow transitions.
    pub fn with_action(
        index: impl Into<String>,
        model: impl Into<String>,
        action: RecordAction,
        source: Map<String, Value>,
    ) -> Builder {
        Builder::new(index, model, action, source)
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn action(&self) -> RecordAction {
        self.action
    }

    pub fn base_version(&self) -> Option<i64> {
        self.base_version
    }

    /// The payload as written to the store, metadata included.
    pub fn source(&self) -> &Map<String, Value> {
        &self.source
    }

    /// Extra fields written only to the archived ancestor copy.
    pub fn ancillary(&self) -> &Map<String, Value> {
        &self.ancillary
    }

    pub fn pipeline(&self) -> Option<&str> {
        self.pipeline.as_deref()
    }

    /// Stable document key, `model:id`. Identifies the live document for the
    /// record's whole lifetime across updates.
    pub fn key_string(&self) -> String {
        meta::urn(&self.model, &self.id)
    }

    /// Timestamp-qualified key, unique per write. The advisory-lock token.
    pub fn simple_key(&self) -> String {
        meta::simple_key(&self.model, self.parent(), &self.id, self.timestamp)
    }

    /// The non-metadata payload, the unit of idempotence comparison.
    pub fn content(&self) -> Map<String, Value> {
        meta::content_fields(&self.source)
    }

    /// Copy of this record whose payload points at an archived ancestor.
    pub(crate) fn with_ancestor(&self, ancestor_key: &str) -> IndexRecord {
        let mut copy = self.clone();
        copy.source
            .insert(meta::ANCESTOR.to_string(), Value::String(ancestor_key.to_string()));
        copy
    }
}
