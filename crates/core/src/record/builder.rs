use chrono::Utc;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use super::{IndexRecord, RecordAction};
use crate::document::{meta, DocStatus};
use crate::error::CommitError;

/// Builds an [`IndexRecord`], stamping the reserved metadata fields into a
/// copy of the payload. Missing required fields fail fast at [`build`], not
/// later during commit.
///
/// [`build`]: Builder::build
#[derive(Debug, Clone)]
pub struct Builder {
    index: String,
    model: String,
    action: RecordAction,
    id: Option<String>,
    parent: Option<String>,
    timestamp: Option<i64>,
    base_version: Option<i64>,
    source: Map<String, Value>,
    ancillary: Map<String, Value>,
    pipeline: Option<String>,
}

impl Builder {
    pub(crate) fn new(
        index: impl Into<String>,
        model: impl Into<String>,
        action: RecordAction,
        source: Map<String, Value>,
    ) -> Self {
        Self {
            index: index.into(),
            model: model.into(),
            action,
            id: None,
            parent: None,
            timestamp: None,
            base_version: None,
            source,
            ancillary: Map::new(),
            pipeline: None,
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn base_version(mut self, base_version: i64) -> Self {
        self.base_version = Some(base_version);
        self
    }

    /// Required. Also seeds the ancillary `&expiry`, used when this version
    /// is later archived.
    pub fn timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self.ancillary.insert(meta::EXPIRY.to_string(), json!(timestamp));
        self
    }

    /// [`timestamp`](Builder::timestamp) with the current wall clock, in
    /// milliseconds.
    pub fn timestamp_now(self) -> Self {
        let now = Utc::now().timestamp_millis();
        self.timestamp(now)
    }

    /// Stamp the acting user onto the live payload.
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.source.insert(meta::USER.to_string(), json!(user.into()));
        self
    }

    /// Stamp a comment; `meta = true` lands it on the live payload,
    /// `meta = false` on the archive-only ancillary map.
    pub fn comment(mut self, comment: impl Into<String>, meta_field: bool) -> Self {
        let target = if meta_field { &mut self.source } else { &mut self.ancillary };
        target.insert(meta::COMMENT.to_string(), json!(comment.into()));
        self
    }

    pub fn status(mut self, status: DocStatus) -> Self {
        self.source
            .insert(meta::STATUS.to_string(), json!(status.as_str()));
        self
    }

    /// Server-side processing pipeline applied on write.
    pub fn pipeline(mut self, pipeline: impl Into<String>) -> Self {
        self.pipeline = Some(pipeline.into());
        self
    }

    pub fn build(mut self) -> Result<IndexRecord, CommitError> {
        let timestamp = self.timestamp.ok_or_else(|| {
            CommitError::Precondition("timestamp is required before build".into())
        })?;

        let id = match self.id.take() {
            Some(id) => id,
            None if self.action == RecordAction::Create => content_id(&self.source),
            None => {
                return Err(CommitError::Precondition(format!(
                    "id is required for {} records",
                    self.action.result_label()
                )))
            }
        };

        self.source.insert(meta::ID.to_string(), json!(id));
        self.source.insert(meta::MODEL.to_string(), json!(self.model));
        if let Some(parent) = &self.parent {
            self.source.insert(meta::PARENT.to_string(), json!(parent));
        }
        self.source
            .insert(meta::TIMESTAMP.to_string(), json!(timestamp));

        Ok(IndexRecord {
            index: self.index,
            model: self.model,
            id,
            parent: self.parent,
            timestamp,
            action: self.action,
            base_version: self.base_version,
            source: self.source,
            ancillary: self.ancillary,
            pipeline: self.pipeline,
        })
    }
}

/// Content-addressed id: hex of the SHA-256 of the canonical JSON of the
/// non-metadata payload, truncated to 32 chars. Two creates with identical
/// content and no explicit id always get the same id.
fn content_id(source: &Map<String, Value>) -> String {
    let content = meta::content_fields(source);
    let bytes = serde_json::to_vec(&Value::Object(content))
        .expect("a JSON object always serializes");
    let digest = Sha256::digest(&bytes);
    hex::encode(digest)[..32].to_string()
}
