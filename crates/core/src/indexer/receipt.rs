use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::approval::Notification;
use crate::document::DocStatus;
use crate::record::IndexRecord;

/// Commit outcome echoed to the caller, serialized under the reserved
/// metadata field names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveReceipt {
    #[serde(rename = "&model")]
    pub model: String,
    #[serde(rename = "&id")]
    pub id: String,
    /// For a no-op this echoes the STORED document's timestamp, not the
    /// submitted one.
    #[serde(rename = "&timestamp")]
    pub timestamp: i64,
    /// `created`/`updated`/`deleted`/`approved`/`rejected`/`discarded`, or
    /// `noop` for an idempotent resubmission.
    #[serde(rename = "&result")]
    pub result: String,
    #[serde(rename = "&status", skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(rename = "&version", skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
}

impl SaveReceipt {
    pub(crate) fn committed(record: &IndexRecord, version: i64) -> Self {
        Self {
            model: record.model().to_string(),
            id: record.id().to_string(),
            timestamp: record.timestamp(),
            result: record.action().result_label().to_string(),
            status: None,
            version: Some(version),
        }
    }

    pub(crate) fn noop(
        model: String,
        id: String,
        timestamp: i64,
        status: Option<DocStatus>,
    ) -> Self {
        Self {
            model,
            id,
            timestamp,
            result: "noop".to_string(),
            status: status.map(|s| s.as_str().to_string()),
            version: None,
        }
    }

    pub fn is_noop(&self) -> bool {
        self.result == "noop"
    }
}

/// Outcome of a lenient bulk commit.
#[derive(Debug)]
pub struct BulkReceipt {
    /// Correlates the batch across logs and notifications.
    pub transaction_id: String,
    /// Whether any failure survived the bulk's `IgnoreErrors` policy.
    pub errors_found: bool,
    /// Per-record outcome, keyed by the record's stable key (`model:id`).
    pub outcomes: BTreeMap<String, String>,
    /// Per-record failure detail, keyed by the record's stable key; already
    /// filtered through the `IgnoreErrors` policy.
    pub failures: BTreeMap<String, String>,
    pub notification: Option<Notification>,
}
