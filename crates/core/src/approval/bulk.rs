use std::sync::Arc;

use crate::error::CommitError;
use crate::indexer::IgnoreErrors;
use crate::record::IndexRecord;
use crate::validate::{OverrideValidator, Validator};

use super::notify;

/// An ordered batch of records committed as one lenient bulk unit.
///
/// All records share one index/model/parent, one [`IgnoreErrors`] policy and
/// one [`Validator`]. Parent consistency is enforced when records are added,
/// never at commit time.
pub struct BulkRecord {
    index: String,
    model: String,
    parent: Option<String>,
    ignore_errors: IgnoreErrors,
    validator: Arc<dyn Validator>,
    notification: Option<notify::Builder>,
    records: Vec<IndexRecord>,
}

impl BulkRecord {
    pub fn builder(index: impl Into<String>, model: impl Into<String>) -> BulkRecordBuilder {
        BulkRecordBuilder {
            index: index.into(),
            model: model.into(),
            parent: None,
            ignore_errors: IgnoreErrors::Strict,
            validator: Arc::new(OverrideValidator),
            notification: None,
            records: Vec::new(),
        }
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn ignore_errors(&self) -> IgnoreErrors {
        self.ignore_errors
    }

    pub fn validator(&self) -> &dyn Validator {
        self.validator.as_ref()
    }

    pub fn records(&self) -> &[IndexRecord] {
        &self.records
    }

    pub(crate) fn notification_builder(&self) -> Option<notify::Builder> {
        self.notification.clone()
    }
}

pub struct BulkRecordBuilder {
    index: String,
    model: String,
    parent: Option<String>,
    ignore_errors: IgnoreErrors,
    validator: Arc<dyn Validator>,
    notification: Option<notify::Builder>,
    records: Vec<IndexRecord>,
}

impl std::fmt::Debug for BulkRecordBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkRecordBuilder")
            .field("index", &self.index)
            .field("model", &self.model)
            .field("parent", &self.parent)
            .field("ignore_errors", &self.ignore_errors)
            .field("notification", &self.notification)
            .field("records", &self.records)
            .finish_non_exhaustive()
    }
}

impl BulkRecordBuilder {
    pub fn parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn ignore_errors(mut self, policy: IgnoreErrors) -> Self {
        self.ignore_errors = policy;
        self
    }

    pub fn validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn notification(mut self, builder: notify::Builder) -> Self {
        self.notification = Some(builder);
        self
    }

    /// Add one record. Fails before any network access when the record does
    /// not share the batch's index, model and parent.
    pub fn record(mut self, record: IndexRecord) -> Result<Self, CommitError> {
        if record.index() != self.index || record.model() != self.model {
            return Err(CommitError::Precondition(format!(
                "record {} does not belong to bulk {}:{}",
                record.key_string(),
                self.index,
                self.model
            )));
        }
        if record.parent() != self.parent.as_deref() {
            return Err(CommitError::Precondition(format!(
                "record parent {:?} does not match bulk parent {:?}",
                record.parent(),
                self.parent.as_deref()
            )));
        }
        self.records.push(record);
        Ok(self)
    }

    pub fn records(
        mut self,
        records: impl IntoIterator<Item = IndexRecord>,
    ) -> Result<Self, CommitError> {
        for record in records {
            self = self.record(record)?;
        }
        Ok(self)
    }

    pub fn build(self) -> BulkRecord {
        BulkRecord {
            index: self.index,
            model: self.model,
            parent: self.parent,
            ignore_errors: self.ignore_errors,
            validator: self.validator,
            notification: self.notification,
            records: self.records,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map, Value};

    fn record(parent: Option<&str>) -> IndexRecord {
        let source: Map<String, Value> =
            json!({"name": "x"}).as_object().unwrap().clone();
        let mut b = IndexRecord::create("idx", "User", source).timestamp(1000);
        if let Some(p) = parent {
            b = b.parent(p);
        }
        b.build().unwrap()
    }

    #[test]
    fn mixed_parents_are_rejected_at_add_time() {
        let builder = BulkRecord::builder("idx", "User")
            .parent("org1")
            .record(record(Some("org1")))
            .unwrap();
        let err = builder.record(record(Some("org2"))).unwrap_err();
        assert!(matches!(err, CommitError::Precondition(_)));
    }

    #[test]
    fn record_must_match_index_and_model() {
        let source: Map<String, Value> = Map::new();
        let other = IndexRecord::create("idx", "Group", source)
            .id("g")
            .timestamp(1000)
            .build()
            .unwrap();
        let err = BulkRecord::builder("idx", "User").record(other).unwrap_err();
        assert!(matches!(err, CommitError::Precondition(_)));
    }

    #[test]
    fn consistent_records_accumulate() {
        let bulk = BulkRecord::builder("idx", "User")
            .parent("org1")
            .records([record(Some("org1")), record(Some("org1"))])
            .unwrap()
            .build();
        assert_eq!(bulk.records().len(), 2);
        assert_eq!(bulk.ignore_errors(), IgnoreErrors::Strict);
    }
}
