//! Two-stage approval workflow: changes are written as pending shadow
//! documents under `{model}$approval` and only touch the live model once
//! approved. Reject/discard are terminal transitions on the shadow alone.

mod bulk;
pub mod notify;

pub use bulk::{BulkRecord, BulkRecordBuilder};
pub use notify::Notification;

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::info;

use crate::document::{filters, meta, DocStatus};
use crate::error::CommitError;
use crate::indexer::{Indexer, SaveReceipt};
use crate::record::{IndexRecord, RecordAction};
use crate::store::DocStore;
use crate::validate::{OverrideValidator, StrictValidator};

pub struct ApprovalUtil {
    indexer: Indexer,
}

impl ApprovalUtil {
    pub fn new(store: Arc<dyn DocStore>) -> Self {
        Self { indexer: Indexer::new(store) }
    }

    pub fn indexer(&self) -> &Indexer {
        &self.indexer
    }

    fn store(&self) -> &dyn DocStore {
        self.indexer.store().as_ref()
    }

    /// Submit a create for approval: a PENDING shadow document. A second
    /// pending submission for the same id fails with "record already exists".
    pub async fn submit_create(
        &self,
        index: &str,
        model: &str,
        id: Option<&str>,
        user: &str,
        timestamp: i64,
        source: Map<String, Value>,
    ) -> Result<SaveReceipt, CommitError> {
        let shadow_model = meta::approval_model(model);
        let mut builder = IndexRecord::create(index, shadow_model, source)
            .status(DocStatus::Pending)
            .user(user)
            .timestamp(timestamp);
        if let Some(id) = id {
            builder = builder.id(id);
        }
        let record = builder.build()?;
        info!(key = %record.key_string(), "submitting create for approval");
        self.indexer.strict_save(&record, &StrictValidator).await
    }

    /// Submit a delete for approval: a PENDING_DELETE shadow carrying the
    /// live document's content. Fails when no live document exists.
    pub async fn submit_delete(
        &self,
        index: &str,
        model: &str,
        id: &str,
        user: &str,
        timestamp: i64,
    ) -> Result<SaveReceipt, CommitError> {
        let live_key = meta::urn(model, id);
        let live = self
            .store()
            .get(index, &live_key)
            .await?
            .ok_or(CommitError::NotFoundForUpdate { key: live_key })?;

        let record = IndexRecord::create(index, meta::approval_model(model), meta::content_fields(&live))
            .id(id)
            .status(DocStatus::PendingDelete)
            .user(user)
            .timestamp(timestamp)
            .build()?;
        info!(key = %record.key_string(), "submitting delete for approval");
        self.indexer.strict_save(&record, &StrictValidator).await
    }

    /// The single pending shadow document for `(model, id)`. The search can
    /// return zero documents, hence the explicit not-found signal.
    pub async fn fetch_approval_doc(
        &self,
        index: &str,
        model: &str,
        id: &str,
    ) -> Result<Map<String, Value>, CommitError> {
        let filter = filters::pending_approval(model, Some(id));
        let hits = self
            .store()
            .search(index, &filter, Some((meta::TIMESTAMP, true)), 2)
            .await?;
        hits.into_iter().next().ok_or_else(|| CommitError::ApprovalNotFound {
            key: meta::urn(&meta::approval_model(model), id),
        })
    }

    /// Approve the pending change: a terminal transition on the shadow plus
    /// the live-model write, committed as one pair under the shadow's lock.
    /// PENDING commits a create-overwrite on the live model; PENDING_DELETE
    /// commits a delete.
    pub async fn approve(
        &self,
        index: &str,
        model: &str,
        id: &str,
        user: &str,
        comment: Option<&str>,
        timestamp: i64,
    ) -> Result<(SaveReceipt, SaveReceipt), CommitError> {
        let shadow_model = meta::approval_model(model);
        let shadow_key = meta::urn(&shadow_model, id);
        let shadow = self
            .store()
            .get(index, &shadow_key)
            .await?
            .ok_or(CommitError::ApprovalNotFound { key: shadow_key.clone() })?;
        let status = check_status(&shadow, &shadow_key)?;
        let shadow_ts = meta::doc_timestamp(&shadow).unwrap_or_default();
        let content = meta::content_fields(&shadow);

        let primary = match status {
            DocStatus::PendingDelete => {
                IndexRecord::delete(index, shadow_model.as_str(), id, Some(shadow_ts))
                    .user(user)
            }
            _ => IndexRecord::with_action(
                index,
                shadow_model.as_str(),
                RecordAction::Approve,
                content.clone(),
            )
            .id(id)
            .base_version(shadow_ts)
            .status(DocStatus::Live)
            .user(user),
        };
        let primary = apply_comment(primary, comment).timestamp(timestamp).build()?;

        let aux = match status {
            DocStatus::PendingDelete => IndexRecord::delete(index, model, id, None).user(user),
            _ => IndexRecord::create(index, model, content)
                .id(id)
                .status(DocStatus::Live)
                .user(user),
        };
        let aux = apply_comment(aux, comment).timestamp(timestamp).build()?;

        info!(key = %meta::urn(model, id), status = %status, "approving pending change");
        self.indexer
            .strict_save_pair(&primary, &StrictValidator, &aux, &OverrideValidator)
            .await
    }

    /// Reject the pending change. The live model is never touched.
    pub async fn reject(
        &self,
        index: &str,
        model: &str,
        id: &str,
        user: &str,
        comment: Option<&str>,
        timestamp: i64,
    ) -> Result<SaveReceipt, CommitError> {
        self.terminal_transition(
            index,
            model,
            id,
            RecordAction::Reject,
            DocStatus::Rejected,
            user,
            comment,
            timestamp,
        )
        .await
    }

    /// Discard the pending change. The live model is never touched.
    pub async fn discard(
        &self,
        index: &str,
        model: &str,
        id: &str,
        user: &str,
        comment: Option<&str>,
        timestamp: i64,
    ) -> Result<SaveReceipt, CommitError> {
        self.terminal_transition(
            index,
            model,
            id,
            RecordAction::Discard,
            DocStatus::Discarded,
            user,
            comment,
            timestamp,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn terminal_transition(
        &self,
        index: &str,
        model: &str,
        id: &str,
        action: RecordAction,
        status: DocStatus,
        user: &str,
        comment: Option<&str>,
        timestamp: i64,
    ) -> Result<SaveReceipt, CommitError> {
        let shadow_model = meta::approval_model(model);
        let shadow_key = meta::urn(&shadow_model, id);
        let shadow = self
            .store()
            .get(index, &shadow_key)
            .await?
            .ok_or(CommitError::ApprovalNotFound { key: shadow_key.clone() })?;
        check_status(&shadow, &shadow_key)?;
        let shadow_ts = meta::doc_timestamp(&shadow).unwrap_or_default();

        let builder = IndexRecord::with_action(
            index,
            shadow_model.as_str(),
            action,
            meta::content_fields(&shadow),
        )
        .id(id)
        .base_version(shadow_ts)
        .status(status)
        .user(user);
        let record = apply_comment(builder, comment).timestamp(timestamp).build()?;

        info!(key = %shadow_key, to = %status, "terminal approval transition");
        self.indexer.strict_save(&record, &StrictValidator).await
    }
}

/// Pending-state precondition for every approval transition: terminal states
/// admit no further transition.
fn check_status(doc: &Map<String, Value>, key: &str) -> Result<DocStatus, CommitError> {
    let status = meta::doc_status(doc).ok_or_else(|| CommitError::InvalidStatus {
        key: key.to_string(),
        status: "missing".to_string(),
    })?;
    if !status.is_pending() {
        return Err(CommitError::InvalidStatus {
            key: key.to_string(),
            status: status.to_string(),
        });
    }
    Ok(status)
}

fn apply_comment(builder: crate::record::Builder, comment: Option<&str>) -> crate::record::Builder {
    match comment {
        Some(c) => builder.comment(c, false),
        None => builder,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemStore;
    use serde_json::json;

    fn payload() -> Map<String, Value> {
        json!({"name": "shankar", "age": 25, "title": "programmer"})
            .as_object()
            .unwrap()
            .clone()
    }

    fn setup() -> (Arc<MemStore>, ApprovalUtil) {
        let store = Arc::new(MemStore::new());
        let util = ApprovalUtil::new(store.clone());
        (store, util)
    }

    async fn pending_count(store: &MemStore, model: &str) -> usize {
        store
            .search("idx", &filters::pending_approval(model, None), None, 10)
            .await
            .unwrap()
            .len()
    }

    async fn live_count(store: &MemStore, model: &str) -> usize {
        store
            .search("idx", &filters::live_index(model), None, 10)
            .await
            .unwrap()
            .len()
    }

    #[tokio::test]
    async fn create_approval_lifecycle() {
        let (store, util) = setup();

        let receipt = util
            .submit_create("idx", "User", Some("sam"), "author", 1000, payload())
            .await
            .unwrap();
        assert_eq!(receipt.result, "created");
        assert_eq!(pending_count(&store, "User").await, 1);
        assert_eq!(live_count(&store, "User").await, 0);

        // A second pending submission for the same id is rejected.
        let mut changed = payload();
        changed.insert("age".into(), json!(26));
        let err = util
            .submit_create("idx", "User", Some("sam"), "author", 1500, changed)
            .await
            .unwrap_err();
        assert!(matches!(err, CommitError::AlreadyExists { .. }));

        let (shadow_receipt, live_receipt) = util
            .approve("idx", "User", "sam", "reviewer", Some("lgtm"), 2000)
            .await
            .unwrap();
        assert_eq!(shadow_receipt.result, "approved");
        assert_eq!(live_receipt.result, "created");

        assert_eq!(pending_count(&store, "User").await, 0);
        assert_eq!(live_count(&store, "User").await, 1);
        let live = store.get("idx", "User:sam").await.unwrap().unwrap();
        assert_eq!(live.get("&status"), Some(&json!("live")));
        assert_eq!(live.get("name"), Some(&json!("shankar")));
        assert_eq!(live.get("&user"), Some(&json!("reviewer")));
    }

    #[tokio::test]
    async fn delete_approval_removes_the_live_document() {
        let (store, util) = setup();

        // Live document exists; its deletion goes through approval.
        let live = IndexRecord::create("idx", "User", payload())
            .id("sam")
            .status(DocStatus::Live)
            .timestamp(1000)
            .build()
            .unwrap();
        util.indexer().strict_save(&live, &StrictValidator).await.unwrap();

        util.submit_delete("idx", "User", "sam", "author", 2000)
            .await
            .unwrap();
        assert_eq!(pending_count(&store, "User").await, 1);
        assert_eq!(live_count(&store, "User").await, 1);

        let (shadow_receipt, live_receipt) = util
            .approve("idx", "User", "sam", "reviewer", None, 3000)
            .await
            .unwrap();
        assert_eq!(shadow_receipt.result, "deleted");
        assert_eq!(live_receipt.result, "deleted");

        assert!(store.get("idx", "User:sam").await.unwrap().is_none());
        assert!(store.get("idx", "User$approval:sam").await.unwrap().is_none());
        // The live document's pre-delete version was archived.
        let ancestor = store.get("idx", "User:sam:1000").await.unwrap().unwrap();
        assert_eq!(ancestor.get("&status"), Some(&json!("deleted")));
    }

    #[tokio::test]
    async fn fetch_approval_doc_signals_not_found() {
        let (_store, util) = setup();
        let err = util.fetch_approval_doc("idx", "User", "sam").await.unwrap_err();
        assert!(matches!(err, CommitError::ApprovalNotFound { .. }));
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn fetch_approval_doc_returns_the_pending_shadow() {
        let (_store, util) = setup();
        util.submit_create("idx", "User", Some("sam"), "author", 1000, payload())
            .await
            .unwrap();
        let doc = util.fetch_approval_doc("idx", "User", "sam").await.unwrap();
        assert_eq!(doc.get("&status"), Some(&json!("pending")));
        assert_eq!(doc.get("&id"), Some(&json!("sam")));
    }

    #[tokio::test]
    async fn rejected_shadow_is_terminal() {
        let (store, util) = setup();
        util.submit_create("idx", "User", Some("sam"), "author", 1000, payload())
            .await
            .unwrap();

        let receipt = util
            .reject("idx", "User", "sam", "reviewer", Some("incomplete"), 2000)
            .await
            .unwrap();
        assert_eq!(receipt.result, "rejected");
        let shadow = store.get("idx", "User$approval:sam").await.unwrap().unwrap();
        assert_eq!(shadow.get("&status"), Some(&json!("rejected")));
        assert_eq!(live_count(&store, "User").await, 0);

        // Every further transition fails with the invalid-state error.
        for result in [
            util.reject("idx", "User", "sam", "reviewer", None, 3000).await.err(),
            util.discard("idx", "User", "sam", "reviewer", None, 3000).await.err(),
            util.approve("idx", "User", "sam", "reviewer", None, 3000).await.err(),
        ] {
            let err = result.expect("transition out of rejected must fail");
            assert!(matches!(err, CommitError::InvalidStatus { .. }), "got {err}");
            assert_eq!(err.status_code(), 403);
        }
    }

    #[tokio::test]
    async fn discard_is_terminal_too() {
        let (store, util) = setup();
        util.submit_create("idx", "User", Some("sam"), "author", 1000, payload())
            .await
            .unwrap();
        util.discard("idx", "User", "sam", "reviewer", None, 2000)
            .await
            .unwrap();

        let shadow = store.get("idx", "User$approval:sam").await.unwrap().unwrap();
        assert_eq!(shadow.get("&status"), Some(&json!("discarded")));
        let err = util
            .reject("idx", "User", "sam", "reviewer", None, 3000)
            .await
            .unwrap_err();
        assert!(matches!(err, CommitError::InvalidStatus { .. }));
    }

    #[tokio::test]
    async fn reject_on_missing_shadow_is_not_found() {
        let (_store, util) = setup();
        let err = util
            .reject("idx", "User", "sam", "reviewer", None, 1000)
            .await
            .unwrap_err();
        assert!(matches!(err, CommitError::ApprovalNotFound { .. }));
    }
}
