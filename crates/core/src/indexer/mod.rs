//! The commit protocol: advisory locking, write, ancestor-archive write,
//! unlock. Comes in a strict (per-record lock) and a lenient (bulk)
//! execution path.

mod receipt;

pub use receipt::{BulkReceipt, SaveReceipt};

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::approval::BulkRecord;
use crate::error::CommitError;
use crate::record::IndexRecord;
use crate::store::{BulkOp, DocStore, StoreError};
use crate::validate::{Validation, Validator};

/// How bulk per-item failures are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IgnoreErrors {
    /// Report every failure.
    #[default]
    Strict,
    /// Report nothing.
    Lenient,
    /// Report everything except version conflicts, so lenient loads tolerate
    /// concurrent writers racing on the same key.
    VersionConflict,
}

impl IgnoreErrors {
    /// Whether a store-reported failure message is ignored. Version conflicts
    /// are recognized by substring; the store does not expose a structured
    /// code for them yet.
    pub fn ignores(&self, failure: &str) -> bool {
        match self {
            IgnoreErrors::Strict => false,
            IgnoreErrors::Lenient => true,
            IgnoreErrors::VersionConflict => {
                let f = failure.to_lowercase();
                f.contains("version conflict") || f.contains("version_conflict")
            }
        }
    }

    /// Same policy for validation failures raised before batching, matched
    /// structurally.
    pub(crate) fn ignores_commit_error(&self, err: &CommitError) -> bool {
        match self {
            IgnoreErrors::Strict => false,
            IgnoreErrors::Lenient => true,
            IgnoreErrors::VersionConflict => {
                matches!(err, CommitError::VersionConflict { .. })
            }
        }
    }
}

/// Orchestrates commits against the store. At most one in-flight commit per
/// document key+timestamp passes the advisory lock from this component's
/// perspective.
pub struct Indexer {
    store: Arc<dyn DocStore>,
}

impl Indexer {
    pub fn new(store: Arc<dyn DocStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn DocStore> {
        &self.store
    }

    /// Commit one record under the advisory lock: lock, validate, write (plus
    /// any ancestor-archive write), refresh, unlock. The lock is released on
    /// every exit path.
    pub async fn strict_save(
        &self,
        record: &IndexRecord,
        validator: &dyn Validator,
    ) -> Result<SaveReceipt, CommitError> {
        let lock = self.acquire_lock(record).await?;
        let outcome = self.commit_under_lock(record, validator).await;
        self.release_lock(record.index(), &lock).await;
        outcome
    }

    /// Commit a (primary, auxiliary) pair under the primary's lock. No
    /// cross-document rollback: if the auxiliary fails after the primary was
    /// committed, the error names the completed key so the partial state can
    /// be reconciled; the lock and the idempotence check make a retry safe.
    pub async fn strict_save_pair(
        &self,
        primary: &IndexRecord,
        primary_validator: &dyn Validator,
        aux: &IndexRecord,
        aux_validator: &dyn Validator,
    ) -> Result<(SaveReceipt, SaveReceipt), CommitError> {
        let lock = self.acquire_lock(primary).await?;
        let outcome = async {
            let first = self.commit_under_lock(primary, primary_validator).await?;
            let second = self
                .commit_under_lock(aux, aux_validator)
                .await
                .map_err(|cause| CommitError::PartialCommit {
                    completed: primary.key_string(),
                    cause: Box::new(cause),
                })?;
            Ok((first, second))
        }
        .await;
        self.release_lock(primary.index(), &lock).await;
        outcome
    }

    /// Lenient batch commit: no advisory lock. Each record is validated
    /// individually, surviving writes go out as one bulk request, per-item
    /// failures are filtered through the batch's `IgnoreErrors` policy, and
    /// the index is refreshed once at the end.
    pub async fn bulk_save(&self, bulk: &BulkRecord) -> Result<BulkReceipt, CommitError> {
        let transaction_id = Uuid::new_v4().to_string();
        let mut ops: Vec<BulkOp> = Vec::new();
        let mut outcomes: BTreeMap<String, String> = BTreeMap::new();
        let mut failures: BTreeMap<String, String> = BTreeMap::new();
        let mut notification = bulk.notification_builder();

        for record in bulk.records() {
            let note = |outcome: &str, notification: &mut Option<crate::approval::notify::Builder>| {
                if let Some(n) = notification {
                    n.entry(record.key_string(), record.action(), outcome);
                }
            };
            match bulk.validator().validate(self.store.as_ref(), record).await {
                Ok(Validation::Noop { .. }) => {
                    note("noop", &mut notification);
                    outcomes.insert(record.key_string(), "noop".to_string());
                }
                Ok(Validation::Proceed { record, archive }) => {
                    if record.action().is_delete() {
                        ops.push(BulkOp::Delete { id: record.key_string() });
                    } else {
                        ops.push(BulkOp::Index {
                            id: record.key_string(),
                            payload: record.source().clone(),
                        });
                    }
                    if let Some(archive) = archive {
                        ops.push(BulkOp::Index { id: archive.id, payload: archive.payload });
                    }
                    note(record.action().result_label(), &mut notification);
                    outcomes.insert(
                        record.key_string(),
                        record.action().result_label().to_string(),
                    );
                }
                Err(err) if bulk.ignore_errors().ignores_commit_error(&err) => {
                    debug!(key = %record.key_string(), %err, "bulk validation failure ignored");
                    note("ignored", &mut notification);
                    outcomes.insert(record.key_string(), format!("ignored: {err}"));
                }
                Err(err) => {
                    note(&err.to_string(), &mut notification);
                    failures.insert(record.key_string(), err.to_string());
                }
            }
        }

        if !ops.is_empty() {
            let items = self.store.bulk_write(bulk.index(), ops).await?;
            for item in items {
                let Some(failure) = item.failure else { continue };
                if bulk.ignore_errors().ignores(&failure) {
                    debug!(id = %item.id, failure, "bulk item failure ignored");
                    outcomes.insert(item.id, format!("ignored: {failure}"));
                } else {
                    outcomes.remove(&item.id);
                    failures.insert(item.id, failure);
                }
            }
            self.store.refresh(bulk.index()).await?;
        }

        let errors_found = !failures.is_empty();
        info!(
            transaction_id,
            records = bulk.records().len(),
            errors_found,
            "bulk commit finished"
        );
        Ok(BulkReceipt {
            transaction_id,
            errors_found,
            outcomes,
            failures,
            notification: notification.map(|n| n.build()),
        })
    }

    /// Fire-and-forget bulk submission: runs [`bulk_save`] on a background
    /// task and hands the outcome to `on_done`. Not part of the strict commit
    /// protocol; callers that need the receipt synchronously use
    /// [`bulk_save`] directly.
    ///
    /// [`bulk_save`]: Indexer::bulk_save
    pub fn bulk_save_detached<F>(
        &self,
        bulk: BulkRecord,
        on_done: F,
    ) -> tokio::task::JoinHandle<()>
    where
        F: FnOnce(Result<BulkReceipt, CommitError>) + Send + 'static,
    {
        let indexer = Indexer { store: self.store.clone() };
        tokio::spawn(async move { on_done(indexer.bulk_save(&bulk).await) })
    }

    /// Advisory mutual exclusion: a create-only sentinel write at the
    /// record's `simple_key`. Unique per timestamp, so concurrent distinct
    /// writers never collide on an old lock.
    async fn acquire_lock(&self, record: &IndexRecord) -> Result<String, CommitError> {
        let lock = record.simple_key();
        let mut sentinel = Map::new();
        sentinel.insert("&lock".to_string(), Value::String(record.key_string()));
        match self.store.write(record.index(), &lock, &sentinel, true).await {
            Ok(_) => {
                debug!(%lock, "advisory lock acquired");
                Ok(lock)
            }
            Err(StoreError::Conflict(_)) => Err(CommitError::Locked { lock }),
            Err(e) => Err(e.into()),
        }
    }

    /// Attempted on every exit path. If the delete itself fails the sentinel
    /// leaks and must be cleaned up externally.
    async fn release_lock(&self, index: &str, lock: &str) {
        if let Err(e) = self.store.delete(index, lock).await {
            warn!(%lock, error = %e, "failed to release advisory lock, sentinel leaked");
            return;
        }
        if let Err(e) = self.store.refresh(index).await {
            warn!(%lock, error = %e, "index refresh after lock release failed");
        }
        debug!(%lock, "advisory lock released");
    }

    async fn commit_under_lock(
        &self,
        record: &IndexRecord,
        validator: &dyn Validator,
    ) -> Result<SaveReceipt, CommitError> {
        match validator.validate(self.store.as_ref(), record).await? {
            Validation::Noop { model, id, timestamp, status } => {
                info!(key = %record.key_string(), "idempotent resubmission, no-op");
                Ok(SaveReceipt::noop(model, id, timestamp, status))
            }
            Validation::Proceed { record, archive } => {
                let key = record.key_string();
                let result = if record.action().is_delete() {
                    self.store.delete(record.index(), &key).await?
                } else {
                    self.store
                        .write(record.index(), &key, record.source(), false)
                        .await?
                };
                if let Some(archive) = &archive {
                    self.store
                        .write(record.index(), &archive.id, &archive.payload, false)
                        .await?;
                }
                self.store.refresh(record.index()).await?;
                info!(
                    %key,
                    result = record.action().result_label(),
                    archived = archive.is_some(),
                    "committed"
                );
                Ok(SaveReceipt::committed(&record, result.version))
            }
        }
    }
}
