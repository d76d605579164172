//! Pre-commit validation: idempotence detection, optimistic-concurrency
//! checks, and archived-ancestor computation.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::document::{meta, DocStatus};
use crate::error::CommitError;
use crate::record::{IndexRecord, RecordAction};
use crate::store::DocStore;

/// Outcome of validation.
#[derive(Debug)]
pub enum Validation {
    /// The write may proceed. `record` carries any ancestor pointer; `archive`
    /// is the snapshot write for the superseded version, if one existed.
    Proceed {
        record: IndexRecord,
        archive: Option<ArchiveWrite>,
    },
    /// The incoming content equals the stored document: nothing to write.
    /// Callers treat this as success-with-no-change, echoing the stored
    /// document's identity.
    Noop {
        model: String,
        id: String,
        timestamp: i64,
        status: Option<DocStatus>,
    },
}

/// The archived-ancestor snapshot written alongside a superseding write.
/// Created exactly once per supersession, never mutated, never deleted here.
#[derive(Debug, Clone)]
pub struct ArchiveWrite {
    pub id: String,
    pub payload: Map<String, Value>,
}

/// Pluggable pre-commit check, run by the indexer before every write.
///
/// The provided [`validate`](Validator::validate) drives the template flow:
/// pre-validate hook, fetch current, idempotence check, concurrency check,
/// post-validate hook, archive computation. Implementations override the
/// hooks; [`StrictValidator`] adds the optimistic-concurrency checks in
/// [`check_current`](Validator::check_current).
#[async_trait]
pub trait Validator: Send + Sync {
    /// Runs before the current document is fetched. May perform side effects
    /// (e.g. provisioning an external credential); an error aborts the whole
    /// commit.
    async fn pre_validate(
        &self,
        _store: &dyn DocStore,
        _record: &IndexRecord,
    ) -> Result<(), CommitError> {
        Ok(())
    }

    /// Inspects the fetched current document. The optimistic-concurrency
    /// invariants live here.
    fn check_current(
        &self,
        _record: &IndexRecord,
        _current: Option<&Map<String, Value>>,
    ) -> Result<(), CommitError> {
        Ok(())
    }

    /// Runs after all checks pass, before the write is issued.
    async fn post_validate(
        &self,
        _store: &dyn DocStore,
        _record: &IndexRecord,
    ) -> Result<(), CommitError> {
        Ok(())
    }

    async fn validate(
        &self,
        store: &dyn DocStore,
        record: &IndexRecord,
    ) -> Result<Validation, CommitError> {
        self.pre_validate(store, record).await?;

        let current = store.get(record.index(), &record.key_string()).await?;

        // Idempotence before the strict version check: a resubmitted
        // identical create/update (a timeout retry, say) gets a clean no-op
        // rather than a spurious conflict. Never applies to deletes.
        if let Some(cur) = &current {
            let comparable = matches!(
                record.action(),
                RecordAction::Create | RecordAction::Update
            );
            if comparable && meta::content_fields(cur) == record.content() {
                return Ok(Validation::Noop {
                    model: record.model().to_string(),
                    id: record.id().to_string(),
                    timestamp: meta::doc_timestamp(cur).unwrap_or(record.timestamp()),
                    status: meta::doc_status(cur),
                });
            }
        }

        self.check_current(record, current.as_ref())?;
        self.post_validate(store, record).await?;

        Ok(match current {
            Some(cur) => {
                let (record, archive) = archive_current(record, &cur);
                Validation::Proceed { record, archive: Some(archive) }
            }
            None => Validation::Proceed { record: record.clone(), archive: None },
        })
    }
}

/// Permissive validator: overwrites whatever is stored, still detecting
/// no-ops and archiving superseded versions.
#[derive(Debug, Default)]
pub struct OverrideValidator;

#[async_trait]
impl Validator for OverrideValidator {}

/// Optimistic-concurrency validator: a create must not find a current
/// document, and an update/delete must name the current timestamp as its
/// `base_version`.
#[derive(Debug, Default)]
pub struct StrictValidator;

#[async_trait]
impl Validator for StrictValidator {
    fn check_current(
        &self,
        record: &IndexRecord,
        current: Option<&Map<String, Value>>,
    ) -> Result<(), CommitError> {
        let key = record.key_string();
        match record.action() {
            RecordAction::Create => match current {
                Some(_) => Err(CommitError::AlreadyExists { key }),
                None => Ok(()),
            },
            _ => {
                let cur = current.ok_or(CommitError::NotFoundForUpdate { key: key.clone() })?;
                let base = record
                    .base_version()
                    .ok_or(CommitError::MissingBaseVersion { key: key.clone() })?;
                let current_ts = meta::doc_timestamp(cur).unwrap_or_default();
                if current_ts != base {
                    return Err(CommitError::VersionConflict {
                        key,
                        base,
                        current: current_ts,
                    });
                }
                Ok(())
            }
        }
    }
}

/// Snapshot the current document under the superseded timestamp, merging the
/// record's ancillary fields and the action's archive status, and point the
/// incoming record's payload at it.
fn archive_current(
    record: &IndexRecord,
    current: &Map<String, Value>,
) -> (IndexRecord, ArchiveWrite) {
    let old_ts = meta::doc_timestamp(current).unwrap_or_default();
    let key = meta::simple_key(record.model(), record.parent(), record.id(), old_ts);

    let mut payload = current.clone();
    for (k, v) in record.ancillary() {
        payload.insert(k.clone(), v.clone());
    }
    payload.insert(
        meta::STATUS.to_string(),
        json!(record.action().archive_status().as_str()),
    );

    (record.with_ancestor(&key), ArchiveWrite { id: key, payload })
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

    async fn seed(store: &MemStore, ts: i64) {
        let record = IndexRecord::create("idx", "User", payload())
            .id("sam")
            .timestamp(ts)
            .build()
            .unwrap();
        store
            .write("idx", &record.key_string(), record.source(), false)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn identical_create_is_a_noop_with_the_stored_timestamp() {
        let store = MemStore::new();
        seed(&store, 1000).await;

        let retry = IndexRecord::create("idx", "User", payload())
            .id("sam")
            .timestamp(1500)
            .build()
            .unwrap();
        match StrictValidator.validate(&store, &retry).await.unwrap() {
            Validation::Noop { id, timestamp, .. } => {
                assert_eq!(id, "sam");
                assert_eq!(timestamp, 1000);
            }
            other => panic!("expected noop, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn delete_never_noops() {
        let store = MemStore::new();
        seed(&store, 1000).await;

        let del = IndexRecord::delete("idx", "User", "sam", Some(1000))
            .timestamp(2000)
            .build()
            .unwrap();
        assert!(matches!(
            StrictValidator.validate(&store, &del).await.unwrap(),
            Validation::Proceed { .. }
        ));
    }

    #[tokio::test]
    async fn strict_rejects_create_on_existing() {
        let store = MemStore::new();
        seed(&store, 1000).await;

        let mut changed = payload();
        changed.insert("age".into(), json!(26));
        let record = IndexRecord::create("idx", "User", changed)
            .id("sam")
            .timestamp(1500)
            .build()
            .unwrap();
        let err = StrictValidator.validate(&store, &record).await.unwrap_err();
        assert!(matches!(err, CommitError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn strict_rejects_update_on_missing() {
        let store = MemStore::new();
        let record = IndexRecord::update("idx", "User", "sam", Some(1000), payload())
            .timestamp(2000)
            .build()
            .unwrap();
        let err = StrictValidator.validate(&store, &record).await.unwrap_err();
        assert!(matches!(err, CommitError::NotFoundForUpdate { .. }));
    }

    #[tokio::test]
    async fn strict_rejects_update_without_base_version() {
        let store = MemStore::new();
        seed(&store, 1000).await;

        let mut changed = payload();
        changed.insert("age".into(), json!(26));
        let record = IndexRecord::update("idx", "User", "sam", None, changed)
            .timestamp(2000)
            .build()
            .unwrap();
        let err = StrictValidator.validate(&store, &record).await.unwrap_err();
        assert!(matches!(err, CommitError::MissingBaseVersion { .. }));
    }

    #[tokio::test]
    async fn strict_rejects_stale_base_version() {
        let store = MemStore::new();
        seed(&store, 2000).await;

        let mut changed = payload();
        changed.insert("age".into(), json!(26));
        let record = IndexRecord::update("idx", "User", "sam", Some(1000), changed)
            .timestamp(3000)
            .build()
            .unwrap();
        let err = StrictValidator.validate(&store, &record).await.unwrap_err();
        assert!(matches!(
            err,
            CommitError::VersionConflict { base: 1000, current: 2000, .. }
        ));
    }

    #[tokio::test]
    async fn supersession_produces_the_archive_write() {
        let store = MemStore::new();
        seed(&store, 1000).await;

        let mut changed = payload();
        changed.insert("age".into(), json!(26));
        let record = IndexRecord::update("idx", "User", "sam", Some(1000), changed)
            .timestamp(2000)
            .user("tester")
            .build()
            .unwrap();
        match StrictValidator.validate(&store, &record).await.unwrap() {
            Validation::Proceed { record, archive } => {
                let archive = archive.expect("prior version must be archived");
                assert_eq!(archive.id, "User:sam:1000");
                assert_eq!(archive.payload.get("&status"), Some(&json!("updated")));
                assert_eq!(archive.payload.get("&expiry"), Some(&json!(2000)));
                // Archive keeps the old content.
                assert_eq!(archive.payload.get("age"), Some(&json!(25)));
                // Live record points back at the archive.
                assert_eq!(
                    record.source().get("&ancestor"),
                    Some(&json!("User:sam:1000"))
                );
            }
            other => panic!("expected proceed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn override_allows_create_on_existing() {
        let store = MemStore::new();
        seed(&store, 1000).await;

        let mut changed = payload();
        changed.insert("age".into(), json!(26));
        let record = IndexRecord::create("idx", "User", changed)
            .id("sam")
            .timestamp(1500)
            .build()
            .unwrap();
        assert!(matches!(
            OverrideValidator.validate(&store, &record).await.unwrap(),
            Validation::Proceed { archive: Some(_), .. }
        ));
    }
}
