use thiserror::Error;

use crate::store::StoreError;

/// Errors raised by the commit pipeline.
///
/// Each variant carries an HTTP-like status code via [`CommitError::status_code`]
/// so callers fronting this library with a transport can map them directly.
#[derive(Debug, Error)]
pub enum CommitError {
    /// A required field was missing or inconsistent at construction time,
    /// before any network call.
    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error("record already exists: {key}")]
    AlreadyExists { key: String },

    #[error("record not found for update: {key}")]
    NotFoundForUpdate { key: String },

    #[error("baseVersion not found for update: {key}")]
    MissingBaseVersion { key: String },

    #[error("version conflict for update: {key} (base {base}, current {current})")]
    VersionConflict { key: String, base: i64, current: i64 },

    /// A concurrent commit already holds the advisory lock for this
    /// key+timestamp.
    #[error("commit already in flight: {lock}")]
    Locked { lock: String },

    /// No pending approval document exists for the key.
    #[error("approval record not found: {key}")]
    ApprovalNotFound { key: String },

    /// The shadow document is not in a pending state; terminal states admit
    /// no further transition.
    #[error("invalid status '{status}' for {key}: record is not pending approval")]
    InvalidStatus { key: String, status: String },

    /// The second write of a pair failed after the first was committed. No
    /// rollback is attempted; the completed key is named so operators can
    /// reconcile.
    #[error("partial commit: {completed} committed, second phase failed: {cause}")]
    PartialCommit {
        completed: String,
        #[source]
        cause: Box<CommitError>,
    },

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl CommitError {
    pub fn status_code(&self) -> u16 {
        match self {
            CommitError::Precondition(_) => 400,
            CommitError::AlreadyExists { .. }
            | CommitError::NotFoundForUpdate { .. }
            | CommitError::MissingBaseVersion { .. }
            | CommitError::VersionConflict { .. } => 409,
            CommitError::Locked { .. } => 423,
            CommitError::ApprovalNotFound { .. } => 404,
            CommitError::InvalidStatus { .. } => 403,
            CommitError::PartialCommit { .. } | CommitError::Store(_) => 500,
        }
    }
}
