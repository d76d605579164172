//! The document-store collaborator interface.
//!
//! All durability, consistency and query execution live behind [`DocStore`];
//! the commit protocol only requires that `create_only` writes are atomic and
//! that a refreshed index has read-after-write visibility. [`MemStore`] is
//! the embedded implementation used by the test suites.

pub mod memory;

pub use memory::MemStore;

use async_trait::async_trait;
use indexflow_query::Filter;
use serde_json::{Map, Value};
use thiserror::Error;

/// Store-level failures, wrapped into [`CommitError::Store`] by the commit
/// pipeline.
///
/// [`CommitError::Store`]: crate::error::CommitError::Store
#[derive(Debug, Error)]
pub enum StoreError {
    /// A `create_only` write hit an existing document, or the store rejected
    /// a versioned write.
    #[error("document conflict: {0}")]
    Conflict(String),

    #[error("document not found: {0}")]
    NotFound(String),

    /// Network error or unexpected response; the original cause is preserved
    /// in the message for diagnostics.
    #[error("store transport error: {0}")]
    Transport(String),
}

/// Result of a single write, carrying the store's sequence number.
#[derive(Debug, Clone, Copy)]
pub struct WriteResult {
    pub version: i64,
}

/// One operation inside a bulk request.
#[derive(Debug, Clone)]
pub enum BulkOp {
    Index {
        id: String,
        payload: Map<String, Value>,
    },
    Delete {
        id: String,
    },
}

impl BulkOp {
    pub fn id(&self) -> &str {
        match self {
            BulkOp::Index { id, .. } | BulkOp::Delete { id } => id,
        }
    }
}

/// Per-operation outcome of a bulk request.
#[derive(Debug, Clone)]
pub struct BulkItem {
    pub id: String,
    /// `None` on success, otherwise the store's failure message.
    pub failure: Option<String>,
}

/// Operations the commit protocol needs from the wrapped store. Every call is
/// assumed to be a network round-trip.
#[async_trait]
pub trait DocStore: Send + Sync {
    /// Index a document. With `create_only` the write fails with
    /// [`StoreError::Conflict`] if the id already exists; this must be atomic
    /// for the advisory lock to be correct.
    async fn write(
        &self,
        index: &str,
        id: &str,
        payload: &Map<String, Value>,
        create_only: bool,
    ) -> Result<WriteResult, StoreError>;

    async fn delete(&self, index: &str, id: &str) -> Result<WriteResult, StoreError>;

    async fn get(&self, index: &str, id: &str) -> Result<Option<Map<String, Value>>, StoreError>;

    /// Filtered search, optionally sorted by one field (`descending` flag),
    /// truncated to `limit` documents.
    async fn search(
        &self,
        index: &str,
        filter: &Filter,
        sort: Option<(&str, bool)>,
        limit: usize,
    ) -> Result<Vec<Map<String, Value>>, StoreError>;

    /// Submit a batch; per-operation outcomes come back in order.
    async fn bulk_write(
        &self,
        index: &str,
        ops: Vec<BulkOp>,
    ) -> Result<Vec<BulkItem>, StoreError>;

    /// Force read-after-write visibility for subsequent reads.
    async fn refresh(&self, index: &str) -> Result<(), StoreError>;

    async fn exists(&self, index: &str, id: &str) -> Result<bool, StoreError>;
}
