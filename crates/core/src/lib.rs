//! Optimistic-concurrency indexing and approval workflow over a document
//! search store.
//!
//! Callers build one or more [`IndexRecord`]s via the create/update/delete
//! factories, optionally group them into a [`BulkRecord`], and hand them to
//! the [`Indexer`]. The indexer runs a [`Validator`] (STRICT or OVERRIDE)
//! against the store, then commits the write under a per-key advisory lock,
//! together with an immutable archived-ancestor snapshot whenever a prior
//! version is superseded. [`ApprovalUtil`] layers a pending/approve/reject/discard
//! workflow on top for documents that need human sign-off before going live.
//!
//! Durability, consistency and query execution are delegated to the wrapped
//! store behind the [`DocStore`] trait; [`MemStore`] is the embedded
//! implementation used by the test suites.

pub mod approval;
pub mod document;
pub mod error;
pub mod indexer;
pub mod record;
pub mod store;
pub mod validate;

pub use approval::{ApprovalUtil, BulkRecord, BulkRecordBuilder, Notification};
pub use document::{filters, meta, DocStatus};
pub use error::CommitError;
pub use indexer::{BulkReceipt, IgnoreErrors, Indexer, SaveReceipt};
pub use record::{IndexRecord, RecordAction};
pub use store::{BulkItem, BulkOp, DocStore, MemStore, StoreError, WriteResult};
pub use validate::{ArchiveWrite, OverrideValidator, StrictValidator, Validation, Validator};
