//! Elasticsearch-backed implementation of the core's `DocStore` collaborator.
//!
//! Kept deliberately mechanical: every method is one HTTP round-trip against
//! the cluster's REST API, with status codes translated into `StoreError`.
//! The commit protocol itself lives in `indexflow-core`.

mod config;
mod es;

pub use config::EsConfig;
pub use es::EsStore;
