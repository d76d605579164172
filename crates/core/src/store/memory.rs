//! Embedded in-memory [`DocStore`].
//!
//! Backs the test suites and local development. A single lock per store makes
//! create-if-absent atomic, matching the consistency the advisory-lock
//! protocol requires from a real store; writes are immediately visible, so
//! `refresh` is a no-op.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{self, AtomicI64};
use std::sync::RwLock;

use async_trait::async_trait;
use indexflow_query::{eval, Filter};
use serde_json::{Map, Value};

use super::{BulkItem, BulkOp, DocStore, StoreError, WriteResult};

type Docs = HashMap<String, Map<String, Value>>;

#[derive(Debug, Default)]
pub struct MemStore {
    indices: RwLock<HashMap<String, Docs>>,
    seq: AtomicI64,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents currently held in an index.
    pub fn doc_count(&self, index: &str) -> usize {
        self.indices
            .read()
            .expect("store lock poisoned")
            .get(index)
            .map_or(0, Docs::len)
    }

    fn next_seq(&self) -> i64 {
        self.seq.fetch_add(1, atomic::Ordering::SeqCst) + 1
    }
}

#[async_trait]
impl DocStore for MemStore {
    async fn write(
        &self,
        index: &str,
        id: &str,
        payload: &Map<String, Value>,
        create_only: bool,
    ) -> Result<WriteResult, StoreError> {
        let mut indices = self.indices.write().expect("store lock poisoned");
        let docs = indices.entry(index.to_string()).or_default();
        if create_only && docs.contains_key(id) {
            return Err(StoreError::Conflict(format!(
                "[{id}]: version conflict, document already exists"
            )));
        }
        docs.insert(id.to_string(), payload.clone());
        Ok(WriteResult { version: self.next_seq() })
    }

    async fn delete(&self, index: &str, id: &str) -> Result<WriteResult, StoreError> {
        let mut indices = self.indices.write().expect("store lock poisoned");
        let docs = indices.entry(index.to_string()).or_default();
        match docs.remove(id) {
            Some(_) => Ok(WriteResult { version: self.next_seq() }),
            None => Err(StoreError::NotFound(id.to_string())),
        }
    }

    async fn get(&self, index: &str, id: &str) -> Result<Option<Map<String, Value>>, StoreError> {
        let indices = self.indices.read().expect("store lock poisoned");
        Ok(indices.get(index).and_then(|docs| docs.get(id)).cloned())
    }

    async fn search(
        &self,
        index: &str,
        filter: &Filter,
        sort: Option<(&str, bool)>,
        limit: usize,
    ) -> Result<Vec<Map<String, Value>>, StoreError> {
        let indices = self.indices.read().expect("store lock poisoned");
        let mut hits: Vec<Map<String, Value>> = indices
            .get(index)
            .map(|docs| {
                docs.values()
                    .filter(|doc| eval::matches(filter, doc))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        if let Some((field, descending)) = sort {
            hits.sort_by(|a, b| {
                let ord = compare_values(a.get(field), b.get(field));
                if descending {
                    ord.reverse()
                } else {
                    ord
                }
            });
        }
        hits.truncate(limit);
        Ok(hits)
    }

    async fn bulk_write(
        &self,
        index: &str,
        ops: Vec<BulkOp>,
    ) -> Result<Vec<BulkItem>, StoreError> {
        let mut items = Vec::with_capacity(ops.len());
        for op in ops {
            let outcome = match &op {
                BulkOp::Index { id, payload } => {
                    self.write(index, id, payload, false).await.map(|_| ())
                }
                BulkOp::Delete { id } => self.delete(index, id).await.map(|_| ()),
            };
            items.push(BulkItem {
                id: op.id().to_string(),
                failure: outcome.err().map(|e| e.to_string()),
            });
        }
        Ok(items)
    }

    async fn refresh(&self, _index: &str) -> Result<(), StoreError> {
        Ok(())
    }

    async fn exists(&self, index: &str, id: &str) -> Result<bool, StoreError> {
        let indices = self.indices.read().expect("store lock poisoned");
        Ok(indices.get(index).is_some_and(|docs| docs.contains_key(id)))
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => a.to_string().cmp(&b.to_string()),
        },
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}
