use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde_json::{json, Map, Value};
use tracing::{debug, error};

use indexflow_core::store::{BulkItem, BulkOp, DocStore, StoreError, WriteResult};
use indexflow_query::{compile, Filter};

use crate::config::EsConfig;

/// `DocStore` over an Elasticsearch cluster's REST API.
pub struct EsStore {
    http: reqwest::Client,
    base: String,
    username: Option<String>,
    password: Option<String>,
}

impl EsStore {
    pub fn new(config: EsConfig) -> Result<Self, StoreError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(transport)?;
        Ok(Self {
            http,
            base: config.url.trim_end_matches('/').to_string(),
            username: config.username,
            password: config.password,
        })
    }

    fn request(&self, method: Method, url: String) -> RequestBuilder {
        let mut req = self.http.request(method, url);
        if let (Some(user), Some(pass)) = (&self.username, &self.password) {
            req = req.basic_auth(user, Some(pass));
        }
        req
    }

    fn doc_url(&self, index: &str, id: &str) -> String {
        format!("{}/{}/_doc/{}", self.base, index, id)
    }
}

#[async_trait]
impl DocStore for EsStore {
    async fn write(
        &self,
        index: &str,
        id: &str,
        payload: &Map<String, Value>,
        create_only: bool,
    ) -> Result<WriteResult, StoreError> {
        let url = if create_only {
            format!("{}/{}/_create/{}", self.base, index, id)
        } else {
            self.doc_url(index, id)
        };
        debug!(index, id, create_only, "es write");
        let resp = self
            .request(Method::PUT, url)
            .json(&Value::Object(payload.clone()))
            .send()
            .await
            .map_err(transport)?;
        match resp.status() {
            s if s.is_success() => version_of(resp).await,
            StatusCode::CONFLICT => Err(StoreError::Conflict(body_text(resp).await)),
            s => Err(unexpected("write", index, id, s, resp).await),
        }
    }

    async fn delete(&self, index: &str, id: &str) -> Result<WriteResult, StoreError> {
        debug!(index, id, "es delete");
        let resp = self
            .request(Method::DELETE, self.doc_url(index, id))
            .send()
            .await
            .map_err(transport)?;
        match resp.status() {
            s if s.is_success() => version_of(resp).await,
            StatusCode::NOT_FOUND => Err(StoreError::NotFound(id.to_string())),
            s => Err(unexpected("delete", index, id, s, resp).await),
        }
    }

    async fn get(&self, index: &str, id: &str) -> Result<Option<Map<String, Value>>, StoreError> {
        debug!(index, id, "es get");
        let resp = self
            .request(Method::GET, self.doc_url(index, id))
            .send()
            .await
            .map_err(transport)?;
        match resp.status() {
            s if s.is_success() => {
                let body: Value = resp.json().await.map_err(transport)?;
                Ok(body.get("_source").and_then(Value::as_object).cloned())
            }
            StatusCode::NOT_FOUND => Ok(None),
            s => Err(unexpected("get", index, id, s, resp).await),
        }
    }

    async fn search(
        &self,
        index: &str,
        filter: &Filter,
        sort: Option<(&str, bool)>,
        limit: usize,
    ) -> Result<Vec<Map<String, Value>>, StoreError> {
        let mut body = Map::new();
        body.insert("query".to_string(), compile(filter));
        body.insert("size".to_string(), json!(limit));
        if let Some((field, descending)) = sort {
            body.insert("sort".to_string(), sort_clause(field, descending));
        }
        debug!(index, limit, "es search");
        let resp = self
            .request(Method::POST, format!("{}/{}/_search", self.base, index))
            .json(&Value::Object(body))
            .send()
            .await
            .map_err(transport)?;
        if !resp.status().is_success() {
            let status = resp.status();
            return Err(unexpected("search", index, "-", status, resp).await);
        }
        let body: Value = resp.json().await.map_err(transport)?;
        let hits = body["hits"]["hits"]
            .as_array()
            .map(|hits| {
                hits.iter()
                    .filter_map(|hit| hit.get("_source").and_then(Value::as_object).cloned())
                    .collect()
            })
            .unwrap_or_default();
        Ok(hits)
    }

    async fn bulk_write(
        &self,
        index: &str,
        ops: Vec<BulkOp>,
    ) -> Result<Vec<BulkItem>, StoreError> {
        debug!(index, ops = ops.len(), "es bulk");
        let resp = self
            .request(Method::POST, format!("{}/{}/_bulk", self.base, index))
            .header("content-type", "application/x-ndjson")
            .body(bulk_body(&ops))
            .send()
            .await
            .map_err(transport)?;
        if !resp.status().is_success() {
            let status = resp.status();
            return Err(unexpected("bulk", index, "-", status, resp).await);
        }
        let body: Value = resp.json().await.map_err(transport)?;
        let items = body["items"]
            .as_array()
            .map(|items| items.iter().map(bulk_item).collect())
            .unwrap_or_default();
        Ok(items)
    }

    async fn refresh(&self, index: &str) -> Result<(), StoreError> {
        debug!(index, "es refresh");
        let resp = self
            .request(Method::POST, format!("{}/{}/_refresh", self.base, index))
            .send()
            .await
            .map_err(transport)?;
        if !resp.status().is_success() {
            let status = resp.status();
            return Err(unexpected("refresh", index, "-", status, resp).await);
        }
        Ok(())
    }

    async fn exists(&self, index: &str, id: &str) -> Result<bool, StoreError> {
        let resp = self
            .request(Method::HEAD, self.doc_url(index, id))
            .send()
            .await
            .map_err(transport)?;
        match resp.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            s => Err(unexpected("exists", index, id, s, resp).await),
        }
    }
}

/// Newline-delimited action/source pairs for the `_bulk` endpoint.
fn bulk_body(ops: &[BulkOp]) -> String {
    let mut body = String::new();
    for op in ops {
        match op {
            BulkOp::Index { id, payload } => {
                body.push_str(&json!({ "index": { "_id": id } }).to_string());
                body.push('\n');
                body.push_str(&Value::Object(payload.clone()).to_string());
                body.push('\n');
            }
            BulkOp::Delete { id } => {
                body.push_str(&json!({ "delete": { "_id": id } }).to_string());
                body.push('\n');
            }
        }
    }
    body
}

fn sort_clause(field: &str, descending: bool) -> Value {
    let order = if descending { "desc" } else { "asc" };
    let mut inner = Map::new();
    inner.insert(field.to_string(), json!({ "order": order }));
    Value::Array(vec![Value::Object(inner)])
}

/// A `_bulk` response item is `{action: {"_id": ..., "error"?: {...}}}`.
fn bulk_item(item: &Value) -> BulkItem {
    let detail = item
        .as_object()
        .and_then(|wrapper| wrapper.values().next())
        .cloned()
        .unwrap_or(Value::Null);
    let id = detail["_id"].as_str().unwrap_or_default().to_string();
    let failure = detail.get("error").map(|err| {
        format!(
            "{}: {}",
            err["type"].as_str().unwrap_or("unknown"),
            err["reason"].as_str().unwrap_or("no reason given")
        )
    });
    BulkItem { id, failure }
}

fn transport(err: reqwest::Error) -> StoreError {
    error!(%err, "es transport failure");
    StoreError::Transport(err.to_string())
}

async fn unexpected(
    op: &str,
    index: &str,
    id: &str,
    status: StatusCode,
    resp: Response,
) -> StoreError {
    let body = body_text(resp).await;
    error!(op, index, id, %status, body, "unexpected es response");
    StoreError::Transport(format!("{op} {index}/{id}: HTTP {status}: {body}"))
}

async fn version_of(resp: Response) -> Result<WriteResult, StoreError> {
    let body: Value = resp.json().await.map_err(transport)?;
    Ok(WriteResult {
        version: body.get("_version").and_then(Value::as_i64).unwrap_or_default(),
    })
}

async fn body_text(resp: Response) -> String {
    resp.text().await.unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bulk_body_interleaves_actions_and_sources() {
        let ops = vec![
            BulkOp::Index {
                id: "User:sam".into(),
                payload: json!({"name": "shankar"}).as_object().unwrap().clone(),
            },
            BulkOp::Delete { id: "User:kim".into() },
        ];
        let body = bulk_body(&ops);
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            serde_json::from_str::<Value>(lines[0]).unwrap(),
            json!({ "index": { "_id": "User:sam" } })
        );
        assert_eq!(
            serde_json::from_str::<Value>(lines[1]).unwrap(),
            json!({ "name": "shankar" })
        );
        assert_eq!(
            serde_json::from_str::<Value>(lines[2]).unwrap(),
            json!({ "delete": { "_id": "User:kim" } })
        );
        assert!(body.ends_with('\n'));
    }

    #[test]
    fn sort_clause_carries_the_order() {
        assert_eq!(
            sort_clause("&timestamp", true),
            json!([{ "&timestamp": { "order": "desc" } }])
        );
        assert_eq!(
            sort_clause("&timestamp", false),
            json!([{ "&timestamp": { "order": "asc" } }])
        );
    }

    #[test]
    fn bulk_item_extracts_failures() {
        let ok = json!({ "index": { "_id": "User:sam", "status": 201 } });
        let item = bulk_item(&ok);
        assert_eq!(item.id, "User:sam");
        assert!(item.failure.is_none());

        let failed = json!({
            "index": {
                "_id": "User:kim",
                "status": 409,
                "error": {
                    "type": "version_conflict_engine_exception",
                    "reason": "[User:kim]: version conflict"
                }
            }
        });
        let item = bulk_item(&failed);
        assert_eq!(
            item.failure.as_deref(),
            Some("version_conflict_engine_exception: [User:kim]: version conflict")
        );
    }
}
