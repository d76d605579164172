//! Canned filter fragments over the reserved status/timestamp/expiry fields.

use indexflow_query::{bool_filter, exists, term, terms, Filter};
use serde_json::json;

use super::meta;
use super::status::DocStatus;

/// Live documents of a model: not an archived ancestor (no `&expiry`) and not
/// pending or terminally non-live.
pub fn live_index(model: &str) -> Filter {
    bool_filter()
        .filter(term(meta::MODEL, model))
        .must_not(exists(meta::EXPIRY))
        .must_not(terms(
            meta::STATUS,
            vec![
                json!(DocStatus::Pending.as_str()),
                json!(DocStatus::PendingDelete.as_str()),
                json!(DocStatus::Deleted.as_str()),
                json!(DocStatus::Rejected.as_str()),
                json!(DocStatus::Discarded.as_str()),
            ],
        ))
        .build()
}

/// Pending shadow document(s) of a model, optionally narrowed to one id.
pub fn pending_approval(model: &str, id: Option<&str>) -> Filter {
    let mut b = bool_filter()
        .filter(term(meta::MODEL, meta::approval_model(model)))
        .filter(terms(
            meta::STATUS,
            vec![
                json!(DocStatus::Pending.as_str()),
                json!(DocStatus::PendingDelete.as_str()),
            ],
        ));
    if let Some(id) = id {
        b = b.filter(term(meta::ID, id));
    }
    b.build()
}

/// Archived ancestors of `(model, id)`: superseded versions carry `&expiry`.
pub fn ancestors(model: &str, id: &str) -> Filter {
    bool_filter()
        .filter(term(meta::MODEL, model))
        .filter(term(meta::ID, id))
        .filter(exists(meta::EXPIRY))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexflow_query::eval::matches;
    use serde_json::{Map, Value};

    fn doc(v: Value) -> Map<String, Value> {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn live_index_excludes_archived_and_pending() {
        let filter = live_index("User");
        let live = doc(json!({"&model": "User", "&id": "sam", "&status": "live"}));
        let archived =
            doc(json!({"&model": "User", "&id": "sam", "&status": "updated", "&expiry": 2000}));
        let pending = doc(json!({"&model": "User", "&id": "sam", "&status": "pending"}));
        let no_status = doc(json!({"&model": "User", "&id": "sam"}));

        assert!(matches(&filter, &live));
        assert!(matches(&filter, &no_status));
        assert!(!matches(&filter, &archived));
        assert!(!matches(&filter, &pending));
    }

    #[test]
    fn pending_approval_targets_the_shadow_model() {
        let filter = pending_approval("User", Some("sam"));
        let shadow =
            doc(json!({"&model": "User$approval", "&id": "sam", "&status": "pending"}));
        let rejected =
            doc(json!({"&model": "User$approval", "&id": "sam", "&status": "rejected"}));
        let live = doc(json!({"&model": "User", "&id": "sam", "&status": "live"}));

        assert!(matches(&filter, &shadow));
        assert!(!matches(&filter, &rejected));
        assert!(!matches(&filter, &live));
    }

    #[test]
    fn ancestors_require_expiry() {
        let filter = ancestors("User", "sam");
        let archived =
            doc(json!({"&model": "User", "&id": "sam", "&status": "updated", "&expiry": 2000}));
        let live = doc(json!({"&model": "User", "&id": "sam", "&status": "live"}));

        assert!(matches(&filter, &archived));
        assert!(!matches(&filter, &live));
    }
}
