//! Compilation of a [`Filter`] tree to the store's native query DSL JSON.

use serde_json::{json, Map, Value};

use crate::expr::Filter;

/// Compile a filter tree into the store's bool-query JSON.
pub fn compile(filter: &Filter) -> Value {
    match filter {
        Filter::Term { field, value } => wrap("term", field, value.clone()),
        Filter::Terms { field, values } => {
            wrap("terms", field, Value::Array(values.clone()))
        }
        Filter::Exists { field } => json!({ "exists": { "field": field } }),
        Filter::Match { field, text } => wrap("match", field, json!(text)),
        Filter::Bool(b) => {
            let mut body = Map::new();
            for (key, clauses) in [
                ("must", &b.must),
                ("filter", &b.filter),
                ("should", &b.should),
                ("must_not", &b.must_not),
            ] {
                if !clauses.is_empty() {
                    body.insert(
                        key.to_string(),
                        Value::Array(clauses.iter().map(compile).collect()),
                    );
                }
            }
            if !b.should.is_empty() {
                body.insert("minimum_should_match".to_string(), json!(1));
            }
            json!({ "bool": body })
        }
    }
}

/// Build `{kind: {field: value}}` for clause kinds keyed by field name.
fn wrap(kind: &str, field: &str, value: Value) -> Value {
    let mut inner = Map::new();
    inner.insert(field.to_string(), value);
    let mut outer = Map::new();
    outer.insert(kind.to_string(), Value::Object(inner));
    Value::Object(outer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{bool_filter, exists, term, terms};
    use serde_json::json;

    #[test]
    fn compiles_term() {
        let q = compile(&term("&model", "User"));
        assert_eq!(q, json!({ "term": { "&model": "User" } }));
    }

    #[test]
    fn compiles_bool_with_clauses() {
        let q = compile(
            &bool_filter()
                .filter(term("&model", "User"))
                .must_not(exists("&expiry"))
                .build(),
        );
        assert_eq!(
            q,
            json!({
                "bool": {
                    "filter": [{ "term": { "&model": "User" } }],
                    "must_not": [{ "exists": { "field": "&expiry" } }],
                }
            })
        );
    }

    #[test]
    fn should_clauses_require_one_match() {
        let q = compile(
            &bool_filter()
                .should(terms("&status", vec![json!("pending")]))
                .build(),
        );
        assert_eq!(q["bool"]["minimum_should_match"], json!(1));
    }
}
