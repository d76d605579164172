// In-memory filter evaluation, used by the embedded test store. Semantics
// track the compiled form: `filter`/`must` are conjunctive, `must_not` is
// negated, `should` needs at least one hit, and free-text match is a
// case-insensitive substring check.

use serde_json::{Map, Value};

use crate::expr::Filter;

/// Evaluate a filter tree against a document's fields.
pub fn matches(filter: &Filter, doc: &Map<String, Value>) -> bool {
    match filter {
        Filter::Term { field, value } => doc.get(field) == Some(value),
        Filter::Terms { field, values } => {
            doc.get(field).is_some_and(|v| values.contains(v))
        }
        Filter::Exists { field } => doc.get(field).is_some_and(|v| !v.is_null()),
        Filter::Match { field, text } => doc
            .get(field)
            .and_then(Value::as_str)
            .is_some_and(|s| s.to_lowercase().contains(&text.to_lowercase())),
        Filter::Bool(b) => {
            b.must.iter().all(|f| matches(f, doc))
                && b.filter.iter().all(|f| matches(f, doc))
                && b.must_not.iter().all(|f| !matches(f, doc))
                && (b.should.is_empty() || b.should.iter().any(|f| matches(f, doc)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{bool_filter, exists, match_text, term, terms};
    use serde_json::json;

    fn doc(v: Value) -> Map<String, Value> {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn term_matches_exact_value() {
        let d = doc(json!({"&model": "User", "age": 25}));
        assert!(matches(&term("&model", "User"), &d));
        assert!(!matches(&term("&model", "Group"), &d));
        assert!(matches(&term("age", json!(25)), &d));
    }

    #[test]
    fn terms_matches_membership() {
        let d = doc(json!({"&status": "pending"}));
        let f = terms("&status", vec![json!("pending"), json!("pendingDelete")]);
        assert!(matches(&f, &d));
    }

    #[test]
    fn exists_ignores_null() {
        let d = doc(json!({"&expiry": null, "name": "sam"}));
        assert!(!matches(&exists("&expiry"), &d));
        assert!(matches(&exists("name"), &d));
    }

    #[test]
    fn match_is_case_insensitive_substring() {
        let d = doc(json!({"title": "Senior Programmer"}));
        assert!(matches(&match_text("title", "programmer"), &d));
        assert!(!matches(&match_text("title", "manager"), &d));
    }

    #[test]
    fn bool_combines_clauses() {
        let d = doc(json!({"&model": "User", "&status": "live"}));
        let f = bool_filter()
            .filter(term("&model", "User"))
            .must_not(exists("&expiry"))
            .should(term("&status", "live"))
            .should(term("&status", "updated"))
            .build();
        assert!(matches(&f, &d));

        let archived = doc(json!({"&model": "User", "&status": "live", "&expiry": 2000}));
        assert!(!matches(&f, &archived));
    }
}
