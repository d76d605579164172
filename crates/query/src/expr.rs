use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A node in the boolean filter tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Filter {
    /// Exact equality on a single field.
    Term { field: String, value: Value },
    /// Set membership on a single field.
    Terms { field: String, values: Vec<Value> },
    /// Field presence (non-null).
    Exists { field: String },
    /// Free-text match on a single field.
    Match { field: String, text: String },
    /// Nested boolean combination.
    Bool(BoolFilter),
}

/// Boolean combination of clauses, mirroring the store's `bool` query:
/// `must` and `filter` clauses all have to hold, `must_not` clauses all have
/// to fail, and at least one `should` clause has to hold when any are given.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoolFilter {
    pub must: Vec<Filter>,
    pub filter: Vec<Filter>,
    pub should: Vec<Filter>,
    pub must_not: Vec<Filter>,
}

impl BoolFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn must(mut self, clause: Filter) -> Self {
        self.must.push(clause);
        self
    }

    pub fn filter(mut self, clause: Filter) -> Self {
        self.filter.push(clause);
        self
    }

    pub fn should(mut self, clause: Filter) -> Self {
        self.should.push(clause);
        self
    }

    pub fn must_not(mut self, clause: Filter) -> Self {
        self.must_not.push(clause);
        self
    }

    pub fn build(self) -> Filter {
        Filter::Bool(self)
    }
}

/// Start a boolean filter builder.
pub fn bool_filter() -> BoolFilter {
    BoolFilter::new()
}

/// Exact-equality clause.
pub fn term(field: impl Into<String>, value: impl Into<Value>) -> Filter {
    Filter::Term {
        field: field.into(),
        value: value.into(),
    }
}

/// Set-membership clause.
pub fn terms(field: impl Into<String>, values: Vec<Value>) -> Filter {
    Filter::Terms {
        field: field.into(),
        values,
    }
}

/// Field-presence clause.
pub fn exists(field: impl Into<String>) -> Filter {
    Filter::Exists {
        field: field.into(),
    }
}

/// Free-text match clause.
pub fn match_text(field: impl Into<String>, text: impl Into<String>) -> Filter {
    Filter::Match {
        field: field.into(),
        text: text.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builder_collects_clauses() {
        let f = bool_filter()
            .filter(term("&model", "User"))
            .must_not(exists("&expiry"))
            .build();

        match f {
            Filter::Bool(b) => {
                assert_eq!(b.filter.len(), 1);
                assert_eq!(b.must_not.len(), 1);
                assert!(b.must.is_empty());
            }
            other => panic!("expected bool filter, got {other:?}"),
        }
    }

    #[test]
    fn term_accepts_json_values() {
        let f = term("age", json!(25));
        assert_eq!(
            f,
            Filter::Term {
                field: "age".into(),
                value: json!(25)
            }
        );
    }
}
