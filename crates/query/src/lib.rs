//! Boolean filter-expression algebra for the document store.
//!
//! Callers build a [`Filter`] tree (must/filter/should/must-not clauses over
//! field equality, existence, set membership and free-text match) and hand it
//! to the store. The store either compiles it to its native bool-query JSON
//! ([`compile`]) or, for the embedded in-memory store, evaluates it directly
//! ([`eval::matches`]).

pub mod compile;
pub mod eval;
pub mod expr;

pub use compile::compile;
pub use expr::{bool_filter, exists, match_text, term, terms, BoolFilter, Filter};
