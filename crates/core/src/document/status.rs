use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle status of a stored document.
///
/// `Pending`/`PendingDelete` are the only non-terminal states; everything
/// else is never mutated in place. Subsequent changes create a new document
/// version and archive the prior one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DocStatus {
    Live,
    Updated,
    Deleted,
    Pending,
    PendingDelete,
    Rejected,
    Discarded,
}

impl DocStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocStatus::Live => "live",
            DocStatus::Updated => "updated",
            DocStatus::Deleted => "deleted",
            DocStatus::Pending => "pending",
            DocStatus::PendingDelete => "pendingDelete",
            DocStatus::Rejected => "rejected",
            DocStatus::Discarded => "discarded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "live" => Some(DocStatus::Live),
            "updated" => Some(DocStatus::Updated),
            "deleted" => Some(DocStatus::Deleted),
            "pending" => Some(DocStatus::Pending),
            "pendingDelete" => Some(DocStatus::PendingDelete),
            "rejected" => Some(DocStatus::Rejected),
            "discarded" => Some(DocStatus::Discarded),
            _ => None,
        }
    }

    /// Awaiting approval; the only states a transition may leave.
    pub fn is_pending(&self) -> bool {
        matches!(self, DocStatus::Pending | DocStatus::PendingDelete)
    }

    /// A settled state; never mutated in place.
    pub fn is_terminal(&self) -> bool {
        !self.is_pending()
    }
}

impl fmt::Display for DocStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
