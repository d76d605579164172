use std::collections::BTreeMap;

use serde::Serialize;
use uuid::Uuid;

use crate::record::RecordAction;

/// Per-record outcome report accumulated during a bulk commit, handed back to
/// the caller for delivery to whatever channel they notify on.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    /// Caller-supplied context carried through unchanged.
    pub context: BTreeMap<String, String>,
    pub entries: Vec<NotificationEntry>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEntry {
    /// The record's stable key (`model:id`).
    pub key: String,
    pub action: RecordAction,
    /// Result label, `noop`, or the failure message.
    pub outcome: String,
}

impl Notification {
    pub fn builder() -> Builder {
        Builder::default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Builder {
    context: BTreeMap<String, String>,
    entries: Vec<NotificationEntry>,
}

impl Builder {
    pub fn context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub(crate) fn entry(
        &mut self,
        key: impl Into<String>,
        action: RecordAction,
        outcome: impl Into<String>,
    ) {
        self.entries.push(NotificationEntry {
            key: key.into(),
            action,
            outcome: outcome.into(),
        });
    }

    pub fn build(self) -> Notification {
        Notification {
            id: Uuid::new_v4().to_string(),
            context: self.context,
            entries: self.entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_accumulates_entries_under_context() {
        let mut builder = Notification::builder().context("initiator", "loader-7");
        builder.entry("User:sam", RecordAction::Create, "created");
        builder.entry("User:kim", RecordAction::Create, "noop");
        let notification = builder.build();

        assert_eq!(notification.context.get("initiator").unwrap(), "loader-7");
        assert_eq!(notification.entries.len(), 2);
        assert!(!notification.id.is_empty());
    }
}
