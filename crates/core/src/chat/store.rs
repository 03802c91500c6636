//! Ordered, deduplicated, viewer-filtered projection of a conversation.
//!
//! The projection is recomputed wholesale from the latest snapshot of the
//! remote log on every event batch. There is no incremental merge state, so
//! re-applying the same batch is trivially idempotent.

use crate::chat::attachment::Attachment;
use crate::chat::types::{Message, MessageId};
use chrono::{DateTime, Datelike, Local, Utc};
use std::collections::HashMap;

/// A message as presented to the rendering collaborator.
///
/// Tombstoned messages keep their position, sender and timestamp so ordering
/// and date grouping stay stable; only the payload is voided.
#[derive(Debug, Clone, PartialEq)]
pub struct VisibleMessage {
    /// Message identifier.
    pub id: MessageId,
    /// Sender's participant ID.
    pub sender_id: String,
    /// Normalized commit timestamp (missing timestamps become "now").
    pub created_at: DateTime<Utc>,
    /// Whether the recipient has read the message.
    pub read: bool,
    /// Text content, voided on tombstones.
    pub body: Option<String>,
    /// Attachment payload, voided on tombstones.
    pub attachment: Option<Attachment>,
    /// True when the message was deleted for everyone.
    pub tombstone: bool,
}

impl VisibleMessage {
    /// Text to place on the clipboard for the "copy" action.
    pub fn clipboard_text(&self) -> Option<String> {
        if self.tombstone {
            return None;
        }
        if let Some(body) = &self.body {
            if !body.is_empty() {
                return Some(body.clone());
            }
        }
        match &self.attachment {
            Some(Attachment::Contact {
                name,
                phone_numbers,
                ..
            }) => {
                let phone = phone_numbers
                    .first()
                    .map(String::as_str)
                    .unwrap_or("No phone");
                Some(format!("Contact: {name}\nPhone: {phone}"))
            }
            Some(Attachment::Location {
                latitude,
                longitude,
                address,
            }) => Some(match address {
                Some(address) => format!("Location: {address}"),
                None => format!("Location: {latitude}, {longitude}"),
            }),
            Some(attachment) => Some(format!("{} attachment", attachment.summary())),
            None => None,
        }
    }
}

/// Viewer-scoped projection of the conversation's message log.
#[derive(Debug, Clone)]
pub struct MessageStore {
    viewer_id: String,
}

impl MessageStore {
    /// Create a store projecting for the given viewer.
    pub fn new(viewer_id: impl Into<String>) -> Self {
        Self {
            viewer_id: viewer_id.into(),
        }
    }

    /// The viewer this store projects for.
    pub fn viewer_id(&self) -> &str {
        &self.viewer_id
    }

    /// Project the raw log snapshot into the viewer's visible sequence.
    ///
    /// Records hidden for the viewer are dropped, duplicates collapse to the
    /// latest record per id, missing timestamps normalize to `now`, and the
    /// result is totally ordered by `(created_at, id)`.
    pub fn apply(&self, records: &[Message]) -> Vec<VisibleMessage> {
        self.apply_at(records, Utc::now())
    }

    /// [`MessageStore::apply`] with an explicit normalization instant.
    pub fn apply_at(&self, records: &[Message], now: DateTime<Utc>) -> Vec<VisibleMessage> {
        // Latest record per id wins, covering re-delivered and superseded
        // events in a single pass.
        let mut latest: HashMap<&MessageId, &Message> = HashMap::new();
        for record in records {
            latest.insert(&record.id, record);
        }

        let mut visible: Vec<VisibleMessage> = latest
            .into_values()
            .filter(|record| !record.is_deleted_for(&self.viewer_id))
            .map(|record| {
                let tombstone = record.deleted_for_everyone;
                VisibleMessage {
                    id: record.id.clone(),
                    sender_id: record.sender_id.clone(),
                    created_at: record.created_at.unwrap_or(now),
                    read: record.read,
                    body: if tombstone { None } else { record.body.clone() },
                    attachment: if tombstone {
                        None
                    } else {
                        record.attachment.clone()
                    },
                    tombstone,
                }
            })
            .collect();

        visible.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });

        visible
    }
}

/// Which messages in the ordered sequence need a date header.
///
/// A header goes before the first message and before every message whose
/// local calendar day differs from its predecessor's. Recomputed per render,
/// never stored.
pub fn date_headers(messages: &[VisibleMessage]) -> Vec<bool> {
    messages
        .iter()
        .enumerate()
        .map(|(index, message)| {
            index == 0 || local_day(message.created_at) != local_day(messages[index - 1].created_at)
        })
        .collect()
}

/// Format a date header the way the conversation view shows it.
pub fn format_date_header(day: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let day = day.with_timezone(&Local).date_naive();
    let today = now.with_timezone(&Local).date_naive();

    if day == today {
        "Today".to_string()
    } else if today.pred_opt() == Some(day) {
        "Yesterday".to_string()
    } else {
        // e.g. "Monday, Jan 5"
        day.format("%A, %b %-d").to_string()
    }
}

fn local_day(at: DateTime<Utc>) -> (i32, u32, u32) {
    let local = at.with_timezone(&Local);
    (local.year(), local.month(), local.day())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::collections::BTreeMap;

    fn message(id: &str, sender: &str, at: Option<DateTime<Utc>>) -> Message {
        Message {
            id: MessageId::from(id),
            sender_id: sender.to_string(),
            created_at: at,
            body: Some(format!("body of {id}")),
            attachment: None,
            read: false,
            deleted_for_everyone: false,
            deleted_at: None,
            deleted_for: BTreeMap::new(),
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_apply_sorts_by_timestamp_then_id() {
        let store = MessageStore::new("bob");
        let records = vec![
            message("m-c", "alice", Some(at(10))),
            message("m-a", "alice", Some(at(30))),
            message("m-b", "bob", Some(at(10))),
        ];

        let visible = store.apply(&records);
        let ids: Vec<&str> = visible.iter().map(|m| m.id.as_str()).collect();
        // Equal timestamps break ties lexicographically by id.
        assert_eq!(ids, vec!["m-b", "m-c", "m-a"]);
    }

    #[test]
    fn test_apply_is_idempotent() {
        let store = MessageStore::new("bob");
        let records = vec![
            message("m-1", "alice", Some(at(5))),
            message("m-2", "bob", Some(at(1))),
            message("m-1", "alice", Some(at(5))),
        ];

        let first = store.apply_at(&records, at(100));
        let second = store.apply_at(&records, at(100));
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn test_apply_drops_messages_deleted_for_viewer() {
        let store = MessageStore::new("bob");
        let mut hidden = message("m-1", "alice", Some(at(1)));
        hidden.deleted_for.insert("bob".to_string(), at(2));
        // Even a global tombstone stays hidden once deleted for the viewer.
        hidden.deleted_for_everyone = true;
        let records = vec![hidden, message("m-2", "alice", Some(at(3)))];

        let visible = store.apply(&records);
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id.as_str(), "m-2");

        // The other participant still sees both.
        let store = MessageStore::new("alice");
        assert_eq!(store.apply(&records).len(), 2);
    }

    #[test]
    fn test_tombstone_keeps_position_and_timestamp() {
        let store = MessageStore::new("bob");
        let mut deleted = message("m-2", "alice", Some(at(20)));
        deleted.deleted_for_everyone = true;
        deleted.deleted_at = Some(at(50));
        let records = vec![
            message("m-1", "alice", Some(at(10))),
            deleted,
            message("m-3", "bob", Some(at(30))),
        ];

        let visible = store.apply(&records);
        assert_eq!(visible[1].id.as_str(), "m-2");
        assert!(visible[1].tombstone);
        assert_eq!(visible[1].created_at, at(20));
        assert_eq!(visible[1].sender_id, "alice");
        assert!(visible[1].body.is_none());
        assert!(visible[1].attachment.is_none());
    }

    #[test]
    fn test_missing_timestamp_normalizes_to_now() {
        let store = MessageStore::new("bob");
        let records = vec![
            message("m-1", "alice", Some(at(10))),
            message("m-2", "alice", None),
        ];

        let visible = store.apply_at(&records, at(99));
        assert_eq!(visible[1].id.as_str(), "m-2");
        assert_eq!(visible[1].created_at, at(99));
    }

    #[test]
    fn test_duplicate_records_latest_wins() {
        let store = MessageStore::new("bob");
        let mut updated = message("m-1", "alice", Some(at(10)));
        updated.read = true;
        let records = vec![message("m-1", "alice", Some(at(10))), updated];

        let visible = store.apply(&records);
        assert_eq!(visible.len(), 1);
        assert!(visible[0].read);
    }

    #[test]
    fn test_date_headers_on_day_transition() {
        let store = MessageStore::new("bob");
        // 23:59 and 00:01 around a local midnight; using whole-day spacing to
        // stay timezone independent.
        let records = vec![
            message("m-1", "alice", Some(at(0))),
            message("m-2", "alice", Some(at(60))),
            message("m-3", "alice", Some(at(60 + 86_400 * 2))),
        ];

        let visible = store.apply(&records);
        let headers = date_headers(&visible);
        assert_eq!(headers, vec![true, false, true]);
    }

    #[test]
    fn test_date_headers_empty_sequence() {
        assert!(date_headers(&[]).is_empty());
    }

    #[test]
    fn test_format_date_header() {
        let now = Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap();
        assert_eq!(format_date_header(now, now), "Today");
        assert_eq!(
            format_date_header(now - Duration::days(1), now),
            "Yesterday"
        );
        let older = format_date_header(now - Duration::days(9), now);
        assert!(older.contains(','), "long form expected, got {older}");
    }

    #[test]
    fn test_clipboard_text() {
        let store = MessageStore::new("bob");
        let records = vec![message("m-1", "alice", Some(at(1)))];
        let visible = store.apply(&records);
        assert_eq!(visible[0].clipboard_text().as_deref(), Some("body of m-1"));

        let mut tombstoned = message("m-2", "alice", Some(at(2)));
        tombstoned.deleted_for_everyone = true;
        let visible = store.apply(&[tombstoned]);
        assert_eq!(visible[0].clipboard_text(), None);
    }
}
