//! Read-receipt batching.
//!
//! Unread messages from the peer are acknowledged in a single atomic batch
//! write, never one by one, so a partial failure can't leave a half-read
//! conversation. The batcher is stateless: a failed commit is simply retried
//! when the next snapshot or conversation open recomputes the unread set.

use crate::chat::store::VisibleMessage;
use crate::chat::types::MessageId;

/// Selects the unread-from-peer set out of the visible sequence.
#[derive(Debug, Clone)]
pub struct ReadReceiptBatcher {
    peer_id: String,
}

impl ReadReceiptBatcher {
    /// Create a batcher acknowledging messages authored by `peer_id`.
    pub fn new(peer_id: impl Into<String>) -> Self {
        Self {
            peer_id: peer_id.into(),
        }
    }

    /// Ids of visible messages from the peer that we have not read yet.
    ///
    /// Tombstones are included; their read flag still exists remotely.
    pub fn pending(&self, visible: &[VisibleMessage]) -> Vec<MessageId> {
        visible
            .iter()
            .filter(|message| message.sender_id == self.peer_id && !message.read)
            .map(|message| message.id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn visible(id: &str, sender: &str, read: bool) -> VisibleMessage {
        VisibleMessage {
            id: MessageId::from(id),
            sender_id: sender.to_string(),
            created_at: Utc::now(),
            read,
            body: Some("hi".to_string()),
            attachment: None,
            tombstone: false,
        }
    }

    #[test]
    fn test_pending_selects_unread_from_peer_only() {
        let batcher = ReadReceiptBatcher::new("alice");
        let messages = vec![
            visible("m-1", "alice", false),
            visible("m-2", "alice", true),
            visible("m-3", "bob", false),
            visible("m-4", "alice", false),
        ];

        let pending = batcher.pending(&messages);
        assert_eq!(
            pending,
            vec![MessageId::from("m-1"), MessageId::from("m-4")]
        );
    }

    #[test]
    fn test_pending_empty_when_all_read() {
        let batcher = ReadReceiptBatcher::new("alice");
        let messages = vec![visible("m-1", "alice", true), visible("m-2", "bob", false)];
        assert!(batcher.pending(&messages).is_empty());
    }

    #[test]
    fn test_pending_includes_tombstones() {
        let batcher = ReadReceiptBatcher::new("alice");
        let mut tombstone = visible("m-1", "alice", false);
        tombstone.tombstone = true;
        tombstone.body = None;
        assert_eq!(batcher.pending(&[tombstone]).len(), 1);
    }
}
