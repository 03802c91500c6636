//! Core data types for the conversation sync engine.

use crate::chat::attachment::Attachment;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Unique identifier for a chat message, assigned by the remote log.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    /// Create a new random message ID.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Unique identifier for a conversation between two participants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    /// Get the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ConversationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A message record as stored in the remote log.
///
/// Immutable after commit except for `read`, the deletion fields and their
/// timestamps. `created_at` is the server-assigned commit timestamp and the
/// sole ordering key; it is `None` only for records observed before the
/// server has stamped them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message identifier.
    pub id: MessageId,
    /// Sender's participant ID.
    pub sender_id: String,
    /// Server-assigned commit timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Plain-text content. Doubles as the caption when an attachment is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Attachment payload, at most one per message.
    #[serde(flatten, default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
    /// Whether the recipient has read the message.
    #[serde(default)]
    pub read: bool,
    /// Global tombstone flag. Once set the payload is void for everyone.
    #[serde(default)]
    pub deleted_for_everyone: bool,
    /// When the global tombstone was set (latest transition wins).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    /// Participants who deleted this message for themselves, with the latest
    /// transition time per participant.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub deleted_for: BTreeMap<String, DateTime<Utc>>,
}

impl Message {
    /// Maximum allowed body length in characters.
    pub const MAX_BODY_LENGTH: usize = 1000;

    /// Check whether this message is hidden for the given participant.
    pub fn is_deleted_for(&self, participant_id: &str) -> bool {
        self.deleted_for.contains_key(participant_id)
    }

    /// Check if this message was sent by us (vs received).
    pub fn is_outgoing(&self, our_id: &str) -> bool {
        self.sender_id == our_id
    }
}

/// A draft handed to the backend for appending to the log.
///
/// The backend assigns the id and the commit timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDraft {
    /// Authoring participant.
    pub sender_id: String,
    /// Plain-text content or caption.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Attachment payload.
    #[serde(flatten, default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
}

impl MessageDraft {
    /// Create a text-only draft.
    pub fn text(sender_id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            sender_id: sender_id.into(),
            body: Some(body.into()),
            attachment: None,
        }
    }

    /// Create a draft carrying an attachment with an optional caption.
    pub fn attachment(
        sender_id: impl Into<String>,
        attachment: Attachment,
        caption: Option<String>,
    ) -> Self {
        Self {
            sender_id: sender_id.into(),
            body: caption.filter(|c| !c.trim().is_empty()),
            attachment: Some(attachment),
        }
    }

    /// One-line preview used for the conversation summary.
    pub fn summary(&self) -> String {
        match (&self.attachment, &self.body) {
            (Some(attachment), _) => attachment.summary(),
            (None, Some(body)) => truncate_preview(body),
            (None, None) => String::new(),
        }
    }
}

/// A conversation between exactly two participants.
///
/// `typing_status` and `last_viewed_at` are keyed per participant so the two
/// writers never touch the same field.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Conversation {
    /// Conversation identifier.
    pub id: ConversationId,
    /// The two participant IDs.
    pub participant_ids: Vec<String>,
    /// Preview of the last message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message_summary: Option<String>,
    /// Timestamp of the last update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated_at: Option<DateTime<Utc>>,
    /// Participant id -> last typing heartbeat. Absent means not typing.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub typing_status: BTreeMap<String, DateTime<Utc>>,
    /// Participant id -> when they last viewed the conversation.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub last_viewed_at: BTreeMap<String, DateTime<Utc>>,
}

impl Conversation {
    /// Create a new conversation between two participants.
    pub fn new(id: ConversationId, a: impl Into<String>, b: impl Into<String>) -> Self {
        Self {
            id,
            participant_ids: vec![a.into(), b.into()],
            ..Self::default()
        }
    }

    /// Get the other participant relative to `our_id`.
    pub fn peer_of(&self, our_id: &str) -> Option<&str> {
        self.participant_ids
            .iter()
            .map(String::as_str)
            .find(|id| *id != our_id)
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self(String::new())
    }
}

/// A participant's profile document, as mirrored from the remote store.
///
/// `is_online` is owned by a presence collaborator and read-only here.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserProfile {
    /// Participant identifier.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub display_name: String,
    /// Whether the participant is currently online.
    #[serde(default)]
    pub is_online: bool,
}

/// Peer presence as exposed to the rendering collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PeerPresence {
    /// Derived from the peer's typing heartbeat with decay.
    pub typing: bool,
    /// Mirrored from the peer's profile document.
    pub online: bool,
}

/// Truncate content for preview display.
pub(crate) fn truncate_preview(content: &str) -> String {
    const MAX_PREVIEW_LEN: usize = 50;
    if content.chars().count() <= MAX_PREVIEW_LEN {
        content.to_string()
    } else {
        let mut preview: String = content.chars().take(MAX_PREVIEW_LEN - 3).collect();
        preview.push_str("...");
        preview
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_id_generation() {
        let id1 = MessageId::new();
        let id2 = MessageId::new();
        assert_ne!(id1, id2);
        assert!(!id1.as_str().is_empty());
    }

    #[test]
    fn test_message_deleted_for() {
        let mut msg = Message {
            id: MessageId::new(),
            sender_id: "alice".to_string(),
            created_at: Some(Utc::now()),
            body: Some("hi".to_string()),
            attachment: None,
            read: false,
            deleted_for_everyone: false,
            deleted_at: None,
            deleted_for: BTreeMap::new(),
        };

        assert!(!msg.is_deleted_for("bob"));
        msg.deleted_for.insert("bob".to_string(), Utc::now());
        assert!(msg.is_deleted_for("bob"));
        assert!(!msg.is_deleted_for("alice"));
    }

    #[test]
    fn test_conversation_peer_of() {
        let conv = Conversation::new(ConversationId::from("c1"), "alice", "bob");
        assert_eq!(conv.peer_of("alice"), Some("bob"));
        assert_eq!(conv.peer_of("bob"), Some("alice"));
    }

    #[test]
    fn test_draft_summary_prefers_attachment() {
        let draft = MessageDraft::attachment(
            "alice",
            Attachment::Location {
                latitude: 1.0,
                longitude: 2.0,
                address: None,
            },
            Some("see you here".to_string()),
        );
        assert_eq!(draft.summary(), "Location");

        let draft = MessageDraft::text("alice", "hello there");
        assert_eq!(draft.summary(), "hello there");
    }

    #[test]
    fn test_truncate_preview() {
        assert_eq!(truncate_preview("Short"), "Short");
        assert_eq!(
            truncate_preview("This is a really long message that should be truncated for preview"),
            "This is a really long message that should be tr..."
        );
    }
}
