//! Backend seam: the append-mostly remote log and its mutable documents.
//!
//! The engine talks to the remote store exclusively through [`ChatBackend`].
//! The persisted shape is logical and backend-agnostic: a conversation
//! document (summary, per-participant typing/last-viewed maps), a message
//! sub-collection keyed by conversation then message id and ordered by the
//! server-assigned timestamp, and per-user profile documents.

pub mod memory;

use crate::chat::types::{
    Conversation, ConversationId, Message, MessageDraft, MessageId, UserProfile,
};
use crate::error::Result;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

pub use memory::MemoryBackend;

/// Deletion transition to persist on a message record.
///
/// The backend stamps the transition time; repeated transitions overwrite
/// the previous stamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletionUpdate {
    /// Set the global tombstone.
    ForEveryone,
    /// Hide the message for one participant.
    ForUser(String),
}

/// A live snapshot subscription.
///
/// Every change re-emits the full document (or collection) wholesale. The
/// current state is delivered immediately on subscribe. Dropping the
/// subscription detaches it synchronously; no further snapshots can be
/// observed afterwards.
#[derive(Debug)]
pub struct Subscription<T> {
    rx: mpsc::UnboundedReceiver<T>,
}

impl<T> Subscription<T> {
    /// Build a subscription around the receiving half of a snapshot channel.
    pub fn new(rx: mpsc::UnboundedReceiver<T>) -> Self {
        Self { rx }
    }

    /// Await the next snapshot. `None` means the backend dropped the feed,
    /// which the engine treats as a fatal subscription failure.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }
}

/// Remote chat store operations.
///
/// Every write can fail independently; a failure never tears down an open
/// subscription. Batch semantics of [`ChatBackend::mark_read`] are
/// all-or-nothing.
pub trait ChatBackend: Send + Sync + 'static {
    /// Subscribe to the conversation's message log (wholesale snapshots,
    /// unordered; ordering is the store's job).
    fn subscribe_messages(&self, conversation_id: &ConversationId)
        -> Result<Subscription<Vec<Message>>>;

    /// Subscribe to the conversation's mutable metadata document.
    fn subscribe_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Subscription<Conversation>>;

    /// Subscribe to a participant's profile document.
    fn subscribe_profile(&self, user_id: &str) -> Result<Subscription<UserProfile>>;

    /// Append a message to the log. The server assigns the id and the commit
    /// timestamp and returns the id.
    fn append_message(
        &self,
        conversation_id: &ConversationId,
        draft: MessageDraft,
    ) -> impl std::future::Future<Output = Result<MessageId>> + Send;

    /// Apply a deletion transition to a message.
    fn apply_deletion(
        &self,
        conversation_id: &ConversationId,
        message_id: &MessageId,
        update: DeletionUpdate,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Mark the given messages read in one atomic batch. On failure no
    /// message may be marked.
    fn mark_read(
        &self,
        conversation_id: &ConversationId,
        message_ids: &[MessageId],
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Write or clear a participant's typing heartbeat. Each participant
    /// writes only their own key, so concurrent writers never conflict.
    fn set_typing(
        &self,
        conversation_id: &ConversationId,
        user_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Update the conversation summary after a send: last message preview,
    /// last-updated stamp and the sender's own last-viewed entry.
    fn update_summary(
        &self,
        conversation_id: &ConversationId,
        user_id: &str,
        summary: String,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Record that `user_id` is looking at the conversation now.
    fn mark_viewed(
        &self,
        conversation_id: &ConversationId,
        user_id: &str,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}
