//! Conversation orchestrator.
//!
//! One engine instance per open conversation. It owns the three remote
//! subscriptions (message log, conversation metadata, peer profile), feeds
//! incoming snapshots through the store's visibility filter, drives the
//! outbound typing heartbeat and the read-receipt batches, and republishes a
//! wholesale [`ChatSnapshot`] to the rendering collaborator on every change.
//!
//! The engine is single-threaded and cooperative: [`SyncEngine::process`]
//! handles exactly one event to completion, and user actions are direct
//! async methods so each write's failure is surfaced to its own caller. The
//! only suspension points are the outbound writes and the subscription
//! awaits.

use crate::backend::{ChatBackend, DeletionUpdate, Subscription};
use crate::chat::attachment::Attachment;
use crate::chat::deletion::{DeleteScope, DeletionPolicy, MessageActions};
use crate::chat::presence::{PresenceTracker, TypingSignal};
use crate::chat::receipts::ReadReceiptBatcher;
use crate::chat::store::{MessageStore, VisibleMessage};
use crate::chat::types::{
    Conversation, ConversationId, Message, MessageDraft, MessageId, PeerPresence, UserProfile,
};
use crate::config::Config;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::watch;

/// Everything the rendering collaborator needs, re-emitted wholesale on
/// every change.
#[derive(Debug, Clone)]
pub struct ChatSnapshot {
    /// True until the first message-log snapshot arrives.
    pub loading: bool,
    /// The viewer's visible, ordered message sequence.
    pub messages: Vec<VisibleMessage>,
    /// Peer typing/online state.
    pub presence: PeerPresence,
}

impl Default for ChatSnapshot {
    fn default() -> Self {
        Self {
            loading: true,
            messages: Vec::new(),
            presence: PeerPresence::default(),
        }
    }
}

struct Subscriptions {
    messages: Subscription<Vec<Message>>,
    conversation: Subscription<Conversation>,
    profile: Subscription<UserProfile>,
}

enum Wake {
    Messages(Option<Vec<Message>>),
    Conversation(Option<Conversation>),
    Profile(Option<UserProfile>),
    IdleTimer,
}

/// Synchronization engine for one open conversation.
pub struct SyncEngine<B: ChatBackend> {
    backend: Arc<B>,
    conversation_id: ConversationId,
    viewer_id: String,
    peer_id: String,
    store: MessageStore,
    policy: DeletionPolicy,
    presence: PresenceTracker,
    batcher: ReadReceiptBatcher,
    subs: Option<Subscriptions>,
    // Latest raw log snapshot; superseded wholesale by every incoming batch.
    raw: Vec<Message>,
    conversation: Conversation,
    peer_online: bool,
    loading: bool,
    visible: Vec<VisibleMessage>,
    snapshot_tx: watch::Sender<ChatSnapshot>,
}

impl<B: ChatBackend> SyncEngine<B> {
    /// Open a conversation: establish the three subscriptions and record
    /// that the viewer is looking at it.
    ///
    /// Returns the engine plus the watch channel the rendering collaborator
    /// observes. Re-opening after an identity change means building a fresh
    /// engine; the old one is closed and discarded.
    pub async fn open(
        backend: Arc<B>,
        config: &Config,
        conversation_id: ConversationId,
        viewer_id: impl Into<String>,
        peer_id: impl Into<String>,
    ) -> Result<(Self, watch::Receiver<ChatSnapshot>)> {
        let viewer_id = viewer_id.into();
        let peer_id = peer_id.into();

        let subs = Subscriptions {
            messages: backend.subscribe_messages(&conversation_id)?,
            conversation: backend.subscribe_conversation(&conversation_id)?,
            profile: backend.subscribe_profile(&peer_id)?,
        };

        let (snapshot_tx, snapshot_rx) = watch::channel(ChatSnapshot::default());

        let engine = Self {
            store: MessageStore::new(viewer_id.clone()),
            policy: DeletionPolicy::new(config),
            presence: PresenceTracker::new(config),
            batcher: ReadReceiptBatcher::new(peer_id.clone()),
            subs: Some(subs),
            raw: Vec::new(),
            conversation: Conversation {
                id: conversation_id.clone(),
                ..Conversation::default()
            },
            peer_online: false,
            loading: true,
            visible: Vec::new(),
            snapshot_tx,
            backend,
            conversation_id,
            viewer_id,
            peer_id,
        };

        // Best-effort: the unread accounting of collaborators outside this
        // core keys off last_viewed_at.
        if let Err(err) = engine
            .backend
            .mark_viewed(&engine.conversation_id, &engine.viewer_id)
            .await
        {
            tracing::warn!("failed to record conversation view: {err}");
        }

        Ok((engine, snapshot_rx))
    }

    /// The participant this engine projects for.
    pub fn viewer_id(&self) -> &str {
        self.store.viewer_id()
    }

    /// The other participant.
    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    /// Whether the conversation is still open.
    pub fn is_open(&self) -> bool {
        self.subs.is_some()
    }

    /// Await and handle the next event: a subscription snapshot or the
    /// typing idle deadline. Runs it to completion before returning.
    ///
    /// An error from any subscription is fatal to this conversation view;
    /// the lifecycle owner must close and re-open. Failed outbound writes
    /// triggered while handling an event (receipt batches, typing clears)
    /// are logged and retried on the next natural trigger instead.
    pub async fn process(&mut self) -> Result<()> {
        let wake = {
            let subs = self
                .subs
                .as_mut()
                .ok_or_else(|| Error::Subscription("conversation is closed".to_string()))?;
            let idle_at = self.presence.idle_deadline();
            tokio::select! {
                batch = subs.messages.recv() => Wake::Messages(batch),
                doc = subs.conversation.recv() => Wake::Conversation(doc),
                profile = subs.profile.recv() => Wake::Profile(profile),
                _ = sleep_until_wallclock(idle_at), if idle_at.is_some() => Wake::IdleTimer,
            }
        };

        match wake {
            Wake::Messages(Some(records)) => {
                self.on_message_snapshot(records).await;
                Ok(())
            }
            Wake::Conversation(Some(doc)) => {
                self.conversation = doc;
                self.emit();
                Ok(())
            }
            Wake::Profile(Some(profile)) => {
                self.peer_online = profile.is_online;
                self.emit();
                Ok(())
            }
            Wake::IdleTimer => {
                self.on_typing_idle().await;
                Ok(())
            }
            Wake::Messages(None) => Err(Error::Subscription(
                "message log subscription closed".to_string(),
            )),
            Wake::Conversation(None) => Err(Error::Subscription(
                "conversation subscription closed".to_string(),
            )),
            Wake::Profile(None) => Err(Error::Subscription(
                "profile subscription closed".to_string(),
            )),
        }
    }

    /// Send a plain-text message.
    ///
    /// Empty or whitespace-only text is a silent no-op. Returns the
    /// server-assigned id of the appended message.
    pub async fn send_message(&mut self, text: &str) -> Result<Option<MessageId>> {
        let body = text.trim();
        if body.is_empty() {
            return Ok(None);
        }
        if body.chars().count() > Message::MAX_BODY_LENGTH {
            return Err(Error::Validation(format!(
                "message exceeds {} characters",
                Message::MAX_BODY_LENGTH
            )));
        }

        self.clear_typing_best_effort().await;
        let draft = MessageDraft::text(self.viewer_id.clone(), body);
        self.append(draft).await.map(Some)
    }

    /// Complete a pick-and-send flow for an attachment, with an optional
    /// caption.
    pub async fn send_attachment(
        &mut self,
        attachment: Attachment,
        caption: Option<String>,
    ) -> Result<MessageId> {
        self.clear_typing_best_effort().await;
        let draft = MessageDraft::attachment(self.viewer_id.clone(), attachment, caption);
        self.append(draft).await
    }

    /// Record a local text-input mutation.
    ///
    /// Writes the "typing since now" heartbeat on the first keystroke of a
    /// burst and re-arms the 3-second idle timer on every one. A failed
    /// heartbeat write is surfaced here but leaves the local timer armed.
    pub async fn record_typing(&mut self) -> Result<()> {
        if let Some(TypingSignal::Started(at)) = self.presence.on_keystroke(Utc::now()) {
            self.backend
                .set_typing(&self.conversation_id, &self.viewer_id, Some(at))
                .await?;
        }
        Ok(())
    }

    /// Compute the long-press menu for a message, or `None` if the id is
    /// unknown.
    pub fn message_actions(&self, message_id: &MessageId) -> Option<MessageActions> {
        self.find_raw(message_id)
            .map(|message| self.policy.available_actions(message, &self.viewer_id, Utc::now()))
    }

    /// Apply a deletion. The policy runs before any write: an out-of-window
    /// or non-sender "delete for everyone" fails with a policy violation and
    /// nothing is sent.
    pub async fn delete_message(
        &mut self,
        message_id: &MessageId,
        scope: DeleteScope,
    ) -> Result<()> {
        let message = self
            .find_raw(message_id)
            .ok_or_else(|| Error::Validation(format!("unknown message {message_id}")))?;
        self.policy
            .authorize(message, &self.viewer_id, scope, Utc::now())?;

        let update = match scope {
            DeleteScope::ForMe => DeletionUpdate::ForUser(self.viewer_id.clone()),
            DeleteScope::ForEveryone => DeletionUpdate::ForEveryone,
        };
        self.backend
            .apply_deletion(&self.conversation_id, message_id, update)
            .await
    }

    /// Close the conversation.
    ///
    /// Synchronous by design: dropping the subscriptions detaches them, so
    /// no orphaned snapshot can fire into a torn-down view, and the typing
    /// idle timer is cleared with them.
    pub fn close(&mut self) {
        self.subs = None;
        self.presence.reset();
        tracing::debug!("closed conversation {}", self.conversation_id);
    }

    async fn on_message_snapshot(&mut self, records: Vec<Message>) {
        self.raw = records;
        self.visible = self.store.apply(&self.raw);
        self.loading = false;
        self.emit();

        // Acknowledge everything unread from the peer in one batch. A
        // failure leaves the set untouched remotely; the next snapshot or
        // open recomputes and retries it.
        let pending = self.batcher.pending(&self.visible);
        if !pending.is_empty() {
            if let Err(err) = self
                .backend
                .mark_read(&self.conversation_id, &pending)
                .await
            {
                tracing::warn!(
                    "read-receipt batch of {} failed, retrying on next snapshot: {err}",
                    pending.len()
                );
            }
        }
    }

    async fn on_typing_idle(&mut self) {
        if let Some(TypingSignal::Stopped) = self.presence.on_idle_tick(Utc::now()) {
            if let Err(err) = self
                .backend
                .set_typing(&self.conversation_id, &self.viewer_id, None)
                .await
            {
                tracing::warn!("failed to clear typing heartbeat: {err}");
            }
        }
    }

    async fn clear_typing_best_effort(&mut self) {
        if let Some(TypingSignal::Stopped) = self.presence.on_send() {
            if let Err(err) = self
                .backend
                .set_typing(&self.conversation_id, &self.viewer_id, None)
                .await
            {
                tracing::warn!("failed to clear typing heartbeat on send: {err}");
            }
        }
    }

    async fn append(&mut self, draft: MessageDraft) -> Result<MessageId> {
        let summary = draft.summary();
        let id = self
            .backend
            .append_message(&self.conversation_id, draft)
            .await?;

        // Best-effort follow-up; the message itself is already committed.
        if let Err(err) = self
            .backend
            .update_summary(&self.conversation_id, &self.viewer_id, summary)
            .await
        {
            tracing::warn!("conversation summary update failed: {err}");
        }

        Ok(id)
    }

    fn find_raw(&self, message_id: &MessageId) -> Option<&Message> {
        // Latest record wins, same as the store's dedup.
        self.raw.iter().rev().find(|m| &m.id == message_id)
    }

    fn emit(&self) {
        let typing = self
            .presence
            .peer_typing(&self.conversation, &self.peer_id, Utc::now());
        let snapshot = ChatSnapshot {
            loading: self.loading,
            messages: self.visible.clone(),
            presence: PeerPresence {
                typing,
                online: self.peer_online,
            },
        };
        let _ = self.snapshot_tx.send(snapshot);
    }
}

/// Sleep until a wall-clock deadline, or forever when there is none.
///
/// A deadline already in the past yields immediately; skew is handled by the
/// presence tracker when the tick is processed.
async fn sleep_until_wallclock(deadline: Option<DateTime<Utc>>) {
    match deadline {
        Some(at) => {
            let wait = (at - Utc::now())
                .to_std()
                .unwrap_or(std::time::Duration::ZERO);
            tokio::time::sleep(wait).await;
        }
        None => std::future::pending::<()>().await,
    }
}
