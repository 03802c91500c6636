//! In-memory reference backend.
//!
//! Mirrors the remote store's behavior closely enough for engine tests and
//! local demos: server-assigned ids and timestamps, immediate snapshot
//! delivery on subscribe, wholesale re-publication on every change, atomic
//! read batches, and injectable write failures.

use crate::backend::{ChatBackend, DeletionUpdate, Subscription};
use crate::chat::types::{
    Conversation, ConversationId, Message, MessageDraft, MessageId, UserProfile,
};
use crate::error::{Error, Result, WriteAction};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use tokio::sync::mpsc;

#[derive(Default)]
struct State {
    conversations: HashMap<ConversationId, Conversation>,
    // Messages keyed by id within each conversation; snapshot order is
    // irrelevant, the store sorts.
    messages: HashMap<ConversationId, BTreeMap<MessageId, Message>>,
    profiles: HashMap<String, UserProfile>,
    message_subs: HashMap<ConversationId, Vec<mpsc::UnboundedSender<Vec<Message>>>>,
    conversation_subs: HashMap<ConversationId, Vec<mpsc::UnboundedSender<Conversation>>>,
    profile_subs: HashMap<String, Vec<mpsc::UnboundedSender<UserProfile>>>,
    failing_actions: HashSet<WriteAction>,
    offline: bool,
}

/// In-memory [`ChatBackend`] implementation.
#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace a conversation document.
    pub fn create_conversation(&self, id: ConversationId, a: &str, b: &str) {
        let mut state = self.state.lock().unwrap();
        state
            .conversations
            .insert(id.clone(), Conversation::new(id, a, b));
    }

    /// Create or replace a profile document and notify its subscribers.
    pub fn upsert_profile(&self, profile: UserProfile) {
        let mut state = self.state.lock().unwrap();
        let user_id = profile.id.clone();
        state.profiles.insert(user_id.clone(), profile);
        Self::publish_profile(&mut state, &user_id);
    }

    /// Flip a participant's online flag and notify profile subscribers.
    pub fn set_online(&self, user_id: &str, online: bool) {
        let mut state = self.state.lock().unwrap();
        let profile = state
            .profiles
            .entry(user_id.to_string())
            .or_insert_with(|| UserProfile {
                id: user_id.to_string(),
                ..UserProfile::default()
            });
        profile.is_online = online;
        Self::publish_profile(&mut state, user_id);
    }

    /// Make every write of the given action fail until cleared.
    pub fn fail_writes(&self, action: WriteAction) {
        self.state.lock().unwrap().failing_actions.insert(action);
    }

    /// Stop failing writes of the given action.
    pub fn heal_writes(&self, action: WriteAction) {
        self.state.lock().unwrap().failing_actions.remove(&action);
    }

    /// Simulate losing the network path: every write fails visibly.
    pub fn set_offline(&self, offline: bool) {
        self.state.lock().unwrap().offline = offline;
    }

    /// Fetch a message for assertions in tests and tooling.
    pub fn get_message(
        &self,
        conversation_id: &ConversationId,
        message_id: &MessageId,
    ) -> Option<Message> {
        let state = self.state.lock().unwrap();
        state
            .messages
            .get(conversation_id)
            .and_then(|log| log.get(message_id))
            .cloned()
    }

    /// Fetch a conversation document for assertions.
    pub fn get_conversation(&self, conversation_id: &ConversationId) -> Option<Conversation> {
        self.state
            .lock()
            .unwrap()
            .conversations
            .get(conversation_id)
            .cloned()
    }

    fn check_write(state: &State, action: WriteAction) -> Result<()> {
        if state.offline {
            return Err(Error::write(action, "no network path"));
        }
        if state.failing_actions.contains(&action) {
            return Err(Error::write(action, "injected failure"));
        }
        Ok(())
    }

    fn publish_messages(state: &mut State, conversation_id: &ConversationId) {
        let snapshot: Vec<Message> = state
            .messages
            .get(conversation_id)
            .map(|log| log.values().cloned().collect())
            .unwrap_or_default();
        if let Some(subs) = state.message_subs.get_mut(conversation_id) {
            subs.retain(|tx| tx.send(snapshot.clone()).is_ok());
        }
    }

    fn publish_conversation(state: &mut State, conversation_id: &ConversationId) {
        let Some(snapshot) = state.conversations.get(conversation_id).cloned() else {
            return;
        };
        if let Some(subs) = state.conversation_subs.get_mut(conversation_id) {
            subs.retain(|tx| tx.send(snapshot.clone()).is_ok());
        }
    }

    fn publish_profile(state: &mut State, user_id: &str) {
        let Some(snapshot) = state.profiles.get(user_id).cloned() else {
            return;
        };
        if let Some(subs) = state.profile_subs.get_mut(user_id) {
            subs.retain(|tx| tx.send(snapshot.clone()).is_ok());
        }
    }

    fn conversation_mut<'a>(
        state: &'a mut State,
        conversation_id: &ConversationId,
    ) -> &'a mut Conversation {
        state
            .conversations
            .entry(conversation_id.clone())
            .or_insert_with(|| Conversation {
                id: conversation_id.clone(),
                ..Conversation::default()
            })
    }
}

impl ChatBackend for MemoryBackend {
    fn subscribe_messages(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Subscription<Vec<Message>>> {
        let mut state = self.state.lock().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        let snapshot: Vec<Message> = state
            .messages
            .get(conversation_id)
            .map(|log| log.values().cloned().collect())
            .unwrap_or_default();
        let _ = tx.send(snapshot);
        state
            .message_subs
            .entry(conversation_id.clone())
            .or_default()
            .push(tx);
        Ok(Subscription::new(rx))
    }

    fn subscribe_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Subscription<Conversation>> {
        let mut state = self.state.lock().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        let snapshot = Self::conversation_mut(&mut state, conversation_id).clone();
        let _ = tx.send(snapshot);
        state
            .conversation_subs
            .entry(conversation_id.clone())
            .or_default()
            .push(tx);
        Ok(Subscription::new(rx))
    }

    fn subscribe_profile(&self, user_id: &str) -> Result<Subscription<UserProfile>> {
        let mut state = self.state.lock().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        let snapshot = state
            .profiles
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| UserProfile {
                id: user_id.to_string(),
                ..UserProfile::default()
            });
        let _ = tx.send(snapshot);
        state
            .profile_subs
            .entry(user_id.to_string())
            .or_default()
            .push(tx);
        Ok(Subscription::new(rx))
    }

    async fn append_message(
        &self,
        conversation_id: &ConversationId,
        draft: MessageDraft,
    ) -> Result<MessageId> {
        let mut state = self.state.lock().unwrap();
        Self::check_write(&state, WriteAction::Send)?;

        let message = Message {
            id: MessageId::new(),
            sender_id: draft.sender_id,
            created_at: Some(Utc::now()),
            body: draft.body,
            attachment: draft.attachment,
            read: false,
            deleted_for_everyone: false,
            deleted_at: None,
            deleted_for: BTreeMap::new(),
        };
        let id = message.id.clone();
        state
            .messages
            .entry(conversation_id.clone())
            .or_default()
            .insert(id.clone(), message);
        Self::publish_messages(&mut state, conversation_id);
        Ok(id)
    }

    async fn apply_deletion(
        &self,
        conversation_id: &ConversationId,
        message_id: &MessageId,
        update: DeletionUpdate,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        Self::check_write(&state, WriteAction::Deletion)?;

        let message = state
            .messages
            .get_mut(conversation_id)
            .and_then(|log| log.get_mut(message_id))
            .ok_or_else(|| {
                Error::write(WriteAction::Deletion, format!("no message {message_id}"))
            })?;

        let now = Utc::now();
        match update {
            DeletionUpdate::ForEveryone => {
                message.deleted_for_everyone = true;
                message.deleted_at = Some(now);
            }
            DeletionUpdate::ForUser(user_id) => {
                message.deleted_for.insert(user_id, now);
            }
        }
        Self::publish_messages(&mut state, conversation_id);
        Ok(())
    }

    async fn mark_read(
        &self,
        conversation_id: &ConversationId,
        message_ids: &[MessageId],
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        Self::check_write(&state, WriteAction::ReadReceipts)?;
        if message_ids.is_empty() {
            return Ok(());
        }

        let log = state.messages.get_mut(conversation_id).ok_or_else(|| {
            Error::write(WriteAction::ReadReceipts, "no such conversation")
        })?;

        // Validate the whole batch before touching anything: the commit is
        // all-or-nothing.
        for id in message_ids {
            if !log.contains_key(id) {
                return Err(Error::write(
                    WriteAction::ReadReceipts,
                    format!("no message {id}"),
                ));
            }
        }
        for id in message_ids {
            if let Some(message) = log.get_mut(id) {
                message.read = true;
            }
        }
        Self::publish_messages(&mut state, conversation_id);
        Ok(())
    }

    async fn set_typing(
        &self,
        conversation_id: &ConversationId,
        user_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        Self::check_write(&state, WriteAction::Typing)?;

        let conversation = Self::conversation_mut(&mut state, conversation_id);
        match since {
            Some(at) => {
                conversation.typing_status.insert(user_id.to_string(), at);
            }
            None => {
                conversation.typing_status.remove(user_id);
            }
        }
        Self::publish_conversation(&mut state, conversation_id);
        Ok(())
    }

    async fn update_summary(
        &self,
        conversation_id: &ConversationId,
        user_id: &str,
        summary: String,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        Self::check_write(&state, WriteAction::Summary)?;

        let now = Utc::now();
        let conversation = Self::conversation_mut(&mut state, conversation_id);
        conversation.last_message_summary = Some(summary);
        conversation.last_updated_at = Some(now);
        conversation.last_viewed_at.insert(user_id.to_string(), now);
        Self::publish_conversation(&mut state, conversation_id);
        Ok(())
    }

    async fn mark_viewed(&self, conversation_id: &ConversationId, user_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        Self::check_write(&state, WriteAction::Summary)?;

        let now = Utc::now();
        let conversation = Self::conversation_mut(&mut state, conversation_id);
        conversation.last_viewed_at.insert(user_id.to_string(), now);
        Self::publish_conversation(&mut state, conversation_id);
        Ok(())
    }
}
