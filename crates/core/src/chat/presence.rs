//! Typing and online presence with time decay.
//!
//! Typing is never pushed as discrete on/off events. Outbound, a heartbeat
//! timestamp is written on the not-typing -> typing transition and cleared on
//! idle or send. Inbound, the peer's state is recomputed from their last
//! heartbeat on every metadata snapshot, so a missed clear can never latch
//! the indicator on.

use crate::chat::types::Conversation;
use crate::config::Config;
use chrono::{DateTime, Duration, Utc};

/// Heartbeat write the tracker asks the caller to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingSignal {
    /// Write "typing since now" into the conversation document.
    Started(DateTime<Utc>),
    /// Clear our typing entry in the conversation document.
    Stopped,
}

/// Local typing state machine plus the peer-side decay function.
///
/// Purely in-memory; remote write failures never corrupt it.
#[derive(Debug, Clone)]
pub struct PresenceTracker {
    idle_timeout: Duration,
    decay_window: Duration,
    typing_since: Option<DateTime<Utc>>,
    idle_deadline: Option<DateTime<Utc>>,
}

impl PresenceTracker {
    /// Create a tracker with the configured windows.
    pub fn new(config: &Config) -> Self {
        Self {
            idle_timeout: config.typing_idle(),
            decay_window: config.typing_decay(),
            typing_since: None,
            idle_deadline: None,
        }
    }

    /// Whether we are currently marked as typing.
    pub fn is_typing(&self) -> bool {
        self.typing_since.is_some()
    }

    /// When the idle timer should fire, if armed.
    pub fn idle_deadline(&self) -> Option<DateTime<Utc>> {
        self.idle_deadline
    }

    /// Record a local text-input mutation.
    ///
    /// Every keystroke re-arms the idle timer; only the first one of a burst
    /// asks for a heartbeat write.
    pub fn on_keystroke(&mut self, now: DateTime<Utc>) -> Option<TypingSignal> {
        self.idle_deadline = Some(now + self.idle_timeout);
        if self.typing_since.is_none() {
            self.typing_since = Some(now);
            Some(TypingSignal::Started(now))
        } else {
            None
        }
    }

    /// Record a message send, which always clears the typing state.
    pub fn on_send(&mut self) -> Option<TypingSignal> {
        self.clear()
    }

    /// Fire the idle timer if its deadline has passed.
    ///
    /// A deadline in the future (timer woke early, or clock skew) leaves the
    /// state untouched.
    pub fn on_idle_tick(&mut self, now: DateTime<Utc>) -> Option<TypingSignal> {
        match self.idle_deadline {
            Some(deadline) if now >= deadline => self.clear(),
            _ => None,
        }
    }

    /// Drop all local typing state without asking for a write.
    pub fn reset(&mut self) {
        self.typing_since = None;
        self.idle_deadline = None;
    }

    fn clear(&mut self) -> Option<TypingSignal> {
        self.idle_deadline = None;
        self.typing_since.take().map(|_| TypingSignal::Stopped)
    }

    /// Derive the peer's typing state from the conversation metadata at `now`.
    ///
    /// True while `now - heartbeat` is inside the decay window. A heartbeat
    /// from the future (clock skew) compares as negative elapsed time and
    /// counts as still typing.
    pub fn peer_typing(&self, conversation: &Conversation, peer_id: &str, now: DateTime<Utc>) -> bool {
        match conversation.typing_status.get(peer_id) {
            Some(heartbeat) => now - *heartbeat < self.decay_window,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::types::ConversationId;

    fn tracker() -> PresenceTracker {
        PresenceTracker::new(&Config::default())
    }

    fn conversation_with_heartbeat(peer: &str, at: DateTime<Utc>) -> Conversation {
        let mut conv = Conversation::new(ConversationId::from("c1"), "alice", peer);
        conv.typing_status.insert(peer.to_string(), at);
        conv
    }

    #[test]
    fn test_first_keystroke_requests_heartbeat() {
        let mut tracker = tracker();
        let now = Utc::now();

        assert_eq!(
            tracker.on_keystroke(now),
            Some(TypingSignal::Started(now))
        );
        assert!(tracker.is_typing());
        // Subsequent keystrokes only re-arm the timer.
        assert_eq!(tracker.on_keystroke(now + Duration::seconds(1)), None);
        assert_eq!(
            tracker.idle_deadline(),
            Some(now + Duration::seconds(1) + Duration::seconds(3))
        );
    }

    #[test]
    fn test_idle_tick_clears_after_deadline() {
        let mut tracker = tracker();
        let now = Utc::now();
        tracker.on_keystroke(now);

        // Early wakeup does nothing.
        assert_eq!(tracker.on_idle_tick(now + Duration::seconds(2)), None);
        assert!(tracker.is_typing());

        assert_eq!(
            tracker.on_idle_tick(now + Duration::seconds(3)),
            Some(TypingSignal::Stopped)
        );
        assert!(!tracker.is_typing());
        assert_eq!(tracker.idle_deadline(), None);
    }

    #[test]
    fn test_send_clears_typing() {
        let mut tracker = tracker();
        tracker.on_keystroke(Utc::now());
        assert_eq!(tracker.on_send(), Some(TypingSignal::Stopped));
        // No stale clear when we never marked typing.
        assert_eq!(tracker.on_send(), None);
    }

    #[test]
    fn test_keystroke_after_clear_restarts() {
        let mut tracker = tracker();
        let now = Utc::now();
        tracker.on_keystroke(now);
        tracker.on_send();

        let later = now + Duration::seconds(10);
        assert_eq!(
            tracker.on_keystroke(later),
            Some(TypingSignal::Started(later))
        );
    }

    #[test]
    fn test_peer_typing_decays_after_window() {
        let tracker = tracker();
        let now = Utc::now();

        let conv = conversation_with_heartbeat("bob", now - Duration::seconds(4));
        assert!(tracker.peer_typing(&conv, "bob", now));

        let conv = conversation_with_heartbeat("bob", now - Duration::seconds(5));
        assert!(!tracker.peer_typing(&conv, "bob", now));
    }

    #[test]
    fn test_peer_typing_absent_entry_is_false() {
        let tracker = tracker();
        let conv = Conversation::new(ConversationId::from("c1"), "alice", "bob");
        assert!(!tracker.peer_typing(&conv, "bob", Utc::now()));
    }

    #[test]
    fn test_peer_typing_tolerates_clock_skew() {
        let tracker = tracker();
        let now = Utc::now();
        // Heartbeat from the future reads as still typing, not an error.
        let conv = conversation_with_heartbeat("bob", now + Duration::seconds(30));
        assert!(tracker.peer_typing(&conv, "bob", now));
    }

    #[test]
    fn test_peer_window_outlives_local_idle_timer() {
        // The 5s decay window must exceed the 3s idle timeout so the peer's
        // view absorbs propagation delay.
        let config = Config::default();
        assert!(config.typing_decay() > config.typing_idle());
    }
}
