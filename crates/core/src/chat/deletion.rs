//! Two-tier soft-deletion policy.
//!
//! Per message the states are `Active -> DeletedForMe(participant)` and
//! `Active -> DeletedForEveryone`. Delete-for-me is independent per
//! participant and never restricted. Delete-for-everyone is sender-only and
//! time-boxed; outside the window the request fails with a policy violation
//! instead of degrading to delete-for-me.

use crate::chat::types::Message;
use crate::config::Config;
use crate::error::PolicyViolation;
use chrono::{DateTime, Duration, Utc};

/// Scope of a deletion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteScope {
    /// Hide the message for the requesting participant only.
    ForMe,
    /// Tombstone the message for both participants.
    ForEveryone,
}

/// Long-press actions available on a message, as the view should offer them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MessageActions {
    pub can_copy: bool,
    pub can_forward: bool,
    pub can_delete_for_me: bool,
    pub can_delete_for_everyone: bool,
}

/// Guard for deletion transitions.
#[derive(Debug, Clone)]
pub struct DeletionPolicy {
    window: Duration,
}

impl DeletionPolicy {
    /// Create a policy with the configured delete-for-everyone window.
    pub fn new(config: &Config) -> Self {
        Self {
            window: config.delete_for_everyone_window(),
        }
    }

    /// Create a policy with an explicit window.
    pub fn with_window(window: Duration) -> Self {
        Self { window }
    }

    /// Check whether `requester` may apply the deletion to `message` at `now`.
    ///
    /// Runs before any remote write. A missing commit timestamp counts as
    /// "just sent", and clock skew (message timestamped in the future) is
    /// treated as inside the window.
    pub fn authorize(
        &self,
        message: &Message,
        requester: &str,
        scope: DeleteScope,
        now: DateTime<Utc>,
    ) -> Result<(), PolicyViolation> {
        match scope {
            DeleteScope::ForMe => Ok(()),
            DeleteScope::ForEveryone => {
                if message.sender_id != requester {
                    return Err(PolicyViolation::NotSender);
                }
                let age = now - message.created_at.unwrap_or(now);
                if age < self.window {
                    Ok(())
                } else {
                    Err(PolicyViolation::WindowExpired {
                        window_secs: self.window.num_seconds(),
                    })
                }
            }
        }
    }

    /// Compute the long-press menu for `viewer` on `message` at `now`.
    ///
    /// Copy and forward disappear once the message is a global tombstone;
    /// delete-for-me is always offered; delete-for-everyone is offered only
    /// while [`DeletionPolicy::authorize`] would accept it.
    pub fn available_actions(
        &self,
        message: &Message,
        viewer: &str,
        now: DateTime<Utc>,
    ) -> MessageActions {
        let tombstoned = message.deleted_for_everyone;
        MessageActions {
            can_copy: !tombstoned,
            can_forward: !tombstoned,
            can_delete_for_me: true,
            can_delete_for_everyone: !tombstoned
                && self
                    .authorize(message, viewer, DeleteScope::ForEveryone, now)
                    .is_ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::types::MessageId;
    use std::collections::BTreeMap;

    fn message_from(sender: &str, created_at: DateTime<Utc>) -> Message {
        Message {
            id: MessageId::new(),
            sender_id: sender.to_string(),
            created_at: Some(created_at),
            body: Some("hello".to_string()),
            attachment: None,
            read: false,
            deleted_for_everyone: false,
            deleted_at: None,
            deleted_for: BTreeMap::new(),
        }
    }

    fn policy() -> DeletionPolicy {
        DeletionPolicy::new(&Config::default())
    }

    #[test]
    fn test_delete_for_everyone_inside_window() {
        let now = Utc::now();
        let msg = message_from("alice", now - Duration::minutes(59));
        assert!(policy()
            .authorize(&msg, "alice", DeleteScope::ForEveryone, now)
            .is_ok());
    }

    #[test]
    fn test_delete_for_everyone_outside_window() {
        let now = Utc::now();
        let msg = message_from("alice", now - Duration::minutes(61));
        let err = policy()
            .authorize(&msg, "alice", DeleteScope::ForEveryone, now)
            .unwrap_err();
        assert!(matches!(err, PolicyViolation::WindowExpired { .. }));
    }

    #[test]
    fn test_delete_for_everyone_requires_sender() {
        let now = Utc::now();
        let msg = message_from("alice", now - Duration::minutes(1));
        let err = policy()
            .authorize(&msg, "bob", DeleteScope::ForEveryone, now)
            .unwrap_err();
        assert_eq!(err, PolicyViolation::NotSender);
    }

    #[test]
    fn test_delete_for_me_unrestricted() {
        let now = Utc::now();
        let mut msg = message_from("alice", now - Duration::days(30));
        // Allowed on a global tombstone too.
        msg.deleted_for_everyone = true;
        assert!(policy()
            .authorize(&msg, "bob", DeleteScope::ForMe, now)
            .is_ok());
        assert!(policy()
            .authorize(&msg, "alice", DeleteScope::ForMe, now)
            .is_ok());
    }

    #[test]
    fn test_future_timestamp_counts_as_inside_window() {
        let now = Utc::now();
        let msg = message_from("alice", now + Duration::minutes(5));
        assert!(policy()
            .authorize(&msg, "alice", DeleteScope::ForEveryone, now)
            .is_ok());
    }

    #[test]
    fn test_missing_timestamp_counts_as_just_sent() {
        let now = Utc::now();
        let mut msg = message_from("alice", now);
        msg.created_at = None;
        assert!(policy()
            .authorize(&msg, "alice", DeleteScope::ForEveryone, now)
            .is_ok());
    }

    #[test]
    fn test_available_actions_for_sender() {
        let now = Utc::now();
        let msg = message_from("alice", now - Duration::minutes(10));
        let actions = policy().available_actions(&msg, "alice", now);
        assert!(actions.can_copy);
        assert!(actions.can_forward);
        assert!(actions.can_delete_for_me);
        assert!(actions.can_delete_for_everyone);
    }

    #[test]
    fn test_available_actions_for_recipient_and_stale() {
        let now = Utc::now();
        let msg = message_from("alice", now - Duration::minutes(10));
        let actions = policy().available_actions(&msg, "bob", now);
        assert!(!actions.can_delete_for_everyone);
        assert!(actions.can_delete_for_me);

        let stale = message_from("alice", now - Duration::hours(2));
        let actions = policy().available_actions(&stale, "alice", now);
        assert!(!actions.can_delete_for_everyone);
    }

    #[test]
    fn test_available_actions_on_tombstone() {
        let now = Utc::now();
        let mut msg = message_from("alice", now - Duration::minutes(1));
        msg.deleted_for_everyone = true;
        let actions = policy().available_actions(&msg, "alice", now);
        assert!(!actions.can_copy);
        assert!(!actions.can_forward);
        assert!(!actions.can_delete_for_everyone);
        assert!(actions.can_delete_for_me);
    }
}
