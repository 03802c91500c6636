//! Error types for the core library.

use thiserror::Error;

/// The logical remote write that failed.
///
/// Carried inside [`Error::Write`] so the caller knows which action to retry.
/// Writes are never retried in a tight loop; the next natural trigger (next
/// snapshot, next open, next user action) retries them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteAction {
    /// Appending a new message to the conversation log.
    Send,
    /// Updating a message's deletion fields.
    Deletion,
    /// Writing the typing heartbeat into the conversation document.
    Typing,
    /// Committing a read-receipt batch.
    ReadReceipts,
    /// Updating the conversation summary / last-viewed fields.
    Summary,
}

impl WriteAction {
    /// Human-readable name for log and error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteAction::Send => "send",
            WriteAction::Deletion => "deletion",
            WriteAction::Typing => "typing heartbeat",
            WriteAction::ReadReceipts => "read-receipt batch",
            WriteAction::Summary => "summary update",
        }
    }
}

impl std::fmt::Display for WriteAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected message-deletion request.
///
/// Raised before any remote write is attempted. An out-of-window
/// "delete for everyone" fails with [`PolicyViolation::WindowExpired`]
/// rather than silently degrading to "delete for me".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyViolation {
    /// Only the message's sender may delete it for everyone.
    #[error("only the sender can delete a message for everyone")]
    NotSender,

    /// The delete-for-everyone window has closed.
    #[error("delete for everyone is only available for {window_secs}s after sending")]
    WindowExpired {
        /// Length of the window that has elapsed.
        window_secs: i64,
    },
}

/// Main error type for the core library.
#[derive(Error, Debug)]
pub enum Error {
    /// A remote write failed. Recoverable; retried on the next natural trigger.
    #[error("{action} failed: {reason}")]
    Write {
        /// Which logical write failed.
        action: WriteAction,
        /// Backend-supplied failure description.
        reason: String,
    },

    /// A deletion request was rejected by policy before any write.
    #[error("policy violation: {0}")]
    Policy(#[from] PolicyViolation),

    /// A subscription errored or closed. Fatal to the conversation view;
    /// the lifecycle owner must re-open the conversation.
    #[error("subscription failed: {0}")]
    Subscription(String),

    /// A malformed local request (oversized body, unknown message id).
    #[error("validation error: {0}")]
    Validation(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Shorthand for a transient write failure.
    pub fn write(action: WriteAction, reason: impl Into<String>) -> Self {
        Error::Write {
            action,
            reason: reason.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}
