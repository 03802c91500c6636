//! One-to-one conversation model: message projection, deletion policy,
//! typing presence, read receipts and the sync engine that ties them to a
//! backend.

pub mod attachment;
pub mod deletion;
pub mod engine;
pub mod presence;
pub mod receipts;
pub mod store;
pub mod types;

pub use attachment::{format_file_size, Attachment, AttachmentAction, AttachmentActionKind};
pub use deletion::{DeleteScope, DeletionPolicy, MessageActions};
pub use engine::{ChatSnapshot, SyncEngine};
pub use presence::{PresenceTracker, TypingSignal};
pub use receipts::ReadReceiptBatcher;
pub use store::{date_headers, format_date_header, MessageStore, VisibleMessage};
pub use types::{
    Conversation, ConversationId, Message, MessageDraft, MessageId, PeerPresence, UserProfile,
};
