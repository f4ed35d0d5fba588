//! State stores kept consistent by the event router.
//!
//! Each store owns its collection exclusively and exposes a `subscribe`
//! operation; listeners run synchronously after every mutation.

pub mod conversations;
pub mod listeners;
pub mod messages;
pub mod presence;

pub use conversations::{ConversationChange, ConversationStore, SnapshotOutcome};
pub use listeners::{Listeners, SubscriptionId};
pub use messages::{
    HistoryOutcome, LoadMoreOutcome, MessageChange, MessageStore, PendingMessage, PendingStatus,
};
pub use presence::{PresenceChange, PresenceStore};
