//! Message store for the selected conversation.
//!
//! Holds the chronological history of exactly one conversation at a time and
//! the optimistic sends that are still waiting for an acknowledgment.
//!
//! Every selection bumps an epoch. History requests remember the epoch they
//! were issued under and their result is dropped if the selection changed
//! while they were in flight.

use std::sync::Arc;

use chatify_shared::Message;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;

use super::listeners::{Listeners, SubscriptionId};
use crate::api_client::ChatApi;
use crate::notifications::NotificationCenter;

/// Delivery status of an optimistic send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingStatus {
    Sending,
    /// No acknowledgment arrived within the pending timeout.
    Failed,
}

/// A sent message not yet acknowledged by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMessage {
    pub request_id: String,
    pub conversation_id: String,
    pub text: String,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub status: PendingStatus,
}

impl PendingMessage {
    pub fn new(
        request_id: impl Into<String>,
        conversation_id: impl Into<String>,
        text: impl Into<String>,
        image: Option<String>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            conversation_id: conversation_id.into(),
            text: text.into(),
            image,
            created_at: Utc::now(),
            status: PendingStatus::Sending,
        }
    }
}

/// Change notifications emitted by [`MessageStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageChange {
    /// History was cleared for a new selection.
    Reset(Option<String>),
    HistoryLoaded(usize),
    Prepended(usize),
    Appended(String),
    Removed(String),
    PendingAdded(String),
    PendingRemoved(String),
    PendingFailed(Vec<String>),
}

/// Outcome of [`MessageStore::select`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryOutcome {
    Loaded(usize),
    /// No conversation selected; history is empty.
    Cleared,
    /// The selection changed while the request was in flight.
    Stale,
    Failed,
}

/// Outcome of [`MessageStore::load_more`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMoreOutcome {
    Loaded(usize),
    /// The backend has no messages for that page.
    NoMore,
    /// The first page or another page is still being fetched for this
    /// selection.
    AlreadyLoading,
    NoConversation,
    InvalidPage,
    Stale,
    Failed,
}

#[derive(Default)]
struct State {
    conversation_id: Option<String>,
    epoch: u64,
    messages: Vec<Message>,
    pending: Vec<PendingMessage>,
    loading: bool,
    loading_more: bool,
}

struct Inner {
    state: RwLock<State>,
    api: Arc<dyn ChatApi>,
    notices: NotificationCenter,
    listeners: Listeners<MessageChange>,
}

#[derive(Clone)]
pub struct MessageStore {
    inner: Arc<Inner>,
}

impl MessageStore {
    pub fn new(api: Arc<dyn ChatApi>, notices: NotificationCenter) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(State::default()),
                api,
                notices,
                listeners: Listeners::default(),
            }),
        }
    }

    /// Switch to `conversation_id` and fetch its first history page.
    ///
    /// Messages that arrive live while the page is loading are kept after
    /// the fetched history unless the page already contains them.
    pub async fn select(&self, conversation_id: Option<String>) -> HistoryOutcome {
        let epoch = {
            let mut state = self.inner.state.write();
            state.epoch += 1;
            state.conversation_id = conversation_id.clone();
            state.messages.clear();
            state.loading = conversation_id.is_some();
            state.loading_more = false;
            state.epoch
        };
        self.inner
            .listeners
            .notify(&MessageChange::Reset(conversation_id.clone()));

        let Some(conversation_id) = conversation_id else {
            return HistoryOutcome::Cleared;
        };

        let result = self.inner.api.messages(&conversation_id, 1).await;

        let outcome = {
            let mut state = self.inner.state.write();
            if state.epoch != epoch {
                crate::log_debug!(
                    "Discarding stale history for {} (epoch {} != {})",
                    conversation_id,
                    epoch,
                    state.epoch
                );
                return HistoryOutcome::Stale;
            }
            state.loading = false;

            match result {
                Ok(page) => {
                    let mut history = page.into_chronological().unwrap_or_default();
                    let live = std::mem::take(&mut state.messages);
                    for message in live {
                        if !history.iter().any(|m| m.id == message.id) {
                            history.push(message);
                        }
                    }
                    let count = history.len();
                    state.messages = history;
                    Ok(count)
                }
                Err(e) => {
                    state.messages.clear();
                    Err(e)
                }
            }
        };

        match outcome {
            Ok(count) => {
                self.inner
                    .listeners
                    .notify(&MessageChange::HistoryLoaded(count));
                HistoryOutcome::Loaded(count)
            }
            Err(e) => {
                crate::log_error!("Failed to fetch messages for {}: {}", conversation_id, e);
                self.inner
                    .notices
                    .error(e.user_message("Couldn't load messages."));
                self.inner.listeners.notify(&MessageChange::HistoryLoaded(0));
                HistoryOutcome::Failed
            }
        }
    }

    /// Fetch an older page and prepend it.
    ///
    /// Pages start at 1. Only one page request per selection is in flight
    /// at a time, and none while the first page is loading.
    pub async fn load_more(&self, page: u32) -> LoadMoreOutcome {
        if page == 0 {
            return LoadMoreOutcome::InvalidPage;
        }

        let (conversation_id, epoch) = {
            let mut state = self.inner.state.write();
            let Some(conversation_id) = state.conversation_id.clone() else {
                return LoadMoreOutcome::NoConversation;
            };
            if state.loading || state.loading_more {
                crate::log_debug!("Page request already in flight for {}", conversation_id);
                return LoadMoreOutcome::AlreadyLoading;
            }
            state.loading_more = true;
            (conversation_id, state.epoch)
        };

        let result = self.inner.api.messages(&conversation_id, page).await;

        let prepended = {
            let mut state = self.inner.state.write();
            if state.epoch != epoch {
                crate::log_debug!("Discarding stale page {} for {}", page, conversation_id);
                return LoadMoreOutcome::Stale;
            }
            state.loading_more = false;

            match result {
                Ok(body) => match body.into_chronological() {
                    Some(mut older) => {
                        let count = older.len();
                        older.append(&mut state.messages);
                        state.messages = older;
                        Ok(Some(count))
                    }
                    None => Ok(None),
                },
                Err(e) => Err(e),
            }
        };

        match prepended {
            Ok(Some(count)) => {
                self.inner.listeners.notify(&MessageChange::Prepended(count));
                LoadMoreOutcome::Loaded(count)
            }
            Ok(None) => {
                self.inner.notices.info("No more messages to load.");
                LoadMoreOutcome::NoMore
            }
            Err(e) => {
                crate::log_error!("Failed to load page {} for {}: {}", page, conversation_id, e);
                self.inner
                    .notices
                    .error(e.user_message("Couldn't load older messages."));
                LoadMoreOutcome::Failed
            }
        }
    }

    /// Append a message to the end of the history.
    pub fn append(&self, message: Message) {
        let id = message.id.clone();
        self.inner.state.write().messages.push(message);
        self.inner.listeners.notify(&MessageChange::Appended(id));
    }

    /// Remove a message by id. Returns `false` if it was not present.
    pub fn remove(&self, message_id: &str) -> bool {
        let removed = {
            let mut state = self.inner.state.write();
            let before = state.messages.len();
            state.messages.retain(|m| m.id != message_id);
            state.messages.len() != before
        };
        if removed {
            self.inner
                .listeners
                .notify(&MessageChange::Removed(message_id.to_string()));
        }
        removed
    }

    /// Record an optimistic send. A second entry with the same request id
    /// is ignored.
    pub fn add_pending(&self, pending: PendingMessage) -> bool {
        let request_id = pending.request_id.clone();
        {
            let mut state = self.inner.state.write();
            if state.pending.iter().any(|p| p.request_id == request_id) {
                crate::log_warn!("Duplicate pending request id {}", request_id);
                return false;
            }
            state.pending.push(pending);
        }
        self.inner
            .listeners
            .notify(&MessageChange::PendingAdded(request_id));
        true
    }

    /// Remove the pending entry for `request_id`, returning it.
    pub fn remove_pending(&self, request_id: &str) -> Option<PendingMessage> {
        let removed = {
            let mut state = self.inner.state.write();
            let index = state.pending.iter().position(|p| p.request_id == request_id)?;
            state.pending.remove(index)
        };
        self.inner
            .listeners
            .notify(&MessageChange::PendingRemoved(request_id.to_string()));
        Some(removed)
    }

    /// Mark sends older than `timeout` as failed. Returns the affected
    /// request ids.
    pub fn expire_pending(&self, timeout: Duration, now: DateTime<Utc>) -> Vec<String> {
        let expired: Vec<String> = {
            let mut state = self.inner.state.write();
            state
                .pending
                .iter_mut()
                .filter(|p| p.status == PendingStatus::Sending && now - p.created_at >= timeout)
                .map(|p| {
                    p.status = PendingStatus::Failed;
                    p.request_id.clone()
                })
                .collect()
        };
        if !expired.is_empty() {
            self.inner
                .listeners
                .notify(&MessageChange::PendingFailed(expired.clone()));
        }
        expired
    }

    /// Conversation whose history is held.
    pub fn conversation_id(&self) -> Option<String> {
        self.inner.state.read().conversation_id.clone()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.inner.state.read().messages.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.state.read().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pending sends for the held conversation, oldest first.
    pub fn pending(&self) -> Vec<PendingMessage> {
        let state = self.inner.state.read();
        state
            .pending
            .iter()
            .filter(|p| Some(&p.conversation_id) == state.conversation_id.as_ref())
            .cloned()
            .collect()
    }

    /// Pending sends across all conversations.
    pub fn all_pending(&self) -> Vec<PendingMessage> {
        self.inner.state.read().pending.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.read().loading
    }

    pub fn is_loading_more(&self) -> bool {
        self.inner.state.read().loading_more
    }

    pub fn subscribe(
        &self,
        listener: impl Fn(&MessageChange) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.inner.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.listeners.unsubscribe(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chatify_shared::{ApiError, ConversationsResponse, CreateConversationResponse, MessagesPage};
    use chrono::TimeZone;

    use crate::storage::Storage;

    struct Offline;

    #[async_trait]
    impl ChatApi for Offline {
        async fn conversations(&self) -> Result<ConversationsResponse, ApiError> {
            Err(ApiError::Network("offline".into()))
        }
        async fn messages(&self, _: &str, _: u32) -> Result<MessagesPage, ApiError> {
            Err(ApiError::Network("offline".into()))
        }
        async fn create_conversation(&self, _: &str) -> Result<CreateConversationResponse, ApiError> {
            Err(ApiError::Network("offline".into()))
        }
        async fn delete_message(&self, _: &str) -> Result<(), ApiError> {
            Err(ApiError::Network("offline".into()))
        }
    }

    fn store() -> (MessageStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let notices = NotificationCenter::new(Storage::new(dir.path()));
        (MessageStore::new(Arc::new(Offline), notices), dir)
    }

    fn message(id: &str) -> Message {
        Message {
            id: id.into(),
            sender: "u2".into(),
            conversation_id: "c1".into(),
            text: id.into(),
            image: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn append_and_remove() {
        let (store, _dir) = store();
        store.append(message("m1"));
        store.append(message("m2"));
        assert!(store.remove("m1"));
        assert!(!store.remove("m1"));
        let ids: Vec<_> = store.messages().into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec!["m2"]);
    }

    #[test]
    fn pending_is_removed_exactly_once() {
        let (store, _dir) = store();
        assert!(store.add_pending(PendingMessage::new("r1", "c1", "hi", None)));
        assert!(!store.add_pending(PendingMessage::new("r1", "c1", "again", None)));
        assert!(store.add_pending(PendingMessage::new("r2", "c1", "there", None)));

        assert_eq!(store.remove_pending("r1").map(|p| p.text).as_deref(), Some("hi"));
        assert!(store.remove_pending("r1").is_none());
        assert_eq!(store.all_pending().len(), 1);
    }

    #[test]
    fn expiry_marks_only_stale_sends() {
        let (store, _dir) = store();
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();

        let mut old = PendingMessage::new("old", "c1", "a", None);
        old.created_at = base;
        let mut fresh = PendingMessage::new("fresh", "c1", "b", None);
        fresh.created_at = base + Duration::seconds(25);
        store.add_pending(old);
        store.add_pending(fresh);

        let now = base + Duration::seconds(30);
        assert_eq!(store.expire_pending(Duration::seconds(30), now), vec!["old"]);
        assert!(store.expire_pending(Duration::seconds(30), now).is_empty());

        let statuses: Vec<_> = store.all_pending().into_iter().map(|p| p.status).collect();
        assert_eq!(statuses, vec![PendingStatus::Failed, PendingStatus::Sending]);
    }

    #[tokio::test]
    async fn failed_history_fetch_leaves_empty_list() {
        let (store, _dir) = store();
        store.append(message("live"));
        assert_eq!(store.select(Some("c1".into())).await, HistoryOutcome::Failed);
        assert!(store.is_empty());
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn load_more_rejects_page_zero_and_missing_selection() {
        let (store, _dir) = store();
        assert_eq!(store.load_more(0).await, LoadMoreOutcome::InvalidPage);
        assert_eq!(store.load_more(2).await, LoadMoreOutcome::NoConversation);
    }
}
