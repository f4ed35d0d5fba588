//! Conversation store: every conversation visible to the session plus the
//! navigation selection.

use std::sync::Arc;

use chatify_shared::{Conversation, Message};
use parking_lot::RwLock;

use super::listeners::{Listeners, SubscriptionId};
use super::presence::PresenceStore;
use crate::api_client::ChatApi;
use crate::notifications::NotificationCenter;

/// Change notifications emitted by [`ConversationStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationChange {
    Loading,
    Loaded,
    Added(String),
    LastMessage(String),
    Selected(Option<String>),
}

/// Outcome of [`ConversationStore::fetch_snapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOutcome {
    Loaded(usize),
    /// The snapshot was already fetched for this session.
    AlreadyLoaded,
    Failed,
}

#[derive(Default)]
struct State {
    conversations: Vec<Conversation>,
    loading: bool,
    loaded: bool,
    /// Raw navigation parameter; may name a conversation not (yet) known.
    selected: Option<String>,
}

#[derive(Default)]
struct Inner {
    state: RwLock<State>,
    listeners: Listeners<ConversationChange>,
}

#[derive(Clone, Default)]
pub struct ConversationStore {
    inner: Arc<Inner>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the initial conversation list once per session.
    ///
    /// The optional `online` list bootstraps `presence`. On failure the list
    /// stays empty and an error notice is raised.
    pub async fn fetch_snapshot(
        &self,
        api: &dyn ChatApi,
        presence: &PresenceStore,
        notices: &NotificationCenter,
    ) -> SnapshotOutcome {
        {
            let mut state = self.inner.state.write();
            if state.loaded || state.loading {
                return SnapshotOutcome::AlreadyLoaded;
            }
            state.loading = true;
        }
        self.inner.listeners.notify(&ConversationChange::Loading);

        let outcome = match api.conversations().await {
            Ok(response) => {
                let conversations = response.conversations.unwrap_or_default();
                let count = conversations.len();
                self.inner.state.write().conversations = conversations;
                if let Some(online) = response.online {
                    presence.add(online);
                }
                crate::log_info!("Loaded {} conversations", count);
                SnapshotOutcome::Loaded(count)
            }
            Err(e) => {
                crate::log_error!("Failed to fetch conversations: {}", e);
                notices.error(e.user_message("Couldn't load conversations."));
                SnapshotOutcome::Failed
            }
        };

        {
            let mut state = self.inner.state.write();
            state.loading = false;
            state.loaded = true;
        }
        self.inner.listeners.notify(&ConversationChange::Loaded);
        outcome
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.read().loading
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.state.read().loaded
    }

    /// Prepend a newly created or announced conversation.
    ///
    /// Rejected (returns `false`) when a conversation with the same id or
    /// the same participant already exists.
    pub fn append(&self, conversation: Conversation) -> bool {
        let id = conversation.id.clone();
        {
            let mut state = self.inner.state.write();
            let duplicate = state.conversations.iter().any(|c| {
                c.id == conversation.id || c.participant.id == conversation.participant.id
            });
            if duplicate {
                crate::log_debug!("Ignoring duplicate conversation {}", id);
                return false;
            }
            state.conversations.insert(0, conversation);
        }
        self.inner.listeners.notify(&ConversationChange::Added(id));
        true
    }

    /// Replace the last-message summary of the message's conversation.
    /// Returns `false` if the conversation is unknown.
    pub fn update_last_message(&self, message: &Message) -> bool {
        let updated = {
            let mut state = self.inner.state.write();
            match state
                .conversations
                .iter_mut()
                .find(|c| c.id == message.conversation_id)
            {
                Some(conversation) => {
                    conversation.last_message = Some(message.clone());
                    true
                }
                None => false,
            }
        };
        if updated {
            self.inner
                .listeners
                .notify(&ConversationChange::LastMessage(message.conversation_id.clone()));
        }
        updated
    }

    /// Display name of the other participant, used to label notifications.
    pub fn sender_name(&self, conversation_id: &str) -> Option<String> {
        self.inner
            .state
            .read()
            .conversations
            .iter()
            .find(|c| c.id == conversation_id)
            .map(|c| c.participant.name.clone())
    }

    /// Existing conversation with the given participant, if any.
    pub fn find_by_participant(&self, participant_id: &str) -> Option<Conversation> {
        self.inner
            .state
            .read()
            .conversations
            .iter()
            .find(|c| c.participant.id == participant_id)
            .cloned()
    }

    pub fn get(&self, conversation_id: &str) -> Option<Conversation> {
        self.inner
            .state
            .read()
            .conversations
            .iter()
            .find(|c| c.id == conversation_id)
            .cloned()
    }

    /// Conversations ordered by recency: newest last message first,
    /// conversations without messages last.
    pub fn conversations(&self) -> Vec<Conversation> {
        let mut list = self.inner.state.read().conversations.clone();
        list.sort_by(|a, b| match (a.last_activity(), b.last_activity()) {
            (Some(a), Some(b)) => b.cmp(&a),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });
        list
    }

    pub fn len(&self) -> usize {
        self.inner.state.read().conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record the navigation selection.
    pub fn set_selected(&self, conversation_id: Option<String>) {
        {
            let mut state = self.inner.state.write();
            if state.selected == conversation_id {
                return;
            }
            state.selected = conversation_id.clone();
        }
        self.inner
            .listeners
            .notify(&ConversationChange::Selected(conversation_id));
    }

    /// The selected conversation, if the navigation parameter names a known one.
    pub fn selected(&self) -> Option<Conversation> {
        let state = self.inner.state.read();
        let id = state.selected.as_ref()?;
        state.conversations.iter().find(|c| &c.id == id).cloned()
    }

    pub fn selected_id(&self) -> Option<String> {
        self.selected().map(|c| c.id)
    }

    pub fn subscribe(
        &self,
        listener: impl Fn(&ConversationChange) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.inner.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.listeners.unsubscribe(id)
    }
}
