//! One authenticated chat session.
//!
//! [`ChatSession`] builds the stores, the connection manager and the event
//! router once and wires them together. Consumers read state through the
//! store accessors and subscribe to their changes.

use std::sync::Arc;
use std::time::Duration;

use chatify_shared::{Conversation, Participant};
use chrono::Utc;
use futures_channel::mpsc::UnboundedReceiver;
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::api_client::{ApiClient, ChatApi};
use crate::auth_session::AuthContext;
use crate::config::ClientConfig;
use crate::notifications::NotificationCenter;
use crate::storage::Storage;
use crate::stores::{
    ConversationStore, HistoryOutcome, LoadMoreOutcome, MessageStore, PresenceStore,
    SnapshotOutcome,
};
use crate::ws::{
    ConnectionManager, ConnectionState, Connector, EventRouter, TungsteniteConnector,
};

pub struct ChatSession {
    config: ClientConfig,
    auth: AuthContext,
    api: Arc<dyn ChatApi>,
    presence: PresenceStore,
    conversations: ConversationStore,
    messages: MessageStore,
    notices: NotificationCenter,
    connection: ConnectionManager,
    router: EventRouter,
    inbound: Mutex<Option<UnboundedReceiver<String>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ChatSession {
    /// Session against the configured backend over real HTTP and websocket.
    pub fn new(config: ClientConfig, auth: AuthContext) -> Self {
        let api = ApiClient::new(auth.clone()).with_base_url(config.backend_url.clone());
        let storage = match &config.data_dir {
            Some(dir) => Storage::new(dir.clone()),
            None => Storage::platform_default(),
        };
        Self::with_parts(
            config,
            auth,
            Arc::new(api),
            Arc::new(TungsteniteConnector),
            storage,
        )
    }

    pub fn with_parts(
        config: ClientConfig,
        auth: AuthContext,
        api: Arc<dyn ChatApi>,
        connector: Arc<dyn Connector>,
        storage: Storage,
    ) -> Self {
        let notices = NotificationCenter::new(storage);
        let presence = PresenceStore::new();
        let conversations = ConversationStore::new();
        let messages = MessageStore::new(api.clone(), notices.clone());
        let (connection, inbound) = ConnectionManager::new(
            config.ws_url.clone(),
            auth.clone(),
            connector,
            config.reconnect.clone(),
        );
        let router = EventRouter::new(
            messages.clone(),
            conversations.clone(),
            presence.clone(),
            notices.clone(),
            connection.clone(),
        );

        let delay = connection.reconnect_config().delay;
        let state_notices = notices.clone();
        connection.subscribe(move |state| match state {
            ConnectionState::Reconnecting { attempt } => state_notices.warning(format!(
                "Connection has been lost. Reconnect #{} in {}",
                attempt,
                format_delay(delay)
            )),
            ConnectionState::Failed { .. } => state_notices.error(
                "Max reconnect attempts reached. Check your internet connection and reload the page.",
            ),
            _ => {}
        });

        Self {
            config,
            auth,
            api,
            presence,
            conversations,
            messages,
            notices,
            connection,
            router,
            inbound: Mutex::new(Some(inbound)),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Fetch the conversation snapshot, then start routing frames and open
    /// the connection. Must be called from within a tokio runtime.
    pub async fn start(&self) -> SnapshotOutcome {
        let outcome = self
            .conversations
            .fetch_snapshot(self.api.as_ref(), &self.presence, &self.notices)
            .await;

        if let Some(inbound) = self.inbound.lock().take() {
            let router = self.router.clone();
            self.tasks.lock().push(tokio::spawn(router.run(inbound)));
        }

        if let Some(timeout) = self.config.pending_timeout {
            self.spawn_pending_sweeper(timeout);
        }

        self.connection.connect();
        outcome
    }

    /// Navigate to a conversation (or to none) and load its latest page.
    /// Selecting the current conversation again reloads it.
    pub async fn select_conversation(&self, conversation_id: Option<String>) -> HistoryOutcome {
        self.conversations.set_selected(conversation_id.clone());
        self.messages.select(conversation_id).await
    }

    pub async fn load_more(&self, page: u32) -> LoadMoreOutcome {
        self.messages.load_more(page).await
    }

    /// Send a chat message to the selected conversation. Returns the
    /// request id of the pending entry.
    pub fn send_message(&self, text: &str, image: Option<String>) -> Option<String> {
        self.router.send_message(text, image)
    }

    /// Open a conversation with `participant`, reusing an existing one.
    pub async fn create_conversation(&self, participant: Participant) -> Option<String> {
        if let Some(existing) = self.conversations.find_by_participant(&participant.id) {
            crate::log_debug!(
                "Conversation with {} already exists: {}",
                participant.id,
                existing.id
            );
            return Some(existing.id);
        }

        match self.api.create_conversation(&participant.id).await {
            Ok(created) => {
                let participant_id = participant.id.clone();
                self.conversations
                    .append(Conversation::new(created.conversation_id.clone(), participant));
                if created.is_online {
                    self.presence.add([participant_id]);
                }
                crate::log_info!("Created conversation {}", created.conversation_id);
                Some(created.conversation_id)
            }
            Err(e) => {
                crate::log_error!("Failed to create conversation with {}: {}", participant.id, e);
                self.notices
                    .error(e.user_message("Couldn't create conversation."));
                None
            }
        }
    }

    /// Delete a message on the server, then locally.
    pub async fn delete_message(&self, message_id: &str) -> bool {
        match self.api.delete_message(message_id).await {
            Ok(()) => {
                self.messages.remove(message_id);
                self.notices.success("Message deleted successfully.");
                true
            }
            Err(e) => {
                crate::log_error!("Failed to delete message {}: {}", message_id, e);
                self.notices.error(e.user_message("Couldn't delete message."));
                false
            }
        }
    }

    /// Mark sends older than the pending timeout as failed.
    pub fn sweep_pending(&self) -> Vec<String> {
        let Some(timeout) = self.config.pending_timeout else {
            return Vec::new();
        };
        sweep(&self.messages, &self.notices, timeout)
    }

    /// End the session. The connection is closed for good.
    pub fn logout(&self) {
        self.connection.disconnect();
        self.auth.logout();
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        self.presence.clear();
        crate::log_info!("Session ended");
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn auth(&self) -> &AuthContext {
        &self.auth
    }

    pub fn presence(&self) -> &PresenceStore {
        &self.presence
    }

    pub fn conversations(&self) -> &ConversationStore {
        &self.conversations
    }

    pub fn messages(&self) -> &MessageStore {
        &self.messages
    }

    pub fn notices(&self) -> &NotificationCenter {
        &self.notices
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn router(&self) -> &EventRouter {
        &self.router
    }

    fn spawn_pending_sweeper(&self, timeout: Duration) {
        let messages = self.messages.clone();
        let notices = self.notices.clone();
        let period = (timeout / 4).max(Duration::from_millis(250));
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                sweep(&messages, &notices, timeout);
            }
        });
        self.tasks.lock().push(task);
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.connection.disconnect();
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }
}

fn sweep(messages: &MessageStore, notices: &NotificationCenter, timeout: Duration) -> Vec<String> {
    let timeout = match chrono::Duration::from_std(timeout) {
        Ok(timeout) => timeout,
        Err(e) => {
            crate::log_error!("Pending timeout out of range: {}", e);
            return Vec::new();
        }
    };
    let expired = messages.expire_pending(timeout, Utc::now());
    if !expired.is_empty() {
        crate::log_warn!("{} message(s) not acknowledged in time", expired.len());
        notices.warning(if expired.len() == 1 {
            "A message could not be delivered.".to_string()
        } else {
            format!("{} messages could not be delivered.", expired.len())
        });
    }
    expired
}

fn format_delay(delay: Duration) -> String {
    if delay.subsec_millis() == 0 {
        format!("{}s", delay.as_secs())
    } else {
        format!("{}ms", delay.as_millis())
    }
}
