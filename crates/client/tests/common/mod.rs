//! In-memory backend and websocket fakes shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chatify_client::ws::{Connector, Transport, TransportError};
use chatify_client::{
    AuthContext, AuthSession, ChatApi, ChatSession, ClientConfig, Notice, NoticeLevel,
    ReconnectConfig, Storage,
};
use chatify_shared::{
    ApiError, Conversation, ConversationsResponse, CreateConversationResponse, Message,
    MessagesPage, Participant, ServerFrame,
};
use chrono::{TimeZone, Utc};
use futures_channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tempfile::TempDir;

pub fn participant(id: &str, name: &str) -> Participant {
    Participant {
        id: id.into(),
        name: name.into(),
        email: None,
        avatar: String::new(),
    }
}

/// A message created `minute` minutes after a fixed instant.
pub fn message(id: &str, conversation_id: &str, minute: u32) -> Message {
    Message {
        id: id.into(),
        sender: "u2".into(),
        conversation_id: conversation_id.into(),
        text: format!("text of {id}"),
        image: None,
        created_at: Utc.with_ymd_and_hms(2024, 5, 1, 10, minute, 0).unwrap(),
    }
}

/// Backend page: most recent first.
pub fn page(messages: &[Message]) -> MessagesPage {
    let mut messages = messages.to_vec();
    messages.reverse();
    MessagesPage {
        messages: Some(messages),
    }
}

pub fn ids(messages: &[Message]) -> Vec<String> {
    messages.iter().map(|m| m.id.clone()).collect()
}

pub fn frame(frame: &ServerFrame) -> String {
    serde_json::to_string(frame).unwrap()
}

/// Scripted REST backend.
#[derive(Default)]
pub struct FakeApi {
    pub conversations: Mutex<Option<Result<ConversationsResponse, ApiError>>>,
    pub pages: Mutex<HashMap<(String, u32), MessagesPage>>,
    /// Artificial latency per conversation id.
    pub delays: Mutex<HashMap<String, Duration>>,
    pub create: Mutex<Option<Result<CreateConversationResponse, ApiError>>>,
    pub delete_error: Mutex<Option<ApiError>>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeApi {
    pub fn with_conversations(conversations: Vec<Conversation>, online: Option<Vec<&str>>) -> Self {
        let api = Self::default();
        *api.conversations.lock() = Some(Ok(ConversationsResponse {
            conversations: Some(conversations),
            online: online.map(|ids| ids.into_iter().map(String::from).collect()),
        }));
        api
    }

    pub fn set_page(&self, conversation_id: &str, number: u32, messages: &[Message]) {
        self.pages
            .lock()
            .insert((conversation_id.to_string(), number), page(messages));
    }

    pub fn set_delay(&self, conversation_id: &str, delay: Duration) {
        self.delays.lock().insert(conversation_id.to_string(), delay);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ChatApi for FakeApi {
    async fn conversations(&self) -> Result<ConversationsResponse, ApiError> {
        self.calls.lock().push("GET /conversations".into());
        self.conversations
            .lock()
            .clone()
            .unwrap_or(Ok(ConversationsResponse {
                conversations: None,
                online: None,
            }))
    }

    async fn messages(&self, conversation_id: &str, page: u32) -> Result<MessagesPage, ApiError> {
        self.calls
            .lock()
            .push(format!("GET /messages/{conversation_id}?page={page}"));
        let delay = self.delays.lock().get(conversation_id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self
            .pages
            .lock()
            .get(&(conversation_id.to_string(), page))
            .cloned()
            .unwrap_or(MessagesPage { messages: None }))
    }

    async fn create_conversation(
        &self,
        target_user_id: &str,
    ) -> Result<CreateConversationResponse, ApiError> {
        self.calls
            .lock()
            .push(format!("POST /conversation {target_user_id}"));
        self.create
            .lock()
            .clone()
            .unwrap_or_else(|| Err(ApiError::Network("no script".into())))
    }

    async fn delete_message(&self, message_id: &str) -> Result<(), ApiError> {
        self.calls.lock().push(format!("DELETE /message/{message_id}"));
        match self.delete_error.lock().clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Server side of one accepted fake connection.
pub struct ServerSide {
    pub to_client: UnboundedSender<Result<String, TransportError>>,
    pub from_client: UnboundedReceiver<String>,
}

impl ServerSide {
    pub fn push(&self, server_frame: &ServerFrame) {
        self.to_client.unbounded_send(Ok(frame(server_frame))).unwrap();
    }

    pub fn push_raw(&self, text: &str) {
        self.to_client.unbounded_send(Ok(text.to_string())).unwrap();
    }

    /// Next outbound frame from the client, as JSON.
    pub async fn next_sent(&mut self) -> serde_json::Value {
        let text = self.from_client.next().await.expect("client closed");
        serde_json::from_str(&text).unwrap()
    }
}

/// Connector that accepts or refuses handshakes from a script; once the
/// script is exhausted every handshake is refused.
pub struct FakeConnector {
    script: Mutex<VecDeque<bool>>,
    urls: Mutex<Vec<String>>,
    accepted: UnboundedSender<ServerSide>,
}

impl FakeConnector {
    pub fn new(script: impl IntoIterator<Item = bool>) -> (Self, UnboundedReceiver<ServerSide>) {
        let (accepted, servers) = unbounded();
        let connector = Self {
            script: Mutex::new(script.into_iter().collect()),
            urls: Mutex::new(Vec::new()),
            accepted,
        };
        (connector, servers)
    }

    pub fn push_script(&self, accept: bool) {
        self.script.lock().push_back(accept);
    }

    pub fn attempts(&self) -> usize {
        self.urls.lock().len()
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().clone()
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, url: &str) -> Result<Transport, TransportError> {
        self.urls.lock().push(url.to_string());
        if !self.script.lock().pop_front().unwrap_or(false) {
            return Err(TransportError::Handshake("connection refused".into()));
        }

        let (to_client, client_stream) = unbounded();
        let (client_sink, from_client) = unbounded::<String>();
        let _ = self.accepted.unbounded_send(ServerSide {
            to_client,
            from_client,
        });
        Ok(Transport {
            sink: Box::pin(client_sink.sink_map_err(|e| TransportError::Io(e.to_string()))),
            stream: Box::pin(client_stream),
        })
    }
}

pub fn config(dir: &TempDir) -> ClientConfig {
    ClientConfig {
        backend_url: "http://backend.test".into(),
        ws_url: "ws://backend.test/ws".into(),
        reconnect: ReconnectConfig::default(),
        pending_timeout: None,
        data_dir: Some(dir.path().to_path_buf()),
    }
}

pub fn signed_in() -> AuthContext {
    AuthContext::new(Some(AuthSession::new("u1", "secret-token")))
}

/// A session over fakes, with every notice recorded.
pub struct Harness {
    pub session: ChatSession,
    pub api: Arc<FakeApi>,
    pub connector: Arc<FakeConnector>,
    pub servers: UnboundedReceiver<ServerSide>,
    pub notices: Arc<Mutex<Vec<Notice>>>,
    pub dir: TempDir,
}

impl Harness {
    pub fn new(api: FakeApi, script: impl IntoIterator<Item = bool>) -> Self {
        Self::build(api, script, signed_in(), |_| {})
    }

    pub fn build(
        api: FakeApi,
        script: impl IntoIterator<Item = bool>,
        auth: AuthContext,
        tweak: impl FnOnce(&mut ClientConfig),
    ) -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = config(&dir);
        tweak(&mut config);

        let api = Arc::new(api);
        let (connector, servers) = FakeConnector::new(script);
        let connector = Arc::new(connector);
        let session = ChatSession::with_parts(
            config,
            auth,
            api.clone(),
            connector.clone(),
            Storage::new(dir.path()),
        );
        session.notices().set_values(None, Some(false));

        let notices = Arc::new(Mutex::new(Vec::new()));
        let sink = notices.clone();
        session
            .notices()
            .subscribe(move |notice: &Notice| sink.lock().push(notice.clone()));

        Self {
            session,
            api,
            connector,
            servers,
            notices,
            dir,
        }
    }

    /// Start the session and wait for the first accepted connection.
    pub async fn start_connected(&mut self) -> ServerSide {
        self.session.start().await;
        self.servers.next().await.expect("no connection accepted")
    }

    pub fn notices_at(&self, level: NoticeLevel) -> Vec<String> {
        self.notices
            .lock()
            .iter()
            .filter(|n| n.level == level)
            .map(|n| n.text.clone())
            .collect()
    }
}

/// Let every spawned task run until it is idle. Relies on the paused clock
/// auto-advancing only once nothing else is runnable.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
