//! HTTP API client with bearer authentication.

use async_trait::async_trait;
use chatify_shared::{
    ApiError, ConversationsResponse, CreateConversationRequest, CreateConversationResponse,
    MessagesPage, PATH_CONVERSATION, PATH_CONVERSATIONS, PATH_MESSAGE, PATH_MESSAGES,
};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::auth_session::AuthContext;

/// REST endpoints the synchronization engine depends on.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// `GET /conversations`
    async fn conversations(&self) -> Result<ConversationsResponse, ApiError>;

    /// `GET /messages/{conversation_id}?page={page}`
    async fn messages(&self, conversation_id: &str, page: u32) -> Result<MessagesPage, ApiError>;

    /// `POST /conversation`
    async fn create_conversation(
        &self,
        target_user_id: &str,
    ) -> Result<CreateConversationResponse, ApiError>;

    /// `DELETE /message/{message_id}`
    async fn delete_message(&self, message_id: &str) -> Result<(), ApiError>;
}

/// HTTP client for the chatify backend.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    auth: AuthContext,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(auth: AuthContext) -> Self {
        Self {
            client: Client::new(),
            base_url: String::new(),
            auth,
        }
    }

    /// Set the base URL for API requests
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        if self.base_url.is_empty() {
            if path.starts_with('/') {
                path.to_string()
            } else {
                format!("/{path}")
            }
        } else {
            let base = self.base_url.trim_end_matches('/');
            let path = path.trim_start_matches('/');
            format!("{base}/{path}")
        }
    }

    fn authorize(&self, rb: RequestBuilder) -> RequestBuilder {
        match self.auth.token() {
            Some(token) => rb.bearer_auth(token),
            None => rb,
        }
    }

    async fn read_body(rb: RequestBuilder) -> Result<String, ApiError> {
        let resp = rb.send().await.map_err(|e| ApiError::Network(e.to_string()))?;

        let status = resp.status().as_u16();
        let is_success = resp.status().is_success();
        let text = resp
            .text()
            .await
            .map_err(|e| ApiError::Network(format!("failed to read body: {e}")))?;

        if !is_success {
            return Err(ApiError::Http { status, body: text });
        }
        Ok(text)
    }

    fn decode<TRes: DeserializeOwned>(text: &str) -> Result<TRes, ApiError> {
        let text = if text.is_empty() { "null" } else { text };
        serde_json::from_str(text).map_err(|e| ApiError::Deserialize(e.to_string()))
    }

    /// Make an authorized GET request
    pub async fn get_json<TRes: DeserializeOwned>(&self, path: &str) -> Result<TRes, ApiError> {
        let rb = self.authorize(self.client.get(self.url(path)));
        let text = Self::read_body(rb).await?;
        Self::decode(&text)
    }

    /// Make an authorized POST request with JSON body
    pub async fn post_json<TReq: Serialize, TRes: DeserializeOwned>(
        &self,
        path: &str,
        body: &TReq,
    ) -> Result<TRes, ApiError> {
        let rb = self.authorize(self.client.post(self.url(path))).json(body);
        let text = Self::read_body(rb).await?;
        Self::decode(&text)
    }

    /// Make an authorized DELETE request
    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        let rb = self.authorize(self.client.delete(self.url(path)));
        Self::read_body(rb).await.map(|_| ())
    }
}

#[async_trait]
impl ChatApi for ApiClient {
    async fn conversations(&self) -> Result<ConversationsResponse, ApiError> {
        self.get_json(PATH_CONVERSATIONS).await
    }

    async fn messages(&self, conversation_id: &str, page: u32) -> Result<MessagesPage, ApiError> {
        let path = format!(
            "{}/{}?page={}",
            PATH_MESSAGES,
            urlencoding::encode(conversation_id),
            page
        );
        self.get_json(&path).await
    }

    async fn create_conversation(
        &self,
        target_user_id: &str,
    ) -> Result<CreateConversationResponse, ApiError> {
        let body = CreateConversationRequest {
            target_user_id: target_user_id.to_string(),
        };
        self.post_json(PATH_CONVERSATION, &body).await
    }

    async fn delete_message(&self, message_id: &str) -> Result<(), ApiError> {
        let path = format!("{}/{}", PATH_MESSAGE, urlencoding::encode(message_id));
        self.delete(&path).await
    }
}
