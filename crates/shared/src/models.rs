//! Shared data models for the chatify backend and client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Identity ---

/// The other side of a conversation, as delivered by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Participant {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub avatar: String,
}

// --- Messaging ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(rename = "_id")]
    pub id: String,
    pub sender: String,
    #[serde(default)]
    pub conversation_id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    #[serde(rename = "_id")]
    pub id: String,
    pub participant: Participant,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<Message>,
}

impl Conversation {
    pub fn new(id: impl Into<String>, participant: Participant) -> Self {
        Self {
            id: id.into(),
            participant,
            last_message: None,
        }
    }

    /// Creation time of the last message, if any.
    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.last_message.as_ref().map(|m| m.created_at)
    }
}

// --- REST bodies ---

/// Response of `GET /conversations`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationsResponse {
    #[serde(default)]
    pub conversations: Option<Vec<Conversation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub online: Option<Vec<String>>,
}

/// Response of `GET /messages/{conversationId}?page=N`.
///
/// Messages arrive most-recent-first. A missing (or `null`) list marks the
/// end of the history.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessagesPage {
    #[serde(default)]
    pub messages: Option<Vec<Message>>,
}

impl MessagesPage {
    /// The page in chronological order, or `None` when the backend has no
    /// further messages.
    pub fn into_chronological(self) -> Option<Vec<Message>> {
        match self.messages {
            Some(mut messages) if !messages.is_empty() => {
                messages.reverse();
                Some(messages)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateConversationRequest {
    #[serde(rename = "targetUserID")]
    pub target_user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateConversationResponse {
    #[serde(rename = "conversationID")]
    pub conversation_id: String,
    #[serde(default, rename = "isOnline")]
    pub is_online: bool,
}
