//! Websocket frame definitions for the chatify realtime protocol.
//!
//! Every frame is a single JSON object discriminated by its `type` field.

use serde::{Deserialize, Serialize};

use crate::error::FrameError;
use crate::models::{Message, Participant};

/// REST paths consumed by the client.
pub const PATH_CONVERSATIONS: &str = "/conversations";
pub const PATH_CONVERSATION: &str = "/conversation";
pub const PATH_MESSAGES: &str = "/messages";
pub const PATH_MESSAGE: &str = "/message";
pub const PATH_WS: &str = "/ws";

/// Frame sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum ClientFrame {
    #[serde(rename = "msg", rename_all = "camelCase")]
    Msg {
        /// Request correlation id, echoed back in `acknowledged`.
        id: String,
        conversation_id: String,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        image: Option<String>,
    },
}

impl ClientFrame {
    pub fn request_id(&self) -> &str {
        match self {
            ClientFrame::Msg { id, .. } => id,
        }
    }
}

/// Frame sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum ServerFrame {
    #[serde(rename = "err")]
    Err { message: String },
    #[serde(rename = "msg")]
    Msg {
        #[serde(default)]
        id: Option<String>,
        message: Message,
    },
    #[serde(rename = "acknowledged")]
    Acknowledged { id: String, message: Message },
    #[serde(rename = "delete", rename_all = "camelCase")]
    Delete { message_id: String },
    #[serde(rename = "status", rename_all = "camelCase")]
    Status { user_id: String, online: bool },
    #[serde(rename = "cnv", rename_all = "camelCase")]
    Cnv {
        cnv_id: String,
        user: Participant,
        #[serde(default)]
        is_online: Option<bool>,
    },
}

impl ServerFrame {
    /// Every `type` value this client knows how to route.
    pub const KINDS: [&'static str; 6] = ["err", "msg", "acknowledged", "delete", "status", "cnv"];

    pub fn kind(&self) -> &'static str {
        match self {
            ServerFrame::Err { .. } => "err",
            ServerFrame::Msg { .. } => "msg",
            ServerFrame::Acknowledged { .. } => "acknowledged",
            ServerFrame::Delete { .. } => "delete",
            ServerFrame::Status { .. } => "status",
            ServerFrame::Cnv { .. } => "cnv",
        }
    }

    /// Decode a text frame.
    ///
    /// Frames whose `type` is not one of [`ServerFrame::KINDS`] are reported as
    /// [`FrameError::UnknownType`] so callers can tell protocol drift apart
    /// from broken payloads.
    pub fn decode(text: &str) -> Result<Self, FrameError> {
        #[derive(Deserialize)]
        struct Peek {
            #[serde(rename = "type")]
            kind: Option<String>,
        }

        let peek: Peek =
            serde_json::from_str(text).map_err(|e| FrameError::Malformed(e.to_string()))?;
        let kind = peek
            .kind
            .ok_or_else(|| FrameError::Malformed("missing `type` field".to_string()))?;
        if !Self::KINDS.contains(&kind.as_str()) {
            return Err(FrameError::UnknownType(kind));
        }

        serde_json::from_str(text).map_err(|e| FrameError::Malformed(format!("{kind}: {e}")))
    }
}
