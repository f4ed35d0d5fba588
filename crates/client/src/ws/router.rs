//! Routes inbound frames to the stores and sends chat messages.

use chatify_shared::{ClientFrame, Conversation, FrameError, Message, ServerFrame};
use futures_channel::mpsc::UnboundedReceiver;
use futures_util::StreamExt;

use super::manager::ConnectionManager;
use crate::notifications::NotificationCenter;
use crate::stores::{ConversationStore, MessageStore, PendingMessage, PresenceStore};

/// What a routed frame did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    ErrorShown,
    /// Appended to the visible history.
    MessageAppended(String),
    /// Belongs to another conversation; a notification was raised.
    MessageNotified(String),
    /// Belongs to a conversation missing from the list; no notification.
    MessageUnlisted(String),
    /// The pending send was found and removed.
    Acknowledged(String),
    /// No pending send matched the request id.
    UnmatchedAck(String),
    MessageDeleted(String),
    ConversationAdded(String),
    PresenceChanged(String),
    Ignored,
}

#[derive(Clone)]
pub struct EventRouter {
    messages: MessageStore,
    conversations: ConversationStore,
    presence: PresenceStore,
    notices: NotificationCenter,
    connection: ConnectionManager,
}

impl EventRouter {
    pub fn new(
        messages: MessageStore,
        conversations: ConversationStore,
        presence: PresenceStore,
        notices: NotificationCenter,
        connection: ConnectionManager,
    ) -> Self {
        Self {
            messages,
            conversations,
            presence,
            notices,
            connection,
        }
    }

    /// Process inbound frames in arrival order until the channel closes.
    pub async fn run(self, mut frames: UnboundedReceiver<String>) {
        while let Some(text) = frames.next().await {
            self.handle_text(&text);
        }
        crate::log_debug!("Inbound frame channel closed");
    }

    /// Decode and route one raw frame.
    pub fn handle_text(&self, text: &str) -> Dispatch {
        match ServerFrame::decode(text) {
            Ok(frame) => self.route(frame),
            Err(FrameError::UnknownType(kind)) => {
                crate::log_warn!("Ignoring frame with unknown type {:?}", kind);
                Dispatch::Ignored
            }
            Err(e @ FrameError::Malformed(_)) => {
                crate::log_error!("Dropping frame: {} ({})", e, text);
                Dispatch::Ignored
            }
        }
    }

    pub fn route(&self, frame: ServerFrame) -> Dispatch {
        match frame {
            ServerFrame::Err { message } => {
                crate::log_warn!("Server error frame: {}", message);
                self.notices.error(message);
                Dispatch::ErrorShown
            }
            ServerFrame::Msg { message, .. } => self.on_message(message),
            ServerFrame::Acknowledged { id, message } => {
                let Some(pending) = self.messages.remove_pending(&id) else {
                    crate::log_warn!("Acknowledgment for unknown request {}", id);
                    return Dispatch::UnmatchedAck(id);
                };
                crate::log_debug!(
                    "Request {} acknowledged as message {}",
                    pending.request_id,
                    message.id
                );
                if self.is_current(&message) {
                    self.messages.append(message.clone());
                }
                self.conversations.update_last_message(&message);
                Dispatch::Acknowledged(id)
            }
            ServerFrame::Delete { message_id } => {
                self.messages.remove(&message_id);
                Dispatch::MessageDeleted(message_id)
            }
            ServerFrame::Cnv {
                cnv_id,
                user,
                is_online,
            } => {
                let user_id = user.id.clone();
                self.conversations.append(Conversation::new(cnv_id.clone(), user));
                if is_online == Some(true) {
                    self.presence.add([user_id]);
                }
                Dispatch::ConversationAdded(cnv_id)
            }
            ServerFrame::Status { user_id, online } => {
                if online {
                    self.presence.add([user_id.clone()]);
                } else {
                    self.presence.remove(&user_id);
                }
                Dispatch::PresenceChanged(user_id)
            }
        }
    }

    /// Send `text` to the selected conversation.
    ///
    /// The pending entry is recorded whether or not the frame reaches the
    /// network. Returns the request id, or `None` when nothing is selected
    /// or the text is blank.
    pub fn send_message(&self, text: &str, image: Option<String>) -> Option<String> {
        let Some(conversation_id) = self.messages.conversation_id() else {
            crate::log_warn!("send_message without a selected conversation");
            return None;
        };
        let text = text.trim();
        if text.is_empty() && image.is_none() {
            crate::log_warn!("Refusing to send an empty message");
            return None;
        }

        let request_id = uuid::Uuid::new_v4().to_string();
        let frame = ClientFrame::Msg {
            id: request_id.clone(),
            conversation_id: conversation_id.clone(),
            message: text.to_string(),
            image: image.clone(),
        };
        if !self.connection.send(&frame) {
            crate::log_warn!(
                "Message {} kept pending; connection not open",
                frame.request_id()
            );
        }
        self.messages.add_pending(PendingMessage::new(
            request_id.clone(),
            conversation_id,
            text,
            image,
        ));
        Some(request_id)
    }

    fn on_message(&self, message: Message) -> Dispatch {
        let id = message.id.clone();
        let dispatch = if self.is_current(&message) {
            self.messages.append(message.clone());
            Dispatch::MessageAppended(id)
        } else if let Some(name) = self.conversations.sender_name(&message.conversation_id) {
            self.notices.notify(format!("New message from: {}", name));
            Dispatch::MessageNotified(id)
        } else {
            crate::log_debug!(
                "Message {} for unknown conversation {}",
                id,
                message.conversation_id
            );
            Dispatch::MessageUnlisted(id)
        };
        self.conversations.update_last_message(&message);
        dispatch
    }

    fn is_current(&self, message: &Message) -> bool {
        self.messages.conversation_id().as_deref() == Some(message.conversation_id.as_str())
    }
}
