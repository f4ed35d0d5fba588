//! Chatify client: the realtime synchronization engine of the chat client.
//!
//! The engine keeps three stores (presence, conversations, messages)
//! consistent with the backend over one websocket per session, and sends
//! chat messages optimistically until the server acknowledges them.

#[macro_use]
pub mod logging;

pub mod api_client;
pub mod audio;
pub mod auth_session;
pub mod config;
pub mod notifications;
pub mod session;
pub mod storage;
pub mod stores;
pub mod ws;

pub use api_client::{ApiClient, ChatApi};
pub use auth_session::{AuthContext, AuthSession};
pub use config::ClientConfig;
pub use notifications::{Notice, NoticeLevel, NotificationCenter, NotificationPrefs};
pub use session::ChatSession;
pub use storage::Storage;
pub use ws::{ConnectionManager, ConnectionState, EventRouter, ReconnectConfig};
