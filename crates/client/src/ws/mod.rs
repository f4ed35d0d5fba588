//! WebSocket module for real-time synchronization.
//!
//! This module provides:
//! - A single connection per session with fixed-delay auto-reconnect
//! - Routing of inbound frames into the stores
//! - The optimistic "send chat message" operation
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 ConnectionManager                   │
//! │   (owns the transport and the reconnect timer)      │
//! └─────────────────────────────────────────────────────┘
//!            │ inbound text frames        ▲ send(frame)
//!            ▼                            │
//! ┌─────────────────────────────────────────────────────┐
//! │                    EventRouter                      │
//! │      (one dispatch action per frame, in order)      │
//! └─────────────────────────────────────────────────────┘
//!                         │
//!          ┌──────────────┼──────────────┐
//!          ▼              ▼              ▼
//!   ┌────────────┐ ┌──────────────┐ ┌────────────┐
//!   │MessageStore│ │ Conversation │ │  Presence  │
//!   │            │ │    Store     │ │   Store    │
//!   └────────────┘ └──────────────┘ └────────────┘
//! ```

mod connection;
mod manager;
mod router;
mod transport;

pub use connection::{AfterClose, ConnectionState, Lifecycle, ReconnectConfig};
pub use manager::ConnectionManager;
pub use router::{Dispatch, EventRouter};
pub use transport::{
    Connector, FrameSink, FrameStream, Transport, TransportError, TungsteniteConnector,
};
