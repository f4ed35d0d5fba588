//! Shared types for the chatify client: data models, REST bodies and the
//! websocket frame codec.

pub mod error;
pub mod models;
pub mod protocol;

pub use error::*;
pub use models::*;
pub use protocol::*;
