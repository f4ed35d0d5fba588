//! Authentication session handed in by the external session provider.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Credentials of an authenticated user.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthSession {
    pub user_id: String,
    /// Bearer token, sent as an `Authorization` header on REST calls and as
    /// the `token` query parameter when opening the websocket.
    pub token: String,
}

impl AuthSession {
    pub fn new(user_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("user_id", &self.user_id)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Shared handle on the current session.
#[derive(Clone, Default, Debug)]
pub struct AuthContext {
    session: Arc<RwLock<Option<AuthSession>>>,
}

impl AuthContext {
    pub fn new(session: Option<AuthSession>) -> Self {
        Self {
            session: Arc::new(RwLock::new(session)),
        }
    }

    /// Login with a session issued by the provider
    pub fn login(&self, session: AuthSession) {
        *self.session.write() = Some(session);
    }

    /// Logout and clear session
    pub fn logout(&self) {
        *self.session.write() = None;
    }

    /// Check if user is authenticated
    pub fn is_authenticated(&self) -> bool {
        self.session.read().is_some()
    }

    /// Get the current user ID
    pub fn user_id(&self) -> Option<String> {
        self.session.read().as_ref().map(|s| s.user_id.clone())
    }

    pub fn token(&self) -> Option<String> {
        self.session.read().as_ref().map(|s| s.token.clone())
    }

    pub fn session(&self) -> Option<AuthSession> {
        self.session.read().clone()
    }
}
