//! Client configuration from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use chatify_shared::PATH_WS;

use crate::ws::ReconnectConfig;

/// Runtime configuration for a chat session.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the REST backend, e.g. `http://localhost:8080`.
    pub backend_url: String,
    /// Full websocket endpoint, e.g. `ws://localhost:8080/ws`.
    pub ws_url: String,
    pub reconnect: ReconnectConfig,
    /// Age after which an unacknowledged send is marked failed. `None` keeps
    /// pending sends forever.
    pub pending_timeout: Option<Duration>,
    /// Directory for persisted preferences.
    pub data_dir: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let backend_url = "http://localhost:8080".to_string();
        Self {
            ws_url: ws_url_from_backend(&backend_url),
            backend_url,
            reconnect: ReconnectConfig::default(),
            pending_timeout: Some(Duration::from_secs(30)),
            data_dir: crate::storage::default_dir(),
        }
    }
}

impl ClientConfig {
    /// Parse configuration from environment variables.
    ///
    /// Environment variables:
    /// - `CHATIFY_BACKEND_URL`: REST base URL (default: "http://localhost:8080")
    /// - `CHATIFY_WS_URL`: websocket URL (default: backend URL with ws scheme + "/ws")
    /// - `CHATIFY_RECONNECT_DELAY_MS`: fixed reconnect delay (default: 3000)
    /// - `CHATIFY_MAX_RECONNECTS`: reconnect attempts before giving up (default: 5)
    /// - `CHATIFY_PENDING_TIMEOUT_SECS`: pending send expiry, 0 disables (default: 30)
    /// - `CHATIFY_DATA_DIR`: preference storage directory (default: platform config dir)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let backend_url = lookup("CHATIFY_BACKEND_URL")
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or(defaults.backend_url);
        let ws_url = lookup("CHATIFY_WS_URL").unwrap_or_else(|| ws_url_from_backend(&backend_url));

        let mut reconnect = defaults.reconnect;
        if let Some(ms) = lookup("CHATIFY_RECONNECT_DELAY_MS").and_then(|v| v.parse::<u64>().ok()) {
            reconnect.delay = Duration::from_millis(ms);
        }
        if let Some(max) = lookup("CHATIFY_MAX_RECONNECTS").and_then(|v| v.parse::<u32>().ok()) {
            reconnect.max_attempts = max;
        }

        let pending_timeout = match lookup("CHATIFY_PENDING_TIMEOUT_SECS")
            .and_then(|v| v.parse::<u64>().ok())
        {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => defaults.pending_timeout,
        };

        let data_dir = lookup("CHATIFY_DATA_DIR")
            .map(PathBuf::from)
            .or(defaults.data_dir);

        Self {
            backend_url,
            ws_url,
            reconnect,
            pending_timeout,
            data_dir,
        }
    }
}

/// Convert an HTTP/HTTPS base URL to the websocket endpoint.
pub fn ws_url_from_backend(backend_url: &str) -> String {
    let base = backend_url.trim_end_matches('/');
    let ws_base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        base.to_string()
    };
    format!("{ws_base}{PATH_WS}")
}
