//! Connection state and the reconnect lifecycle.
//!
//! [`Lifecycle`] is the pure state machine; [`super::ConnectionManager`]
//! drives it from the socket task.

use std::time::Duration;

/// Connection state for the websocket
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    Reconnecting { attempt: u32 },
    /// Terminal for the session; recovery needs a new session.
    Failed { reason: String },
}

impl ConnectionState {
    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }

    pub fn is_connecting(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::Reconnecting { .. }
        )
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ConnectionState::Failed { .. })
    }
}

/// Configuration for auto-reconnect behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Reconnect attempts allowed before the connection is marked failed.
    pub max_attempts: u32,
    /// Fixed delay before each attempt.
    pub delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(3),
        }
    }
}

/// What the socket task should do after the connection closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AfterClose {
    Retry { attempt: u32, delay: Duration },
    Fail,
    /// The session ended; stop without retrying.
    Stop,
}

/// Reconnect state machine.
///
/// Each `connect` request starts a new run. Transitions reported by a run
/// that is no longer current are ignored, so a task left over from before
/// a disconnect cannot resurrect the connection.
#[derive(Debug)]
pub struct Lifecycle {
    state: ConnectionState,
    attempts: u32,
    run: u64,
    config: ReconnectConfig,
}

impl Lifecycle {
    pub fn new(config: ReconnectConfig) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            attempts: 0,
            run: 0,
            config,
        }
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn config(&self) -> &ReconnectConfig {
        &self.config
    }

    /// Start a new run from `Disconnected`. Returns the run id, or `None`
    /// if a run is already active or the connection has failed.
    pub fn request_connect(&mut self) -> Option<u64> {
        if self.state != ConnectionState::Disconnected {
            return None;
        }
        self.run += 1;
        self.attempts = 0;
        self.state = ConnectionState::Connecting;
        Some(self.run)
    }

    /// Handshake succeeded. Returns `false` if `run` is stale.
    pub fn on_open(&mut self, run: u64) -> bool {
        if run != self.run || self.state != ConnectionState::Connecting {
            return false;
        }
        self.state = ConnectionState::Open;
        self.attempts = 0;
        true
    }

    /// The handshake failed or an open connection dropped.
    pub fn on_closed(&mut self, run: u64) -> AfterClose {
        if run != self.run || self.state == ConnectionState::Disconnected {
            return AfterClose::Stop;
        }
        if self.state.is_failed() {
            return AfterClose::Fail;
        }
        if self.attempts < self.config.max_attempts {
            self.attempts += 1;
            self.state = ConnectionState::Reconnecting {
                attempt: self.attempts,
            };
            AfterClose::Retry {
                attempt: self.attempts,
                delay: self.config.delay,
            }
        } else {
            self.state = ConnectionState::Failed {
                reason: format!(
                    "Max reconnect attempts ({}) exceeded",
                    self.config.max_attempts
                ),
            };
            AfterClose::Fail
        }
    }

    /// The retry timer fired. Returns `true` if a new handshake should start.
    pub fn on_retry_timer(&mut self, run: u64) -> bool {
        if run != self.run || !matches!(self.state, ConnectionState::Reconnecting { .. }) {
            return false;
        }
        self.state = ConnectionState::Connecting;
        true
    }

    /// Give up on `run` without retrying, e.g. on a configuration error.
    pub fn fail(&mut self, run: u64, reason: impl Into<String>) {
        if run == self.run && self.state != ConnectionState::Disconnected {
            self.state = ConnectionState::Failed {
                reason: reason.into(),
            };
        }
    }

    /// Session teardown. Terminal for the current run.
    pub fn end_session(&mut self) {
        self.run += 1;
        self.attempts = 0;
        self.state = ConnectionState::Disconnected;
    }
}
