//! The single websocket connection of a session.
//!
//! [`ConnectionManager`] owns the transport and the reconnect timer. Inbound
//! text frames are forwarded, in arrival order, to the receiver returned by
//! [`ConnectionManager::new`]; outbound frames go through
//! [`ConnectionManager::send`], which is fire-and-forget and only succeeds
//! while the connection is open.

use std::sync::Arc;

use chatify_shared::ClientFrame;
use futures_channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::watch;

use super::connection::{AfterClose, ConnectionState, Lifecycle, ReconnectConfig};
use super::transport::{Connector, Transport};
use crate::auth_session::AuthContext;
use crate::stores::{Listeners, SubscriptionId};

struct Inner {
    ws_url: String,
    auth: AuthContext,
    connector: Arc<dyn Connector>,
    lifecycle: Mutex<Lifecycle>,
    /// Writer for the open connection; `None` unless open.
    outbound: Mutex<Option<UnboundedSender<String>>>,
    inbound: UnboundedSender<String>,
    shutdown: Mutex<Option<watch::Sender<bool>>>,
    listeners: Listeners<ConnectionState>,
}

#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    /// Create a manager for `ws_url`. The returned receiver yields every
    /// inbound text frame.
    pub fn new(
        ws_url: impl Into<String>,
        auth: AuthContext,
        connector: Arc<dyn Connector>,
        config: ReconnectConfig,
    ) -> (Self, UnboundedReceiver<String>) {
        let (inbound, inbound_rx) = unbounded();
        let manager = Self {
            inner: Arc::new(Inner {
                ws_url: ws_url.into(),
                auth,
                connector,
                lifecycle: Mutex::new(Lifecycle::new(config)),
                outbound: Mutex::new(None),
                inbound,
                shutdown: Mutex::new(None),
                listeners: Listeners::default(),
            }),
        };
        (manager, inbound_rx)
    }

    /// Open the connection if it is disconnected and a session exists.
    ///
    /// No-op while connecting, open, reconnecting or failed. Must be called
    /// from within a tokio runtime. Returns `true` if a connection attempt
    /// was started.
    pub fn connect(&self) -> bool {
        if !self.inner.auth.is_authenticated() {
            crate::log_warn!("Not connecting: no authenticated session");
            return false;
        }

        let Some(run) = self.transition(|lc| lc.request_connect()) else {
            crate::log_debug!("connect() ignored in state {:?}", self.state());
            return false;
        };

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        if let Some(previous) = self.inner.shutdown.lock().replace(shutdown_tx) {
            let _ = previous.send(true);
        }

        tokio::spawn(run_connection(self.inner.clone(), run, shutdown_rx));
        true
    }

    /// Close the connection for good (logout). The manager ends up
    /// `Disconnected` and may be connected again by a new session.
    pub fn disconnect(&self) {
        self.transition(|lc| lc.end_session());
        self.inner.outbound.lock().take();
        if let Some(shutdown) = self.inner.shutdown.lock().take() {
            let _ = shutdown.send(true);
        }
    }

    /// Send a frame. Dropped with a warning unless the connection is open.
    pub fn send(&self, frame: &ClientFrame) -> bool {
        match serde_json::to_string(frame) {
            Ok(json) => self.send_raw(json),
            Err(e) => {
                crate::log_error!("Serialize failed: {}", e);
                false
            }
        }
    }

    pub fn send_raw(&self, text: String) -> bool {
        if !self.state().is_open() {
            crate::log_warn!("Tried to send on closed WebSocket ({:?})", self.state());
            return false;
        }
        match self.inner.outbound.lock().as_ref() {
            Some(sender) => match sender.unbounded_send(text) {
                Ok(()) => true,
                Err(e) => {
                    crate::log_warn!("Failed to queue frame: {}", e);
                    false
                }
            },
            None => {
                crate::log_warn!("Tried to send on closed WebSocket");
                false
            }
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.lifecycle.lock().state().clone()
    }

    /// Reconnect attempts since the connection was last open.
    pub fn attempts(&self) -> u32 {
        self.inner.lifecycle.lock().attempts()
    }

    pub fn reconnect_config(&self) -> ReconnectConfig {
        self.inner.lifecycle.lock().config().clone()
    }

    pub fn subscribe(
        &self,
        listener: impl Fn(&ConnectionState) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.inner.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.listeners.unsubscribe(id)
    }

    fn transition<R>(&self, f: impl FnOnce(&mut Lifecycle) -> R) -> R {
        transition(&self.inner, f)
    }
}

/// Apply `f` to the lifecycle and notify listeners if the state changed.
fn transition<R>(inner: &Inner, f: impl FnOnce(&mut Lifecycle) -> R) -> R {
    let (result, before, after) = {
        let mut lc = inner.lifecycle.lock();
        let before = lc.state().clone();
        let result = f(&mut lc);
        (result, before, lc.state().clone())
    };
    if before != after {
        crate::log_info!("WebSocket state: {:?} -> {:?}", before, after);
        inner.listeners.notify(&after);
    }
    result
}

fn connect_url(ws_url: &str, token: &str) -> Result<String, url::ParseError> {
    let mut url = url::Url::parse(ws_url)?;
    url.query_pairs_mut().append_pair("token", token);
    Ok(url.into())
}

/// Mark `run` open and install its writer. Returns `None` without touching
/// the writer slot if `run` is stale.
fn open_outbound(
    inner: &Inner,
    run: u64,
) -> Option<(UnboundedSender<String>, UnboundedReceiver<String>)> {
    let (out_tx, out_rx) = unbounded();
    let writer = out_tx.clone();
    let opened = transition(inner, |lc| {
        if !lc.on_open(run) {
            return false;
        }
        *inner.outbound.lock() = Some(out_tx);
        true
    });
    opened.then_some((writer, out_rx))
}

/// Clear the writer slot if it still holds the writer of this run.
fn release_outbound(inner: &Inner, writer: &UnboundedSender<String>) {
    let mut outbound = inner.outbound.lock();
    if outbound
        .as_ref()
        .is_some_and(|current| current.same_receiver(writer))
    {
        outbound.take();
    }
}

async fn run_connection(inner: Arc<Inner>, run: u64, mut shutdown: watch::Receiver<bool>) {
    loop {
        let Some(token) = inner.auth.token() else {
            crate::log_warn!("Session ended; stopping connection loop");
            transition(&inner, |lc| lc.end_session());
            return;
        };
        let url = match connect_url(&inner.ws_url, &token) {
            Ok(url) => url,
            Err(e) => {
                crate::log_error!("Invalid websocket URL {}: {}", inner.ws_url, e);
                transition(&inner, |lc| lc.fail(run, format!("Invalid URL: {}", e)));
                return;
            }
        };

        let attempt = tokio::select! {
            result = inner.connector.connect(&url) => Some(result),
            _ = shutdown.changed() => None,
        };

        match attempt {
            None => return,
            Some(Ok(transport)) => {
                let Some((writer, out_rx)) = open_outbound(&inner, run) else {
                    crate::log_debug!("Discarding handshake of stale run {}", run);
                    return;
                };
                crate::log_info!("WebSocket connected to {}", inner.ws_url);

                let shut_down = pump(&inner, transport, out_rx, &mut shutdown).await;
                release_outbound(&inner, &writer);
                if shut_down {
                    return;
                }
                crate::log_info!("WebSocket to {} closed", inner.ws_url);
            }
            Some(Err(e)) => {
                crate::log_error!("WebSocket error for {}: {}", inner.ws_url, e);
            }
        }

        match transition(&inner, |lc| lc.on_closed(run)) {
            AfterClose::Retry { attempt, delay } => {
                crate::log_info!(
                    "Reconnecting to {} in {}ms (attempt {})",
                    inner.ws_url,
                    delay.as_millis(),
                    attempt
                );
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = shutdown.changed() => return,
                }
                if !transition(&inner, |lc| lc.on_retry_timer(run)) {
                    return;
                }
            }
            AfterClose::Fail => {
                crate::log_error!(
                    "Giving up on {}: max reconnect attempts reached",
                    inner.ws_url
                );
                return;
            }
            AfterClose::Stop => return,
        }
    }
}

/// Move frames until the connection closes. Returns `true` if the session
/// asked for shutdown, `false` if the remote side or the network ended it.
async fn pump(
    inner: &Inner,
    transport: Transport,
    mut out_rx: UnboundedReceiver<String>,
    shutdown: &mut watch::Receiver<bool>,
) -> bool {
    let Transport {
        mut sink,
        mut stream,
    } = transport;

    loop {
        tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(text)) => {
                    crate::log_debug!("WebSocket received: {}", text);
                    if inner.inbound.unbounded_send(text).is_err() {
                        crate::log_warn!("Inbound frame dropped: router is gone");
                    }
                }
                Some(Err(e)) => {
                    crate::log_error!("WebSocket read error: {}", e);
                    return false;
                }
                None => return false,
            },
            outgoing = out_rx.next() => match outgoing {
                Some(text) => {
                    crate::log_debug!("Sending: {}", text);
                    if let Err(e) = sink.send(text).await {
                        crate::log_error!("Send failed: {}", e);
                        return false;
                    }
                }
                None => {
                    crate::log_warn!("Writer channel closed");
                    let _ = sink.close().await;
                    return false;
                }
            },
            _ = shutdown.changed() => {
                let _ = sink.close().await;
                return true;
            }
        }
    }
}
