//! Channel connection manager: one persistent connection per key, any number
//! of local subscribers, bounded reconnection with a fixed delay.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::channels::key::ChannelKey;
use crate::error::{ClientError, ClientResult};
use crate::models::event::PushEvent;

const CLOSE_NORMAL: u16 = 1000;
const CLOSE_GOING_AWAY: u16 = 1001;
/// First application-defined close code. Chat uses this range for policy
/// rejections (bad token, not a participant, match started).
const CLOSE_POLICY_BASE: u16 = 4000;

/// Connection lifecycle. `ReconnectPending` degrades permanently to
/// `Disconnected` once the attempt ceiling is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Open,
    ReconnectPending,
}

struct Inner {
    key: ChannelKey,
    ws_base: String,
    reconnect_delay: Duration,
    max_reconnect_attempts: u32,
    state: RwLock<ChannelState>,
    /// Reconnects consumed since the last successful open.
    attempts: AtomicU32,
    subscribers: RwLock<HashMap<Uuid, mpsc::UnboundedSender<PushEvent>>>,
    /// Writer half of the live connection; replaced wholesale on reconnect.
    outbound: RwLock<Option<mpsc::UnboundedSender<Message>>>,
    task: Mutex<Option<JoinHandle<()>>>,
    cancel: Mutex<CancellationToken>,
    /// Set once a per-entity channel loses its last subscriber.
    retired: AtomicBool,
}

/// Manages one channel's connection and fans inbound events out to every
/// subscriber. Cloning shares the same underlying channel.
#[derive(Clone)]
pub struct ChannelManager {
    inner: Arc<Inner>,
}

impl ChannelManager {
    pub fn new(
        key: ChannelKey,
        ws_base: impl Into<String>,
        reconnect_delay: Duration,
        max_reconnect_attempts: u32,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                key,
                ws_base: ws_base.into(),
                reconnect_delay,
                max_reconnect_attempts,
                state: RwLock::new(ChannelState::Disconnected),
                attempts: AtomicU32::new(0),
                subscribers: RwLock::new(HashMap::new()),
                outbound: RwLock::new(None),
                task: Mutex::new(None),
                cancel: Mutex::new(CancellationToken::new()),
                retired: AtomicBool::new(false),
            }),
        }
    }

    pub fn key(&self) -> ChannelKey {
        self.inner.key
    }

    pub fn state(&self) -> ChannelState {
        *self.inner.state.read().expect("state lock")
    }

    /// Reconnects consumed since the last successful open.
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.attempts.load(Ordering::SeqCst)
    }

    pub fn is_retired(&self) -> bool {
        self.inner.retired.load(Ordering::SeqCst)
    }

    /// Open the connection. A no-op while a connection for this key is live
    /// (connecting, open, or waiting out a reconnect delay); otherwise any
    /// stale handle is dropped and a fresh connection task starts.
    pub fn connect(&self, token: Option<String>) {
        if self.is_retired() {
            return;
        }
        {
            let mut state = self.inner.state.write().expect("state lock");
            if *state != ChannelState::Disconnected {
                debug!(channel = %self.inner.key, "already connected");
                return;
            }
            *state = ChannelState::Connecting;
        }

        let cancel = CancellationToken::new();
        *self.inner.cancel.lock().expect("cancel lock") = cancel.clone();

        if let Some(stale) = self.inner.task.lock().expect("task lock").take() {
            stale.abort();
        }

        let inner = self.inner.clone();
        let handle = tokio::spawn(run_connection(inner, token, cancel));
        *self.inner.task.lock().expect("task lock") = Some(handle);
    }

    /// Register a subscriber. The returned [`Subscription`] receives every
    /// event fanned out while it lives; dropping it (or calling
    /// [`Subscription::unsubscribe`]) removes exactly this subscriber.
    pub fn subscribe(&self) -> Subscription {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .subscribers
            .write()
            .expect("subscribers lock")
            .insert(id, tx);
        Subscription {
            id,
            rx,
            inner: self.inner.clone(),
            lifetime: CancellationToken::new(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.read().expect("subscribers lock").len()
    }

    /// Send a frame over the live connection (chat only in practice).
    pub fn send<T: Serialize>(&self, frame: &T) -> ClientResult<()> {
        let payload = serde_json::to_string(frame)?;
        let outbound = self.inner.outbound.read().expect("outbound lock");
        match outbound.as_ref() {
            Some(tx) if tx.send(Message::Text(payload)).is_ok() => Ok(()),
            _ => Err(ClientError::Transport(WsError::ConnectionClosed)),
        }
    }

    /// Feed one raw frame through the fan-out path, as if it arrived over the
    /// connection.
    #[cfg(test)]
    pub(crate) fn dispatch_frame(&self, text: &str) {
        dispatch(&self.inner, text);
    }

    /// Close with the normal code and clear the subscriber set. Full-teardown
    /// only (logout); ordinary consumers just drop their subscriptions.
    pub async fn disconnect(&self) {
        self.inner.cancel.lock().expect("cancel lock").cancel();
        let task = self.inner.task.lock().expect("task lock").take();
        if let Some(task) = task {
            let _ = task.await;
        }
        self.inner
            .subscribers
            .write()
            .expect("subscribers lock")
            .clear();
        *self.inner.state.write().expect("state lock") = ChannelState::Disconnected;
        info!(channel = %self.inner.key, "channel disconnected");
    }
}

/// Handle to one registered subscriber.
pub struct Subscription {
    id: Uuid,
    rx: mpsc::UnboundedReceiver<PushEvent>,
    inner: Arc<Inner>,
    lifetime: CancellationToken,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl Subscription {
    /// Next fanned-out event; `None` once unsubscribed and drained.
    pub async fn recv(&mut self) -> Option<PushEvent> {
        self.rx.recv().await
    }

    /// Non-blocking drain, used to coalesce event bursts.
    pub fn try_recv(&mut self) -> Option<PushEvent> {
        self.rx.try_recv().ok()
    }

    /// Token cancelled when this subscription ends; work tied to the
    /// subscription must check it before mutating shared state.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.lifetime.clone()
    }

    /// Remove this subscriber. Idempotent; never disturbs other subscribers.
    pub fn unsubscribe(&self) {
        self.lifetime.cancel();
        let removed = self
            .inner
            .subscribers
            .write()
            .expect("subscribers lock")
            .remove(&self.id)
            .is_some();
        if !removed || self.inner.key.is_global() {
            return;
        }
        // Last subscriber gone on a per-entity channel: tear it down.
        if self
            .inner
            .subscribers
            .read()
            .expect("subscribers lock")
            .is_empty()
        {
            self.inner.retired.store(true, Ordering::SeqCst);
            self.inner.cancel.lock().expect("cancel lock").cancel();
            info!(channel = %self.inner.key, "last subscriber gone, closing channel");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

/// Reconnect policy. Normal and going-away closes never reconnect; chat also
/// gives up on application close codes, which are rejections rather than
/// transient faults. Everything else — including connect failures, which
/// count as one abnormal close — is retried.
fn should_reconnect(key: &ChannelKey, close_code: Option<u16>) -> bool {
    match close_code {
        Some(CLOSE_NORMAL) | Some(CLOSE_GOING_AWAY) => false,
        Some(code) if key.is_chat() && code >= CLOSE_POLICY_BASE => false,
        _ => true,
    }
}

fn set_state(inner: &Inner, state: ChannelState) {
    *inner.state.write().expect("state lock") = state;
}

/// Parse one inbound frame and fan it out. A parse failure is dropped so one
/// bad frame cannot kill the fan-out for the rest of the session.
fn dispatch(inner: &Inner, text: &str) {
    let event = match PushEvent::parse(text) {
        Ok(event) => event,
        Err(e) => {
            warn!(channel = %inner.key, error = %e, "dropping malformed frame");
            return;
        }
    };

    let mut dead = Vec::new();
    {
        let subscribers = inner.subscribers.read().expect("subscribers lock");
        for (id, tx) in subscribers.iter() {
            if tx.send(event.clone()).is_err() {
                dead.push(*id);
            }
        }
    }
    if !dead.is_empty() {
        let mut subscribers = inner.subscribers.write().expect("subscribers lock");
        for id in dead {
            subscribers.remove(&id);
        }
    }
}

/// One connection lifecycle, reconnects included. Each (re)connect builds a
/// brand-new stream; the previous handle is dropped, never reused.
async fn run_connection(inner: Arc<Inner>, token: Option<String>, cancel: CancellationToken) {
    loop {
        set_state(&inner, ChannelState::Connecting);

        let close_code = match open_once(&inner, token.as_deref(), &cancel).await {
            SessionEnd::LocalTeardown => {
                set_state(&inner, ChannelState::Disconnected);
                return;
            }
            SessionEnd::Closed(code) => code,
        };

        if cancel.is_cancelled() {
            set_state(&inner, ChannelState::Disconnected);
            return;
        }
        if !should_reconnect(&inner.key, close_code) {
            info!(channel = %inner.key, code = ?close_code, "closed, not reconnecting");
            set_state(&inner, ChannelState::Disconnected);
            return;
        }

        let used = inner.attempts.load(Ordering::SeqCst);
        if used >= inner.max_reconnect_attempts {
            warn!(channel = %inner.key, attempts = used, "reconnect ceiling reached");
            set_state(&inner, ChannelState::Disconnected);
            return;
        }
        let attempt = inner.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        info!(
            channel = %inner.key,
            attempt,
            max = inner.max_reconnect_attempts,
            "reconnecting after delay"
        );

        set_state(&inner, ChannelState::ReconnectPending);
        tokio::select! {
            _ = cancel.cancelled() => {
                set_state(&inner, ChannelState::Disconnected);
                return;
            }
            _ = tokio::time::sleep(inner.reconnect_delay) => {}
        }
    }
}

enum SessionEnd {
    /// Cancelled from this side; never reconnects.
    LocalTeardown,
    /// Remote close (code when a close frame arrived) or transport failure.
    Closed(Option<u16>),
}

async fn open_once(
    inner: &Arc<Inner>,
    token: Option<&str>,
    cancel: &CancellationToken,
) -> SessionEnd {
    let url = inner.key.url(&inner.ws_base, token);
    let request = match build_request(&inner.key, &url, token) {
        Ok(request) => request,
        Err(e) => {
            warn!(channel = %inner.key, error = %e, "request build failed");
            return SessionEnd::Closed(None);
        }
    };

    let stream = tokio::select! {
        _ = cancel.cancelled() => return SessionEnd::LocalTeardown,
        connected = connect_async(request) => match connected {
            Ok((stream, _response)) => stream,
            Err(e) => {
                warn!(channel = %inner.key, error = %e, "connect failed");
                return SessionEnd::Closed(None);
            }
        },
    };

    info!(channel = %inner.key, "connected");
    set_state(inner, ChannelState::Open);
    inner.attempts.store(0, Ordering::SeqCst);

    let (mut sink, mut source) = stream.split();
    let (tx_out, mut rx_out) = mpsc::unbounded_channel::<Message>();
    *inner.outbound.write().expect("outbound lock") = Some(tx_out);

    let writer_cancel = cancel.clone();
    let writer = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = writer_cancel.cancelled() => {
                    let _ = sink
                        .send(Message::Close(Some(CloseFrame {
                            code: CloseCode::Normal,
                            reason: "".into(),
                        })))
                        .await;
                    break;
                }
                frame = rx_out.recv() => match frame {
                    Some(frame) => {
                        if sink.send(frame).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                },
            }
        }
    });

    let end = loop {
        tokio::select! {
            _ = cancel.cancelled() => break SessionEnd::LocalTeardown,
            frame = source.next() => match frame {
                Some(Ok(Message::Text(text))) => dispatch(inner, &text),
                Some(Ok(Message::Close(frame))) => {
                    let code = frame.map(|f| u16::from(f.code));
                    debug!(channel = %inner.key, code = ?code, "close frame");
                    break SessionEnd::Closed(code);
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(channel = %inner.key, error = %e, "transport error");
                    break SessionEnd::Closed(None);
                }
                None => break SessionEnd::Closed(None),
            },
        }
    };

    *inner.outbound.write().expect("outbound lock") = None;
    let _ = writer.await;
    end
}

fn build_request(
    key: &ChannelKey,
    url: &str,
    token: Option<&str>,
) -> ClientResult<tokio_tungstenite::tungstenite::handshake::client::Request> {
    let mut request = url.into_client_request()?;
    if key.is_chat() {
        if let Some(token) = token {
            let value = HeaderValue::from_str(token)
                .map_err(|e| ClientError::Config(format!("credential not header-safe: {}", e)))?;
            request.headers_mut().insert("Sec-WebSocket-Protocol", value);
        }
    }
    Ok(request)
}
