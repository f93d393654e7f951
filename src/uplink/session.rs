use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::transport::{FrameKind, Transport, TransportErrorKind, TransportEvent, TransportHandle};

use super::error::UplinkError;
use super::messages::ControlMessage;
use super::reconnect::{self, ReconnectPolicy};

/// Bounded send retry: one retry after a short pause, then give up and let
/// the reconnect worker take over.
const SEND_ATTEMPTS: u32 = 2;
const SEND_RETRY_DELAY: Duration = Duration::from_millis(10);

/// Lifecycle of the uplink connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Closed,
}

type DataCallback = Arc<dyn Fn(Vec<u8>) + Send + Sync>;

/// Mutable session state. Guarded by a single mutex with short critical
/// sections; the lock is never held across an await point.
pub(crate) struct Inner {
    pub(crate) state: SessionState,
    pub(crate) handle: Option<Arc<dyn TransportHandle>>,
    pub(crate) uri: Option<String>,
    pub(crate) policy: ReconnectPolicy,
    pub(crate) manual_disconnect: bool,
    pub(crate) reconnect_running: bool,
    reconnect_task: Option<JoinHandle<()>>,
    event_task: Option<JoinHandle<()>>,
}

impl Inner {
    /// Take the transport handle out so it can be closed outside the lock.
    pub(crate) fn take_handle(&mut self) -> Option<Arc<dyn TransportHandle>> {
        self.handle.take()
    }

    /// Whether the current handle still reports a live connection.
    pub(crate) fn handle_connected(&self) -> bool {
        self.handle.as_ref().map(|h| h.is_connected()).unwrap_or(false)
    }
}

/// State shared between the session facade, the event loop, and the
/// reconnect worker.
pub(crate) struct SessionShared {
    inner: Mutex<Inner>,
    transport: Arc<dyn Transport>,
    device_mac: Option<String>,
    on_data: Mutex<Option<DataCallback>>,
}

impl SessionShared {
    pub(crate) fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("session lock poisoned")
    }

    /// Dial the transport and wire its event stream into a fresh event loop.
    /// Replaces any previous handle and event task.
    pub(crate) async fn establish(self: &Arc<Self>, uri: &str) -> Result<(), UplinkError> {
        let (handle, events) = self
            .transport
            .connect(uri)
            .await
            .map_err(|e| UplinkError::Connect(format!("{e:#}")))?;

        // The handle must be visible before the event loop can observe
        // Connected, otherwise its device announcement races the handoff.
        self.lock().handle = Some(handle);

        let event_task = tokio::spawn(run_event_loop(Arc::clone(self), events));
        if let Some(old) = self.lock().event_task.replace(event_task) {
            old.abort();
        }

        Ok(())
    }

    /// Spawn the reconnect worker unless one is already running, the
    /// disconnect was manual, or no uri has ever been set.
    pub(crate) fn trigger_reconnect(self: &Arc<Self>) {
        let mut inner = self.lock();
        if inner.manual_disconnect || inner.reconnect_running || inner.uri.is_none() {
            return;
        }
        inner.reconnect_running = true;
        inner.state = SessionState::Reconnecting;

        let task = tokio::spawn(reconnect::run(Arc::clone(self)));
        if let Some(old) = inner.reconnect_task.replace(task) {
            old.abort();
        }
    }

    /// Send one frame with the bounded retry policy. A failure after the
    /// last attempt surfaces as `SendFailed` and kicks off reconnection.
    pub(crate) async fn send(
        self: &Arc<Self>,
        payload: &[u8],
        kind: FrameKind,
    ) -> Result<usize, UplinkError> {
        if payload.is_empty() {
            return Err(UplinkError::EmptyPayload);
        }

        let handle = { self.lock().handle.clone() };
        let handle = match handle {
            // No connection object at all (never started, or manually
            // stopped): nothing to heal, so no reconnect either.
            None => return Err(UplinkError::NotConnected),
            Some(h) if !h.is_connected() => {
                self.trigger_reconnect();
                return Err(UplinkError::NotConnected);
            }
            Some(h) => h,
        };

        let mut last_error = String::new();
        for attempt in 1..=SEND_ATTEMPTS {
            match handle.send(payload, kind).await {
                Ok(n) => return Ok(n),
                Err(e) => {
                    last_error = format!("{e:#}");
                    warn!("Send attempt {attempt}/{SEND_ATTEMPTS} failed: {last_error}");
                    if attempt < SEND_ATTEMPTS {
                        tokio::time::sleep(SEND_RETRY_DELAY).await;
                        if !handle.is_connected() {
                            warn!("Connection dropped mid-retry, aborting send");
                            break;
                        }
                    }
                }
            }
        }

        self.trigger_reconnect();
        Err(UplinkError::SendFailed {
            attempts: SEND_ATTEMPTS,
            reason: last_error,
        })
    }
}

/// Consume transport lifecycle events for one connection. Ends when the
/// transport sends `Finish` or the channel closes.
async fn run_event_loop(shared: Arc<SessionShared>, mut events: mpsc::Receiver<TransportEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            TransportEvent::Connected => {
                {
                    let mut inner = shared.lock();
                    inner.state = SessionState::Connected;
                    // During a reconnect cycle the worker owns the counter
                    // and resets it only after the stability probe.
                    if !inner.reconnect_running {
                        inner.policy.reset();
                    }
                }
                info!("Uplink connected");

                let mac = shared.device_mac.as_deref();
                match serde_json::to_vec(&ControlMessage::device_info(mac)) {
                    Ok(payload) => {
                        if let Err(e) = shared.send(&payload, FrameKind::Text).await {
                            warn!("Failed to announce device info: {e}");
                        }
                    }
                    Err(e) => warn!("Failed to encode device info: {e}"),
                }
            }
            TransportEvent::Data(bytes) => {
                debug!("Received {} bytes from server", bytes.len());
                let callback = { shared.on_data.lock().expect("callback lock poisoned").clone() };
                if let Some(cb) = callback {
                    cb(bytes);
                }
            }
            TransportEvent::Error(kind) => {
                error!("Transport error ({kind:?})");
                if kind == TransportErrorKind::Fatal {
                    let stale = { shared.lock().take_handle() };
                    if let Some(handle) = stale {
                        handle.close().await;
                    }
                }
                demote_connected(&shared);
                shared.trigger_reconnect();
            }
            TransportEvent::Disconnected | TransportEvent::Closed => {
                info!("Uplink connection lost");
                demote_connected(&shared);
                shared.trigger_reconnect();
            }
            ev @ (TransportEvent::BeforeConnect
            | TransportEvent::Begin
            | TransportEvent::Finish) => {
                debug!("Transport lifecycle event: {ev:?}");
            }
        }
    }
}

/// Drop from Connected to Disconnected without touching Closed or an
/// in-flight Reconnecting state.
fn demote_connected(shared: &Arc<SessionShared>) {
    let mut inner = shared.lock();
    if inner.state == SessionState::Connected {
        inner.state = SessionState::Disconnected;
    }
}

/// A duplex uplink session over a single transport connection.
///
/// One session owns one connection at a time. Unplanned drops are healed by
/// a background reconnect worker with bounded, jittered backoff; a manual
/// [`stop`](DuplexSession::stop) suppresses reconnection entirely.
pub struct DuplexSession {
    shared: Arc<SessionShared>,
}

impl DuplexSession {
    pub fn new(
        transport: Arc<dyn Transport>,
        policy: ReconnectPolicy,
        device_mac: Option<String>,
    ) -> Self {
        Self {
            shared: Arc::new(SessionShared {
                inner: Mutex::new(Inner {
                    state: SessionState::Disconnected,
                    handle: None,
                    uri: None,
                    policy,
                    manual_disconnect: false,
                    reconnect_running: false,
                    reconnect_task: None,
                    event_task: None,
                }),
                transport,
                device_mac,
                on_data: Mutex::new(None),
            }),
        }
    }

    /// Register the callback invoked for every data frame from the server.
    pub fn on_data(&self, callback: impl Fn(Vec<u8>) + Send + Sync + 'static) {
        *self.shared.on_data.lock().expect("callback lock poisoned") = Some(Arc::new(callback));
    }

    /// Open the connection. Fails fast on an empty uri or if a connection
    /// already exists.
    pub async fn start(&self, uri: &str) -> Result<(), UplinkError> {
        let uri = uri.trim();
        if uri.is_empty() {
            return Err(UplinkError::InvalidUri(uri.to_string()));
        }

        {
            let mut inner = self.shared.lock();
            if inner.handle.is_some() {
                return Err(UplinkError::AlreadyRunning);
            }
            inner.uri = Some(uri.to_string());
            inner.manual_disconnect = false;
            inner.state = SessionState::Connecting;
        }

        if let Err(e) = self.shared.establish(uri).await {
            self.shared.lock().state = SessionState::Disconnected;
            return Err(e);
        }

        Ok(())
    }

    /// Send a binary audio frame.
    pub async fn send_binary(&self, payload: &[u8]) -> Result<(), UplinkError> {
        self.shared.send(payload, FrameKind::Binary).await.map(|_| ())
    }

    /// Send a text control frame.
    pub async fn send_text(&self, payload: &[u8]) -> Result<(), UplinkError> {
        self.shared.send(payload, FrameKind::Text).await.map(|_| ())
    }

    /// Manual shutdown. Marks the disconnect as intentional so no reconnect
    /// worker runs, closes the connection, and leaves the session ready for
    /// a later `start`.
    pub async fn stop(&self) {
        let (reconnect_task, event_task, handle) = {
            let mut inner = self.shared.lock();
            inner.manual_disconnect = true;
            inner.reconnect_running = false;
            (
                inner.reconnect_task.take(),
                inner.event_task.take(),
                inner.handle.take(),
            )
        };

        if let Some(task) = reconnect_task {
            task.abort();
        }
        if let Some(task) = event_task {
            task.abort();
        }
        if let Some(handle) = handle {
            handle.close().await;
        }

        let mut inner = self.shared.lock();
        inner.state = SessionState::Closed;
        inner.policy.reset();
        inner.manual_disconnect = false;
        info!("Uplink session stopped");
    }

    pub fn state(&self) -> SessionState {
        self.shared.lock().state
    }

    pub fn is_connected(&self) -> bool {
        self.shared.lock().handle_connected()
    }

    /// Reconnect attempts consumed so far (zero after a stable reconnect).
    pub fn reconnect_attempts(&self) -> u32 {
        self.shared.lock().policy.attempt_count()
    }
}
