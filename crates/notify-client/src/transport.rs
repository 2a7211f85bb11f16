//! # Realtime Transport
//!
//! Push channel to the notification hub with automatic reconnection.
//!
//! ## Connection Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Hub Connection States                                │
//! │                                                                         │
//! │  ┌────────────┐    connect()    ┌────────────┐                         │
//! │  │Disconnected│ ──────────────► │ Connecting │                         │
//! │  └────────────┘  (credential    └─────┬──────┘                         │
//! │        ▲          present)            │                                 │
//! │        │                    success   │   failure                       │
//! │        │                        ┌─────┴─────┐                          │
//! │        │                        ▼           ▼                           │
//! │        │              ┌────────────┐  ┌────────────┐                   │
//! │        │              │ Connected  │  │Disconnected│                   │
//! │        │              └─────┬──────┘  │ + 1 retry  │                   │
//! │        │                    │         │ scheduled  │                   │
//! │        │        close/error │         └─────┬──────┘                   │
//! │        │                    ▼               │ policy delay              │
//! │        │              ┌────────────┐        │ (default fixed 5s)        │
//! │        │              │Disconnected│ ───────┘                          │
//! │        │              └────────────┘                                    │
//! │        │                                                                │
//! │   disconnect(): bump generation, signal shutdown, cancel pending retry │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Ownership
//! One loop task per `connect()`. The task owns the session, the retry
//! policy and the dispatch of push events to subscribers, so handlers run
//! serialized and in receipt order. Every state write checks the generation
//! the loop was started with; a loop from before a `disconnect()` can never
//! write state or re-arm a retry.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, timeout, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

use notify_core::{ConnectionState, PushEvent};

use crate::config::ClientConfig;
use crate::credentials::CredentialStore;
use crate::error::{ClientError, ClientResult};
use crate::protocol::{
    handshake_request, parse_handshake_response, ping_record, split_records, HubMessage,
    ACCESS_TOKEN_PARAM, RECEIVE_NOTIFICATION,
};
use crate::retry::{FixedDelay, RetryPolicy};

/// Buffered hub events per session.
const EVENT_BUFFER: usize = 64;

/// Callback invoked once per push event.
pub type PushHandler = Arc<dyn Fn(&PushEvent) + Send + Sync>;

/// Builds a fresh retry policy for each connection loop.
pub type RetryPolicyFactory = Arc<dyn Fn() -> Box<dyn RetryPolicy> + Send + Sync>;

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub fn new(raw: u64) -> Self {
        SubscriptionId(raw)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

// =============================================================================
// Transport Trait
// =============================================================================

/// Realtime push channel as seen by the sync hook.
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    /// Starts the connection loop.
    ///
    /// No-op without a credential or while a loop is already live. Returns
    /// the outcome of the first attempt; a failure has already scheduled a
    /// retry.
    async fn connect(&self) -> ClientResult<()>;

    /// Stops the connection and cancels any pending retry. Idempotent.
    async fn disconnect(&self);

    /// Registers a push handler.
    fn subscribe(&self, handler: PushHandler) -> SubscriptionId;

    /// Removes a push handler. Returns false if it was not registered.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;

    /// Current connection state.
    fn state(&self) -> ConnectionState;

    /// Receiver that observes every state change.
    fn watch_state(&self) -> watch::Receiver<ConnectionState>;

    /// True only while connected.
    fn is_active(&self) -> bool {
        self.state() == ConnectionState::Connected
    }
}

// =============================================================================
// Connector Seam
// =============================================================================

/// Something that happened on an established session.
#[derive(Debug)]
pub enum HubEvent {
    /// The server pushed a notification.
    Push(PushEvent),
    /// The session ended, with the reason if one was given.
    Closed(Option<String>),
}

/// An established hub session.
///
/// Dropping the session closes it.
pub struct HubSession {
    events: mpsc::Receiver<HubEvent>,
    close: Option<oneshot::Sender<()>>,
}

impl HubSession {
    pub fn new(events: mpsc::Receiver<HubEvent>, close: oneshot::Sender<()>) -> Self {
        HubSession {
            events,
            close: Some(close),
        }
    }

    /// Waits for the next event. `None` means the session is gone.
    pub async fn next_event(&mut self) -> Option<HubEvent> {
        self.events.recv().await
    }

    /// Asks the session to close.
    pub fn close(mut self) {
        if let Some(close) = self.close.take() {
            let _ = close.send(());
        }
    }
}

/// Establishes hub sessions.
#[async_trait]
pub trait HubConnector: Send + Sync {
    /// Connects to `hub_url` authenticated with `access_token` and completes
    /// the hub handshake.
    async fn connect(&self, hub_url: &Url, access_token: &str) -> ClientResult<HubSession>;
}

// =============================================================================
// Transport Options
// =============================================================================

/// Tuning for [`HubTransport`].
#[derive(Clone)]
pub struct HubOptions {
    /// Bound on one connection attempt, handshake included.
    pub connect_timeout: Duration,

    /// Source of the retry policy.
    pub retry_policy: RetryPolicyFactory,
}

impl Default for HubOptions {
    fn default() -> Self {
        HubOptions {
            connect_timeout: Duration::from_secs(10),
            retry_policy: Arc::new(|| Box::new(FixedDelay::default())),
        }
    }
}

impl HubOptions {
    /// Builds options from configuration.
    pub fn from_config(config: &ClientConfig) -> Self {
        let retry = config.retry.clone();
        HubOptions {
            connect_timeout: config.connect_timeout(),
            retry_policy: Arc::new(move || retry.build_policy()),
        }
    }
}

// =============================================================================
// Hub Transport
// =============================================================================

#[derive(Default)]
struct Lifecycle {
    generation: u64,
    shutdown_tx: Option<mpsc::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

enum SessionEnd {
    Shutdown,
    Closed(Option<String>),
}

struct HubInner {
    hub_url: Url,
    connector: Arc<dyn HubConnector>,
    credentials: Arc<dyn CredentialStore>,
    options: HubOptions,
    lifecycle: Mutex<Lifecycle>,
    state_tx: watch::Sender<ConnectionState>,
    subscribers: RwLock<Vec<(SubscriptionId, PushHandler)>>,
    next_subscription: AtomicU64,
}

/// [`NotificationTransport`] backed by a [`HubConnector`].
///
/// ## Usage
/// ```rust,ignore
/// let transport = HubTransport::from_config(&config, credentials)?;
///
/// transport.subscribe(Arc::new(|event| {
///     println!("new notification: {:?}", event.notification);
/// }));
/// transport.connect().await?;
/// ```
#[derive(Clone)]
pub struct HubTransport {
    inner: Arc<HubInner>,
}

impl HubTransport {
    /// Creates a transport. Nothing connects until `connect()`.
    pub fn new(
        hub_url: Url,
        connector: Arc<dyn HubConnector>,
        credentials: Arc<dyn CredentialStore>,
        options: HubOptions,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);

        HubTransport {
            inner: Arc::new(HubInner {
                hub_url,
                connector,
                credentials,
                options,
                lifecycle: Mutex::new(Lifecycle::default()),
                state_tx,
                subscribers: RwLock::new(Vec::new()),
                next_subscription: AtomicU64::new(1),
            }),
        }
    }

    /// Creates a WebSocket-backed transport from configuration.
    pub fn from_config(
        config: &ClientConfig,
        credentials: Arc<dyn CredentialStore>,
    ) -> ClientResult<Self> {
        let hub_url = config
            .hub_url()
            .ok_or_else(|| ClientError::InvalidConfig("Hub URL required".into()))?;

        Ok(Self::new(
            Url::parse(hub_url)?,
            Arc::new(WebSocketConnector::from_config(config)),
            credentials,
            HubOptions::from_config(config),
        ))
    }
}

#[async_trait]
impl NotificationTransport for HubTransport {
    async fn connect(&self) -> ClientResult<()> {
        let inner = &self.inner;

        if let Err(e) = inner.bearer_token() {
            debug!(reason = %e, "Not connecting to notification hub");
            return Ok(());
        }

        let (first_tx, first_rx) = oneshot::channel();
        {
            let mut lifecycle = inner.lifecycle();
            if lifecycle.shutdown_tx.is_some() {
                debug!("Notification hub loop already running");
                return Ok(());
            }

            lifecycle.generation += 1;
            let generation = lifecycle.generation;
            let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
            lifecycle.shutdown_tx = Some(shutdown_tx);
            lifecycle.task = Some(tokio::spawn(inner.clone().run(
                generation,
                shutdown_rx,
                first_tx,
            )));
        }

        // A loop stopped before its first attempt finished reports nothing
        first_rx.await.unwrap_or(Ok(()))
    }

    async fn disconnect(&self) {
        let (shutdown_tx, task) = {
            let mut lifecycle = self.inner.lifecycle();
            lifecycle.generation += 1;
            self.inner.state_tx.send_replace(ConnectionState::Disconnected);
            (lifecycle.shutdown_tx.take(), lifecycle.task.take())
        };

        let was_live = shutdown_tx.is_some();
        if let Some(shutdown_tx) = shutdown_tx {
            let _ = shutdown_tx.try_send(());
        }
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "Notification hub loop ended abnormally");
            }
        }

        if was_live {
            info!(url = %self.inner.hub_url, "Disconnected from notification hub");
        }
    }

    fn subscribe(&self, handler: PushHandler) -> SubscriptionId {
        let id = SubscriptionId(self.inner.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.inner
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, handler));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self
            .inner
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = subscribers.len();
        subscribers.retain(|(existing, _)| *existing != id);
        subscribers.len() != before
    }

    fn state(&self) -> ConnectionState {
        *self.inner.state_tx.borrow()
    }

    fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }
}

impl HubInner {
    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn bearer_token(&self) -> ClientResult<String> {
        self.credentials.bearer_token().ok_or(ClientError::AuthMissing)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.lifecycle().generation == generation
    }

    /// Writes state only if `generation` is still the live loop.
    fn set_state(&self, generation: u64, state: ConnectionState) {
        let lifecycle = self.lifecycle();
        if lifecycle.generation == generation {
            self.state_tx.send_if_modified(|current| {
                let changed = *current != state;
                *current = state;
                changed
            });
        }
    }

    /// Clears the lifecycle when a loop stops on its own.
    fn finish(&self, generation: u64) {
        let mut lifecycle = self.lifecycle();
        if lifecycle.generation == generation {
            lifecycle.shutdown_tx = None;
            lifecycle.task = None;
            self.state_tx.send_replace(ConnectionState::Disconnected);
        }
    }

    fn dispatch(&self, event: &PushEvent) {
        let handlers: Vec<PushHandler> = self
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect();

        debug!(
            subscribers = handlers.len(),
            has_payload = event.notification.is_some(),
            "Dispatching push event"
        );
        for handler in handlers {
            handler(event);
        }
    }

    /// Main connection loop.
    async fn run(
        self: Arc<Self>,
        generation: u64,
        mut shutdown_rx: mpsc::Receiver<()>,
        first_tx: oneshot::Sender<ClientResult<()>>,
    ) {
        let mut first_tx = Some(first_tx);
        let mut policy = (self.options.retry_policy)();
        let mut attempt = 0u32;

        loop {
            if !self.is_current(generation) {
                break;
            }

            // Re-read every attempt so a rotated token is used
            let token = match self.bearer_token() {
                Ok(token) => token,
                Err(e) => {
                    info!(reason = %e, "Stopping notification hub loop");
                    break;
                }
            };

            attempt += 1;
            self.set_state(generation, ConnectionState::Connecting);
            debug!(url = %self.hub_url, attempt, "Connecting to notification hub");

            let established = tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                result = self.establish(&token) => result,
            };

            match established {
                Ok(session) => {
                    info!(url = %self.hub_url, attempt, "Connected to notification hub");
                    self.set_state(generation, ConnectionState::Connected);
                    policy.reset();
                    attempt = 0;
                    report(&mut first_tx, Ok(()));

                    match self.pump(generation, session, &mut shutdown_rx).await {
                        SessionEnd::Shutdown => break,
                        SessionEnd::Closed(reason) => {
                            warn!(
                                reason = reason.as_deref().unwrap_or("none"),
                                "Notification hub connection closed"
                            );
                            self.set_state(generation, ConnectionState::Disconnected);
                        }
                    }
                }
                Err(e) => {
                    warn!(url = %self.hub_url, attempt, error = %e, "Failed to connect to notification hub");
                    self.set_state(generation, ConnectionState::Disconnected);
                    let retryable = e.is_retryable();
                    report(&mut first_tx, Err(e));
                    if !retryable {
                        break;
                    }
                }
            }

            let Some(delay) = policy.next_delay() else {
                warn!(attempt, "Retry policy exhausted, giving up on notification hub");
                break;
            };

            info!(delay_ms = delay.as_millis() as u64, "Reconnecting to notification hub after delay");
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                _ = sleep(delay) => {}
            }
        }

        self.finish(generation);
        debug!(generation, "Notification hub loop stopped");
    }

    /// One bounded connection attempt.
    async fn establish(&self, token: &str) -> ClientResult<HubSession> {
        let connect_timeout = self.options.connect_timeout;
        match timeout(connect_timeout, self.connector.connect(&self.hub_url, token)).await {
            Ok(result) => result,
            Err(_) => Err(ClientError::Timeout(connect_timeout.as_secs())),
        }
    }

    /// Forwards session events to subscribers until the session ends.
    async fn pump(
        &self,
        generation: u64,
        mut session: HubSession,
        shutdown_rx: &mut mpsc::Receiver<()>,
    ) -> SessionEnd {
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    session.close();
                    return SessionEnd::Shutdown;
                }
                event = session.next_event() => match event {
                    Some(HubEvent::Push(event)) => {
                        if self.is_current(generation) {
                            self.dispatch(&event);
                        }
                    }
                    Some(HubEvent::Closed(reason)) => return SessionEnd::Closed(reason),
                    None => return SessionEnd::Closed(None),
                }
            }
        }
    }
}

fn report(first_tx: &mut Option<oneshot::Sender<ClientResult<()>>>, result: ClientResult<()>) {
    if let Some(tx) = first_tx.take() {
        let _ = tx.send(result);
    }
}

// =============================================================================
// WebSocket Connector
// =============================================================================

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Production [`HubConnector`]: SignalR JSON protocol over WebSocket.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    keepalive_interval: Duration,
    server_timeout: Duration,
}

impl Default for WebSocketConnector {
    fn default() -> Self {
        WebSocketConnector::new(Duration::from_secs(15), Duration::from_secs(30))
    }
}

impl WebSocketConnector {
    pub fn new(keepalive_interval: Duration, server_timeout: Duration) -> Self {
        WebSocketConnector {
            keepalive_interval,
            server_timeout,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.keepalive_interval(), config.server_timeout())
    }

    /// Maps `http(s)` to `ws(s)` and appends the access token.
    fn socket_url(hub_url: &Url, access_token: &str) -> ClientResult<Url> {
        let mut url = hub_url.clone();
        let scheme = match url.scheme() {
            "http" => Some("ws"),
            "https" => Some("wss"),
            "ws" | "wss" => None,
            other => {
                return Err(ClientError::InvalidUrl(format!(
                    "unsupported hub scheme: {}",
                    other
                )))
            }
        };
        if let Some(scheme) = scheme {
            url.set_scheme(scheme)
                .map_err(|_| ClientError::InvalidUrl(format!("cannot use scheme {}", scheme)))?;
        }

        url.query_pairs_mut()
            .append_pair(ACCESS_TOKEN_PARAM, access_token);
        Ok(url)
    }

    /// Sends the handshake and waits for the reply.
    ///
    /// Returns any records that arrived in the same frame as the reply.
    async fn handshake(ws: &mut WsStream) -> ClientResult<Vec<String>> {
        ws.send(WsMessage::Text(handshake_request()?.into())).await?;

        loop {
            match ws.next().await {
                Some(Ok(WsMessage::Text(text))) => {
                    let mut records = split_records(text.as_str());
                    let Some(response) = records.next() else {
                        continue;
                    };
                    parse_handshake_response(response)?;
                    return Ok(records.map(str::to_string).collect());
                }
                Some(Ok(WsMessage::Close(frame))) => {
                    return Err(ClientError::Handshake(format!(
                        "closed during handshake: {}",
                        frame
                            .map(|f| f.reason.as_str().to_string())
                            .unwrap_or_default()
                    )))
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
                None => return Err(ClientError::Disconnected),
            }
        }
    }
}

#[async_trait]
impl HubConnector for WebSocketConnector {
    async fn connect(&self, hub_url: &Url, access_token: &str) -> ClientResult<HubSession> {
        let url = Self::socket_url(hub_url, access_token)?;

        let (mut ws, response) = connect_async(url.as_str()).await?;
        debug!(status = ?response.status(), "WebSocket upgrade complete");

        let pending = Self::handshake(&mut ws).await?;
        debug!(pending = pending.len(), "Hub handshake complete");

        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let (close_tx, close_rx) = oneshot::channel();
        tokio::spawn(pump_socket(
            ws,
            pending,
            events_tx,
            close_rx,
            self.keepalive_interval,
            self.server_timeout,
        ));

        Ok(HubSession::new(events_rx, close_tx))
    }
}

enum RecordOutcome {
    Push(PushEvent),
    Close(Option<String>),
    Ignore,
}

enum Delivery {
    Continue,
    Closed(Option<String>),
    Abandoned,
}

/// Interprets one hub record.
fn interpret_record(record: &str) -> RecordOutcome {
    let message = match HubMessage::parse(record) {
        Ok(message) => message,
        Err(e) => {
            warn!(error = %e, "Ignoring malformed hub message");
            return RecordOutcome::Ignore;
        }
    };
    debug!(msg_type = message.type_name(), "Received hub message");

    match message {
        HubMessage::Invocation { target, arguments } if target == RECEIVE_NOTIFICATION => {
            match PushEvent::from_arguments(arguments) {
                Ok(event) => RecordOutcome::Push(event),
                Err(e) => {
                    // Still counts as "something new"
                    warn!(error = %e, "Unreadable notification payload");
                    RecordOutcome::Push(PushEvent::new(None))
                }
            }
        }
        HubMessage::Invocation { target, .. } => {
            debug!(target = %target, "Ignoring invocation");
            RecordOutcome::Ignore
        }
        HubMessage::Close {
            error,
            allow_reconnect,
        } => {
            info!(error = ?error, allow_reconnect, "Hub sent close");
            RecordOutcome::Close(error)
        }
        HubMessage::Ping | HubMessage::Other(_) => RecordOutcome::Ignore,
    }
}

async fn deliver<'a>(
    records: impl Iterator<Item = &'a str>,
    events: &mpsc::Sender<HubEvent>,
) -> Delivery {
    for record in records {
        match interpret_record(record) {
            RecordOutcome::Push(event) => {
                if events.send(HubEvent::Push(event)).await.is_err() {
                    return Delivery::Abandoned;
                }
            }
            RecordOutcome::Close(reason) => return Delivery::Closed(reason),
            RecordOutcome::Ignore => {}
        }
    }
    Delivery::Continue
}

/// Socket task: keepalive, server timeout, record delivery.
async fn pump_socket(
    ws: WsStream,
    pending: Vec<String>,
    events: mpsc::Sender<HubEvent>,
    mut close_rx: oneshot::Receiver<()>,
    keepalive_interval: Duration,
    server_timeout: Duration,
) {
    let (mut write, mut read) = ws.split();

    let mut ping = interval_at(Instant::now() + keepalive_interval, keepalive_interval);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let idle = sleep(server_timeout);
    tokio::pin!(idle);

    let mut delivery = deliver(pending.iter().map(String::as_str), &events).await;

    let reason = loop {
        match delivery {
            Delivery::Continue => {}
            Delivery::Closed(reason) => {
                let _ = write.send(WsMessage::Close(None)).await;
                break reason;
            }
            Delivery::Abandoned => {
                let _ = write.send(WsMessage::Close(None)).await;
                return;
            }
        }

        delivery = tokio::select! {
            _ = &mut close_rx => {
                debug!("Closing hub connection");
                let _ = write.send(WsMessage::Close(None)).await;
                return;
            }
            _ = ping.tick() => {
                if let Err(e) = write.send(WsMessage::Text(ping_record().into())).await {
                    break Some(e.to_string());
                }
                Delivery::Continue
            }
            _ = &mut idle => {
                break Some(format!("no message from server in {}s", server_timeout.as_secs()));
            }
            frame = read.next() => {
                idle.as_mut().reset(Instant::now() + server_timeout);
                match frame {
                    Some(Ok(WsMessage::Text(text))) => deliver(split_records(text.as_str()), &events).await,
                    Some(Ok(WsMessage::Ping(data))) => {
                        if let Err(e) = write.send(WsMessage::Pong(data)).await {
                            break Some(e.to_string());
                        }
                        Delivery::Continue
                    }
                    Some(Ok(WsMessage::Close(frame))) => {
                        break frame.map(|f| f.reason.as_str().to_string());
                    }
                    Some(Ok(_)) => Delivery::Continue,
                    Some(Err(e)) => break Some(e.to_string()),
                    None => break None,
                }
            }
        };
    };

    let _ = events.send(HubEvent::Closed(reason)).await;
}
