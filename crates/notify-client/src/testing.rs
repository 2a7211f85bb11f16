//! In-crate fakes for the API, transport and connector seams.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{sleep, Instant};
use url::Url;

use notify_core::{ConnectionState, Notification, NotificationId, Page, PushEvent};
use serde_json::json;

use crate::api::NotificationApi;
use crate::error::{ClientError, ClientResult};
use crate::transport::{
    HubConnector, HubEvent, HubSession, NotificationTransport, PushHandler, SubscriptionId,
};

pub(crate) fn notification(id: i64, is_read: bool) -> Notification {
    Notification::from_value(json!({
        "id": id,
        "message": format!("notification {}", id),
        "isRead": is_read,
        "createdAt": "2024-05-01T12:00:00Z"
    }))
    .unwrap()
}

// =============================================================================
// Fake API
// =============================================================================

pub(crate) struct FakeApi {
    pub unread: Mutex<Result<i64, String>>,
    pub unread_calls: AtomicUsize,
    pub notifications: Mutex<Vec<Notification>>,
    pub list_error: Mutex<Option<String>>,
    pub marked: Mutex<Vec<NotificationId>>,
    pub fail_mark: Mutex<Vec<NotificationId>>,
    pub deleted: Mutex<Vec<NotificationId>>,
    pub fail_delete: AtomicBool,
}

impl FakeApi {
    pub fn new() -> Arc<Self> {
        Arc::new(FakeApi {
            unread: Mutex::new(Ok(0)),
            unread_calls: AtomicUsize::new(0),
            notifications: Mutex::new(Vec::new()),
            list_error: Mutex::new(None),
            marked: Mutex::new(Vec::new()),
            fail_mark: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            fail_delete: AtomicBool::new(false),
        })
    }

    pub fn with_unread(count: i64) -> Arc<Self> {
        let api = Self::new();
        *api.unread.lock().unwrap() = Ok(count);
        api
    }
}

#[async_trait]
impl NotificationApi for FakeApi {
    async fn list(&self, page_size: u32) -> ClientResult<Page<Notification>> {
        if let Some(message) = self.list_error.lock().unwrap().clone() {
            return Err(ClientError::Network(message));
        }
        let all = self.notifications.lock().unwrap().clone();
        let total = all.len() as u64;
        Ok(Page {
            items: all.into_iter().take(page_size as usize).collect(),
            total_count: Some(total),
        })
    }

    async fn unread_count(&self) -> ClientResult<i64> {
        self.unread_calls.fetch_add(1, Ordering::SeqCst);
        self.unread
            .lock()
            .unwrap()
            .clone()
            .map_err(ClientError::Network)
    }

    async fn mark_as_read(&self, id: &NotificationId) -> ClientResult<()> {
        if self.fail_mark.lock().unwrap().contains(id) {
            return Err(ClientError::HttpStatus {
                status: 500,
                path: format!("/notifications/{}/read", id),
            });
        }
        self.marked.lock().unwrap().push(id.clone());
        Ok(())
    }

    async fn delete(&self, id: &NotificationId) -> ClientResult<()> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(ClientError::HttpStatus {
                status: 404,
                path: format!("/notifications/{}", id),
            });
        }
        self.deleted.lock().unwrap().push(id.clone());
        Ok(())
    }
}

// =============================================================================
// Fake Transport
// =============================================================================

pub(crate) struct FakeTransport {
    pub connects: AtomicUsize,
    pub disconnects: AtomicUsize,
    handlers: Mutex<Vec<(SubscriptionId, PushHandler)>>,
    next_id: AtomicU64,
    state_tx: watch::Sender<ConnectionState>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Arc::new(FakeTransport {
            connects: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
            handlers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            state_tx,
        })
    }

    /// Simulates one push from the server.
    pub fn push(&self, event: PushEvent) {
        let handlers: Vec<PushHandler> = self
            .handlers
            .lock()
            .unwrap()
            .iter()
            .map(|(_, h)| h.clone())
            .collect();
        for handler in handlers {
            handler(&event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.handlers.lock().unwrap().len()
    }
}

#[async_trait]
impl NotificationTransport for FakeTransport {
    async fn connect(&self) -> ClientResult<()> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.state_tx.send_replace(ConnectionState::Connected);
        Ok(())
    }

    async fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        self.state_tx.send_replace(ConnectionState::Disconnected);
    }

    fn subscribe(&self, handler: PushHandler) -> SubscriptionId {
        let id = SubscriptionId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.handlers.lock().unwrap().push((id, handler));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.lock().unwrap();
        let before = handlers.len();
        handlers.retain(|(existing, _)| *existing != id);
        handlers.len() != before
    }

    fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }
}

// =============================================================================
// Fake Connector
// =============================================================================

type FakeSession = (mpsc::Sender<HubEvent>, oneshot::Receiver<()>);

/// Connector whose attempts succeed or fail from a script.
#[derive(Default)]
pub(crate) struct FakeConnector {
    outcomes: Mutex<VecDeque<bool>>,
    attempts: Mutex<Vec<(String, Instant)>>,
    sessions: Mutex<Vec<FakeSession>>,
    delay: Option<Duration>,
    preloaded: Mutex<Vec<HubEvent>>,
}

impl FakeConnector {
    pub fn scripted(outcomes: &[bool]) -> Arc<Self> {
        Arc::new(FakeConnector {
            outcomes: Mutex::new(outcomes.iter().copied().collect()),
            ..Default::default()
        })
    }

    /// Each attempt takes `delay` before it resolves.
    pub fn slow(outcomes: &[bool], delay: Duration) -> Arc<Self> {
        Arc::new(FakeConnector {
            outcomes: Mutex::new(outcomes.iter().copied().collect()),
            delay: Some(delay),
            ..Default::default()
        })
    }

    /// The first session starts with `events` already queued.
    pub fn with_preloaded(outcomes: &[bool], events: Vec<HubEvent>) -> Arc<Self> {
        Arc::new(FakeConnector {
            outcomes: Mutex::new(outcomes.iter().copied().collect()),
            preloaded: Mutex::new(events),
            ..Default::default()
        })
    }

    pub fn attempts(&self) -> Vec<(String, Instant)> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn session_sender(&self, index: usize) -> mpsc::Sender<HubEvent> {
        self.sessions.lock().unwrap()[index].0.clone()
    }

    pub fn session_closed(&self, index: usize) -> bool {
        self.sessions.lock().unwrap()[index].1.try_recv().is_ok()
    }
}

#[async_trait]
impl HubConnector for FakeConnector {
    async fn connect(&self, _hub_url: &Url, access_token: &str) -> ClientResult<HubSession> {
        self.attempts
            .lock()
            .unwrap()
            .push((access_token.to_string(), Instant::now()));

        if let Some(delay) = self.delay {
            sleep(delay).await;
        }

        let succeed = self.outcomes.lock().unwrap().pop_front().unwrap_or(false);
        if !succeed {
            return Err(ClientError::ConnectionFailed("connection refused".into()));
        }

        let (events_tx, events_rx) = mpsc::channel(16);
        let (close_tx, close_rx) = oneshot::channel();
        let preloaded: Vec<HubEvent> = self.preloaded.lock().unwrap().drain(..).collect();
        for event in preloaded {
            events_tx.try_send(event).unwrap();
        }
        self.sessions.lock().unwrap().push((events_tx, close_rx));
        Ok(HubSession::new(events_rx, close_tx))
    }
}
