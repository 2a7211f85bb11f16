//! # Notification Sync
//!
//! Ties the unread counter to the session: fetch on login, push while
//! logged in, reset on logout.
//!
//! ## Auth Edges
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      NotificationSync                                   │
//! │                                                                         │
//! │  false ──► true                         true ──► false                 │
//! │  ──────────────                         ──────────────                 │
//! │  1. SetLoading(true)                    1. SetCount(0)                 │
//! │     GET unreadCount                     2. transport.disconnect()      │
//! │       ok  → SetCount(n)                 3. unsubscribe                 │
//! │       err → SetError(msg)                                              │
//! │     SetLoading(false)                                                  │
//! │  2. subscribe: push → Increment                                        │
//! │  3. transport.connect()                                                │
//! │                                                                         │
//! │  Same value twice does nothing. teardown() and Drop always disconnect. │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use notify_core::{CounterAction, PushEvent};

use crate::api::NotificationApi;
use crate::error::ClientResult;
use crate::store::CounterStore;
use crate::transport::{NotificationTransport, SubscriptionId};

/// Keeps the unread counter in step with the server for one session.
pub struct NotificationSync {
    api: Arc<dyn NotificationApi>,
    transport: Arc<dyn NotificationTransport>,
    store: CounterStore,
    authenticated: bool,
    subscription: Option<SubscriptionId>,
    torn_down: bool,
}

impl NotificationSync {
    /// Creates a sync hook in the logged-out state.
    pub fn new(
        api: Arc<dyn NotificationApi>,
        transport: Arc<dyn NotificationTransport>,
        store: CounterStore,
    ) -> Self {
        NotificationSync {
            api,
            transport,
            store,
            authenticated: false,
            subscription: None,
            torn_down: false,
        }
    }

    pub fn store(&self) -> &CounterStore {
        &self.store
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Applies an auth change. Only edges do anything.
    pub async fn set_authenticated(&mut self, authenticated: bool) {
        if authenticated == self.authenticated {
            return;
        }
        self.authenticated = authenticated;
        self.torn_down = false;

        if authenticated {
            self.on_login().await;
        } else {
            self.on_logout().await;
        }
    }

    async fn on_login(&mut self) {
        info!("Session authenticated, starting notification sync");

        // Failure is already recorded in the store
        let _ = self.refresh_unread_count().await;

        // Subscribe first: the hub may deliver as soon as the session is up
        if self.subscription.is_none() {
            let store = self.store.clone();
            let id = self.transport.subscribe(Arc::new(move |_event: &PushEvent| {
                store.dispatch(CounterAction::Increment);
            }));
            self.subscription = Some(id);
        }

        match self.transport.connect().await {
            Ok(()) => {}
            Err(e) if e.is_retryable() => {
                warn!(error = %e, "Notification hub not reachable yet, retrying in background");
            }
            Err(e) if e.is_config_error() => {
                error!(error = %e, "Notification hub misconfigured, realtime updates disabled");
            }
            Err(e) => {
                error!(error = %e, "Notification hub connection stopped");
            }
        }
    }

    async fn on_logout(&mut self) {
        info!("Session ended, stopping notification sync");
        self.store.dispatch(CounterAction::SetCount(0));
        self.transport.disconnect().await;
        self.unsubscribe();
    }

    /// Fetches the unread count from the server into the store.
    ///
    /// On failure the count is left as it was and the message lands in the
    /// store's `error`.
    pub async fn refresh_unread_count(&self) -> ClientResult<u32> {
        self.store.dispatch(CounterAction::SetLoading(true));

        let result = match self.api.unread_count().await {
            Ok(count) => {
                self.store.dispatch(CounterAction::ClearError);
                let state = self.store.dispatch(CounterAction::SetCount(count));
                debug!(count = state.unread_count(), "Unread count refreshed");
                Ok(state.unread_count())
            }
            Err(e) => {
                error!(error = %e, "Failed to fetch unread count");
                self.store.dispatch(CounterAction::SetError(Some(e.to_string())));
                Err(e)
            }
        };

        self.store.dispatch(CounterAction::SetLoading(false));
        result
    }

    /// Disconnects and unsubscribes regardless of auth state.
    pub async fn teardown(&mut self) {
        debug!("Tearing down notification sync");
        self.transport.disconnect().await;
        self.unsubscribe();
        self.torn_down = true;
    }

    /// Follows an auth signal until its sender goes away, then tears down.
    pub async fn follow_auth(mut self, mut auth_rx: watch::Receiver<bool>) {
        loop {
            let authenticated = *auth_rx.borrow_and_update();
            self.set_authenticated(authenticated).await;

            if auth_rx.changed().await.is_err() {
                break;
            }
        }
        self.teardown().await;
    }

    fn unsubscribe(&mut self) {
        if let Some(id) = self.subscription.take() {
            self.transport.unsubscribe(id);
        }
    }
}

impl Drop for NotificationSync {
    fn drop(&mut self) {
        if self.torn_down {
            return;
        }
        self.unsubscribe();

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let transport = self.transport.clone();
                handle.spawn(async move {
                    transport.disconnect().await;
                });
            }
            Err(_) => debug!("No runtime on drop, skipping hub disconnect"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::MemoryCredentials;
    use crate::testing::{FakeApi, FakeConnector, FakeTransport};
    use crate::transport::{HubEvent, HubOptions, HubTransport};
    use notify_core::ConnectionState;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use url::Url;

    fn sync_with(api: Arc<FakeApi>, transport: Arc<FakeTransport>) -> NotificationSync {
        NotificationSync::new(api, transport, CounterStore::new())
    }

    #[tokio::test]
    async fn test_login_push_logout_scenario() {
        let api = FakeApi::with_unread(7);
        let transport = FakeTransport::new();
        let mut sync = sync_with(api.clone(), transport.clone());

        sync.set_authenticated(true).await;
        assert_eq!(sync.store().unread_count(), 7);
        assert!(transport.is_active());
        assert_eq!(transport.subscriber_count(), 1);

        transport.push(PushEvent::new(None));
        assert_eq!(sync.store().unread_count(), 8);

        sync.set_authenticated(false).await;
        assert_eq!(sync.store().unread_count(), 0);
        assert_eq!(transport.state(), ConnectionState::Disconnected);
        assert_eq!(transport.disconnects.load(Ordering::SeqCst), 1);
        assert_eq!(transport.subscriber_count(), 0);

        // Pushes after logout no longer count
        transport.push(PushEvent::new(None));
        assert_eq!(sync.store().unread_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_push_on_fresh_session_is_counted() {
        let connector = FakeConnector::with_preloaded(
            &[true],
            vec![HubEvent::Push(PushEvent::new(None))],
        );
        let transport = Arc::new(HubTransport::new(
            Url::parse("https://example.com/hubs/notifications").unwrap(),
            connector.clone(),
            Arc::new(MemoryCredentials::with_token("tok")),
            HubOptions::default(),
        ));
        let mut sync = NotificationSync::new(
            FakeApi::with_unread(7),
            transport.clone(),
            CounterStore::new(),
        );

        sync.set_authenticated(true).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(sync.store().unread_count(), 8);
        assert!(transport.is_active());

        connector
            .session_sender(0)
            .send(HubEvent::Push(PushEvent::new(None)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(sync.store().unread_count(), 9);

        sync.set_authenticated(false).await;
        assert_eq!(sync.store().unread_count(), 0);
        assert_eq!(transport.state(), ConnectionState::Disconnected);
        assert!(connector.session_closed(0));
    }

    #[tokio::test]
    async fn test_fetch_failure_sets_error_and_keeps_count() {
        let api = FakeApi::new();
        *api.unread.lock().unwrap() = Err("server unavailable".into());
        let transport = FakeTransport::new();
        let mut sync = sync_with(api, transport.clone());
        sync.store().dispatch(CounterAction::SetCount(3));

        sync.set_authenticated(true).await;

        let state = sync.store().state();
        assert_eq!(state.unread_count(), 3);
        assert!(state.error().unwrap().contains("server unavailable"));
        assert!(!state.is_loading());

        // The transport still starts
        assert_eq!(transport.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refresh_clears_previous_error() {
        let api = FakeApi::new();
        *api.unread.lock().unwrap() = Err("boom".into());
        let mut sync = sync_with(api.clone(), FakeTransport::new());

        sync.set_authenticated(true).await;
        assert!(sync.store().state().error().is_some());

        *api.unread.lock().unwrap() = Ok(4);
        assert_eq!(sync.refresh_unread_count().await.unwrap(), 4);
        assert_eq!(sync.store().state().error(), None);
    }

    #[tokio::test]
    async fn test_only_edges_act() {
        let api = FakeApi::with_unread(1);
        let transport = FakeTransport::new();
        let mut sync = sync_with(api.clone(), transport.clone());

        sync.set_authenticated(false).await;
        assert_eq!(transport.disconnects.load(Ordering::SeqCst), 0);

        sync.set_authenticated(true).await;
        sync.set_authenticated(true).await;
        assert_eq!(api.unread_calls.load(Ordering::SeqCst), 1);
        assert_eq!(transport.connects.load(Ordering::SeqCst), 1);
        assert_eq!(transport.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_negative_server_count_clamps() {
        let mut sync = sync_with(FakeApi::with_unread(-5), FakeTransport::new());
        sync.set_authenticated(true).await;
        assert_eq!(sync.store().unread_count(), 0);
    }

    #[tokio::test]
    async fn test_teardown_always_disconnects() {
        let transport = FakeTransport::new();
        let mut sync = sync_with(FakeApi::new(), transport.clone());

        sync.teardown().await;
        assert_eq!(transport.disconnects.load(Ordering::SeqCst), 1);

        // Already torn down: drop does nothing more
        drop(sync);
        tokio::task::yield_now().await;
        assert_eq!(transport.disconnects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_drop_unsubscribes_and_schedules_disconnect() {
        let transport = FakeTransport::new();
        let mut sync = sync_with(FakeApi::with_unread(2), transport.clone());
        sync.set_authenticated(true).await;
        assert_eq!(transport.subscriber_count(), 1);

        drop(sync);
        assert_eq!(transport.subscriber_count(), 0);

        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        assert_eq!(transport.disconnects.load(Ordering::SeqCst), 1);
        assert_eq!(transport.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_follow_auth_until_sender_dropped() {
        let api = FakeApi::with_unread(7);
        let transport = FakeTransport::new();
        let sync = sync_with(api, transport.clone());
        let store = sync.store().clone();

        let (auth_tx, auth_rx) = watch::channel(false);
        let task = tokio::spawn(sync.follow_auth(auth_rx));

        auth_tx.send(true).unwrap();
        drop(auth_tx);
        task.await.unwrap();

        assert_eq!(store.unread_count(), 7);
        assert_eq!(transport.connects.load(Ordering::SeqCst), 1);
        assert!(transport.disconnects.load(Ordering::SeqCst) >= 1);
        assert_eq!(transport.subscriber_count(), 0);
    }
}
