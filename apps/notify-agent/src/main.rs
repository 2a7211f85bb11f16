//! # Notify Agent
//!
//! Headless host for one notification session.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Notify Agent                                   │
//! │                                                                         │
//! │  notify.toml + NOTIFY_* ──► ClientConfig                               │
//! │                                                                         │
//! │  token file present? ──► auth watch (polled) ──► NotificationSync      │
//! │                                                       │                 │
//! │                       ┌───────────────────────────────┤                 │
//! │                       ▼                               ▼                 │
//! │             GET unreadCount (REST)         SignalR hub (push)          │
//! │                       │                               │                 │
//! │                       └──────────► CounterStore ◄─────┘                 │
//! │                                         │                               │
//! │                                         ▼                               │
//! │                                   info! log line                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Usage: `notify-agent [path/to/notify.toml]`. Writing a token to the token
//! file logs in; removing it logs out. Ctrl+C tears the session down.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use notify_client::{
    ClientConfig, CounterStore, CredentialStore, FileCredentials, HttpNotificationApi,
    HubTransport, NotificationSync, NotificationTransport,
};
use notify_core::{ConnectionState, UnreadCounterState};

/// How often the token file is checked for login/logout.
const AUTH_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = ClientConfig::load_or_default(config_path);
    config.validate().context("Invalid configuration")?;

    let token_path = config
        .token_file()
        .context("Could not determine token file location")?;
    info!(token_file = ?token_path, "Configuration loaded");

    let credentials = Arc::new(FileCredentials::new(token_path));
    let api = Arc::new(HttpNotificationApi::from_config(&config, credentials.clone())?);
    let transport = Arc::new(HubTransport::from_config(&config, credentials.clone())?);
    let store = CounterStore::new();

    tokio::spawn(log_counter(store.subscribe()));
    tokio::spawn(log_connection(transport.watch_state()));

    let (auth_tx, auth_rx) = watch::channel(credentials.bearer_token().is_some());
    let poller = tokio::spawn(poll_credentials(credentials, auth_tx));

    let sync = NotificationSync::new(api, transport, store);
    let session = tokio::spawn(sync.follow_auth(auth_rx));

    shutdown_signal().await;

    // Dropping the auth sender ends follow_auth, which tears down
    poller.abort();
    if let Err(e) = session.await {
        warn!(error = %e, "Notification session ended abnormally");
    }

    info!("Notify agent stopped");
    Ok(())
}

/// Initializes the tracing subscriber.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=notify_client=trace` - Trace the client crate only
/// - Default: `info,notify=debug`
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,notify=debug"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Publishes whether a credential is present.
async fn poll_credentials(credentials: Arc<FileCredentials>, auth_tx: watch::Sender<bool>) {
    let mut ticker = tokio::time::interval(AUTH_POLL_INTERVAL);
    loop {
        ticker.tick().await;
        let authenticated = credentials.bearer_token().is_some();
        auth_tx.send_if_modified(|current| {
            let changed = *current != authenticated;
            *current = authenticated;
            changed
        });
    }
}

async fn log_counter(mut state_rx: watch::Receiver<UnreadCounterState>) {
    while state_rx.changed().await.is_ok() {
        let state = state_rx.borrow_and_update().clone();
        info!(
            count = state.unread_count(),
            loading = state.is_loading(),
            error = state.error().unwrap_or(""),
            "Unread counter"
        );
    }
}

async fn log_connection(mut state_rx: watch::Receiver<ConnectionState>) {
    while state_rx.changed().await.is_ok() {
        let state = *state_rx.borrow_and_update();
        info!(%state, "Notification hub");
    }
}

/// Waits for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
