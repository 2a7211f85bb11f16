//! # notify-client: Notification Client Runtime
//!
//! Everything in the notification client that talks to the server: the REST
//! endpoints, the realtime hub, and the orchestration that keeps the unread
//! badge honest across login and logout.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Notification Client                                │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                NotificationSync (orchestrator)                   │  │
//! │  │                                                                  │  │
//! │  │  login  → fetch count, connect hub, push → Increment             │  │
//! │  │  logout → count 0, disconnect hub                                │  │
//! │  └──────────┬──────────────────────┬────────────────────┬───────────┘  │
//! │             ▼                      ▼                    ▼               │
//! │  ┌────────────────────┐ ┌────────────────────┐ ┌────────────────────┐  │
//! │  │ NotificationApi    │ │ NotificationTransport│ │ CounterStore     │  │
//! │  │                    │ │                    │ │                    │  │
//! │  │ REST via reqwest   │ │ SignalR over WS    │ │ reducer + watch    │  │
//! │  │ bearer per request │ │ retry policy       │ │ channel            │  │
//! │  └────────────────────┘ └────────────────────┘ └────────────────────┘  │
//! │                                                                         │
//! │  ┌────────────────────┐ ┌────────────────────┐ ┌────────────────────┐  │
//! │  │ NotificationList   │ │ CredentialStore    │ │ ClientConfig       │  │
//! │  │ dropdown model     │ │ memory / file      │ │ TOML + env         │  │
//! │  └────────────────────┘ └────────────────────┘ └────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`api`] - REST client for the notification endpoints
//! - [`config`] - Client configuration (server URLs, timings, retry)
//! - [`credentials`] - Bearer credential lookup
//! - [`error`] - Client error types
//! - [`list_view`] - Dropdown list model
//! - [`protocol`] - SignalR JSON hub protocol
//! - [`retry`] - Reconnect policies
//! - [`store`] - Process-wide unread counter
//! - [`sync_hook`] - Login/logout orchestration
//! - [`transport`] - Realtime hub connection with reconnection
//!
//! ## Usage
//!
//! ```rust,ignore
//! use notify_client::{ClientConfig, CounterStore, FileCredentials, HttpNotificationApi,
//!     HubTransport, NotificationSync};
//! use std::sync::Arc;
//!
//! let config = ClientConfig::load_or_default(None);
//! let credentials = Arc::new(FileCredentials::new(config.token_file().unwrap()));
//!
//! let api = Arc::new(HttpNotificationApi::from_config(&config, credentials.clone())?);
//! let transport = Arc::new(HubTransport::from_config(&config, credentials)?);
//! let store = CounterStore::new();
//!
//! let mut sync = NotificationSync::new(api, transport, store.clone());
//! sync.set_authenticated(true).await;
//! println!("Unread: {}", store.unread_count());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod api;
pub mod config;
pub mod credentials;
pub mod error;
pub mod list_view;
pub mod protocol;
pub mod retry;
pub mod store;
pub mod sync_hook;
pub mod transport;

#[cfg(test)]
mod testing;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use api::{HttpNotificationApi, MarkReadReport, NotificationApi};
pub use config::{ClientConfig, RetryStrategy};
pub use credentials::{CredentialStore, FileCredentials, MemoryCredentials};
pub use error::{ClientError, ClientResult};
pub use list_view::NotificationList;
pub use retry::{ExponentialRetry, FixedDelay, RetryPolicy};
pub use store::CounterStore;
pub use sync_hook::NotificationSync;
pub use transport::{
    HubConnector, HubEvent, HubOptions, HubSession, HubTransport, NotificationTransport,
    PushHandler, SubscriptionId, WebSocketConnector,
};
