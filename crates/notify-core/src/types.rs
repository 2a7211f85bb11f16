//! # Domain Types
//!
//! Types shared by the REST client, the realtime transport and the web
//! frontend.
//!
//! ## Type Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  Notification   │   │   PushEvent     │   │ ConnectionState │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id             │   │  notification?  │   │  Disconnected   │       │
//! │  │  message        │   │  received_at    │   │  Connecting     │       │
//! │  │  is_read        │   └─────────────────┘   │  Connected      │       │
//! │  │  created_at     │                         └─────────────────┘       │
//! │  └─────────────────┘   ┌─────────────────┐                             │
//! │                        │    Page<T>      │  bare array or             │
//! │                        │  items, total?  │  { items, totalCount }     │
//! │                        └─────────────────┘                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Notifications are server-owned. The client only keeps a transient copy
//! for display.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};

// =============================================================================
// Notification ID
// =============================================================================

/// Server-assigned notification identifier.
///
/// The server may send ids as JSON strings or integers. Both are accepted and
/// carried as an opaque string, which is also how they appear in REST paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, TS)]
#[ts(export)]
pub struct NotificationId(String);

impl NotificationId {
    /// Creates an id from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        NotificationId(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NotificationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NotificationId {
    fn from(id: &str) -> Self {
        NotificationId(id.to_string())
    }
}

impl From<String> for NotificationId {
    fn from(id: String) -> Self {
        NotificationId(id)
    }
}

impl From<i64> for NotificationId {
    fn from(id: i64) -> Self {
        NotificationId(id.to_string())
    }
}

impl<'de> Deserialize<'de> for NotificationId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Signed(i64),
            Unsigned(u64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(s) => NotificationId(s),
            RawId::Signed(n) => NotificationId(n.to_string()),
            RawId::Unsigned(n) => NotificationId(n.to_string()),
        })
    }
}

// =============================================================================
// Notification
// =============================================================================

/// A single notification as returned by the REST API and pushed by the hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Notification {
    /// Server-assigned identifier.
    pub id: NotificationId,

    /// Text shown in the dropdown.
    pub message: String,

    /// Whether the user has seen it.
    #[serde(default)]
    pub is_read: bool,

    /// When the server created it.
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Builds a notification from an arbitrary JSON value (e.g. a hub
    /// invocation argument).
    pub fn from_value(value: Value) -> CoreResult<Self> {
        serde_json::from_value(value).map_err(CoreError::from)
    }

    /// Marks this copy as read.
    pub fn mark_read(&mut self) {
        self.is_read = true;
    }
}

// =============================================================================
// Push Event
// =============================================================================

/// One "notification received" signal from the realtime hub.
///
/// The server may push with no payload at all (just "something new"), so the
/// notification is optional.
#[derive(Debug, Clone, PartialEq)]
pub struct PushEvent {
    /// The pushed notification, if the server sent one.
    pub notification: Option<Notification>,

    /// Local receipt time.
    pub received_at: DateTime<Utc>,
}

impl PushEvent {
    /// Creates an event stamped with the current time.
    pub fn new(notification: Option<Notification>) -> Self {
        PushEvent {
            notification,
            received_at: Utc::now(),
        }
    }

    /// Interprets hub invocation arguments.
    ///
    /// No arguments or a `null` first argument is a zero-payload event. A
    /// first argument that is not a notification is an error.
    pub fn from_arguments(arguments: Vec<Value>) -> CoreResult<Self> {
        match arguments.into_iter().next() {
            None | Some(Value::Null) => Ok(PushEvent::new(None)),
            Some(value) => Notification::from_value(value).map(|n| PushEvent::new(Some(n))),
        }
    }
}

// =============================================================================
// Page
// =============================================================================

/// A page of results from a list endpoint.
///
/// Accepts either a bare JSON array or `{ "items": [...], "totalCount": n }`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "PageRepr<T>")]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Page<T> {
    /// Items on this page, newest first.
    pub items: Vec<T>,

    /// Total number of items server-side, when reported.
    pub total_count: Option<u64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
enum PageRepr<T> {
    Bare(Vec<T>),
    Wrapped {
        #[serde(alias = "data")]
        items: Vec<T>,
        #[serde(default, rename = "totalCount")]
        total_count: Option<u64>,
    },
}

impl<T> From<PageRepr<T>> for Page<T> {
    fn from(repr: PageRepr<T>) -> Self {
        match repr {
            PageRepr::Bare(items) => Page {
                items,
                total_count: None,
            },
            PageRepr::Wrapped { items, total_count } => Page { items, total_count },
        }
    }
}

impl<T> Page<T> {
    /// Returns true if the page has no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// =============================================================================
// Connection State
// =============================================================================

/// Connection state of the realtime push channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum ConnectionState {
    /// Not connected, no attempt in flight.
    #[default]
    Disconnected,
    /// Attempting to connect.
    Connecting,
    /// Connected and receiving pushes.
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
        }
    }
}
