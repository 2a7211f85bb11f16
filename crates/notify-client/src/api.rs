//! # Notification REST API
//!
//! Thin client for the server's notification endpoints.
//!
//! ## Endpoints
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Notification REST API                             │
//! │                                                                         │
//! │  GET    {base}/notifications?pageSize=N   → page of notifications      │
//! │  GET    {base}/notifications/unreadCount  → integer                    │
//! │  PUT    {base}/notifications/{id}/read    → ack                        │
//! │  DELETE {base}/notifications/{id}         → ack                        │
//! │                                                                         │
//! │  Every request carries `Authorization: Bearer <token>` when the        │
//! │  credential store has one. Non-2xx → ClientError::HttpStatus.          │
//! │  No call is retried here; callers surface the error to state.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use notify_core::validation::{validate_notification_id, validate_page_size};
use notify_core::{Notification, NotificationId, Page};

use crate::config::ClientConfig;
use crate::credentials::CredentialStore;
use crate::error::{ClientError, ClientResult};

// =============================================================================
// API Trait
// =============================================================================

/// Outcome of a bulk mark-as-read.
#[derive(Debug, Default)]
pub struct MarkReadReport {
    /// Ids the server acknowledged.
    pub marked: Vec<NotificationId>,

    /// Ids that failed, with the reason.
    pub failed: Vec<(NotificationId, ClientError)>,
}

impl MarkReadReport {
    /// Returns true if every call succeeded.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Operations the client needs from the notification server.
#[async_trait]
pub trait NotificationApi: Send + Sync {
    /// Fetches the most recent `page_size` notifications.
    async fn list(&self, page_size: u32) -> ClientResult<Page<Notification>>;

    /// Fetches the server's unread count.
    async fn unread_count(&self) -> ClientResult<i64>;

    /// Marks one notification as read.
    async fn mark_as_read(&self, id: &NotificationId) -> ClientResult<()>;

    /// Deletes one notification.
    async fn delete(&self, id: &NotificationId) -> ClientResult<()>;

    /// Marks several notifications as read.
    ///
    /// There is no batch endpoint: this issues one `mark_as_read` per id,
    /// sequentially, in order. A failure does not stop the remaining calls.
    async fn mark_all_as_read(&self, ids: &[NotificationId]) -> MarkReadReport {
        let mut report = MarkReadReport::default();
        for id in ids {
            match self.mark_as_read(id).await {
                Ok(()) => report.marked.push(id.clone()),
                Err(e) => {
                    warn!(id = %id, error = %e, "Failed to mark notification as read");
                    report.failed.push((id.clone(), e));
                }
            }
        }
        report
    }
}

// =============================================================================
// HTTP Implementation
// =============================================================================

/// Body of `GET /notifications/unreadCount`: a bare number or `{ "count": n }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum UnreadCountBody {
    Bare(i64),
    Wrapped {
        #[serde(alias = "unreadCount")]
        count: i64,
    },
}

impl From<UnreadCountBody> for i64 {
    fn from(body: UnreadCountBody) -> Self {
        match body {
            UnreadCountBody::Bare(n) | UnreadCountBody::Wrapped { count: n } => n,
        }
    }
}

/// [`NotificationApi`] over HTTP using reqwest.
pub struct HttpNotificationApi {
    client: Client,
    base_url: Url,
    credentials: Arc<dyn CredentialStore>,
}

impl HttpNotificationApi {
    /// Creates a client for the API rooted at `base_url`.
    pub fn new(
        base_url: &str,
        credentials: Arc<dyn CredentialStore>,
        timeout: Duration,
    ) -> ClientResult<Self> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(format!(
                "{} cannot be used as a base URL",
                base_url
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(HttpNotificationApi {
            client,
            base_url,
            credentials,
        })
    }

    /// Creates a client from configuration.
    pub fn from_config(
        config: &ClientConfig,
        credentials: Arc<dyn CredentialStore>,
    ) -> ClientResult<Self> {
        let base_url = config
            .api_base_url()
            .ok_or_else(|| ClientError::InvalidConfig("API base URL required".into()))?;
        Self::new(base_url, credentials, config.request_timeout())
    }

    /// Joins path segments onto the base URL.
    fn endpoint(&self, segments: &[&str]) -> ClientResult<Url> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| ClientError::InvalidUrl("base URL cannot have a path".into()))?;
            path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }

    /// Attaches the bearer credential, if there is one.
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.credentials.bearer_token() {
            Some(token) => request.bearer_auth(token),
            None => {
                debug!("No bearer credential, sending request unauthenticated");
                request
            }
        }
    }

    /// Sends a request and turns non-2xx statuses into errors.
    async fn send(&self, request: RequestBuilder, url: &Url) -> ClientResult<Response> {
        let response = self.authorize(request).send().await?;
        let status = response.status();

        if !status.is_success() {
            warn!(status = status.as_u16(), path = %url.path(), "Notification API request failed");
            return Err(ClientError::HttpStatus {
                status: status.as_u16(),
                path: url.path().to_string(),
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl NotificationApi for HttpNotificationApi {
    async fn list(&self, page_size: u32) -> ClientResult<Page<Notification>> {
        validate_page_size(page_size)?;

        let mut url = self.endpoint(&["notifications"])?;
        url.query_pairs_mut()
            .append_pair("pageSize", &page_size.to_string());

        let response = self.send(self.client.get(url.clone()), &url).await?;
        let page: Page<Notification> = response.json().await?;

        debug!(count = page.items.len(), "Fetched notifications");
        Ok(page)
    }

    async fn unread_count(&self) -> ClientResult<i64> {
        let url = self.endpoint(&["notifications", "unreadCount"])?;
        let response = self.send(self.client.get(url.clone()), &url).await?;
        let body: UnreadCountBody = response.json().await?;

        let count = i64::from(body);
        debug!(count, "Fetched unread count");
        Ok(count)
    }

    async fn mark_as_read(&self, id: &NotificationId) -> ClientResult<()> {
        validate_notification_id(id.as_str())?;

        let url = self.endpoint(&["notifications", id.as_str(), "read"])?;
        self.send(self.client.put(url.clone()), &url).await?;

        debug!(id = %id, "Marked notification as read");
        Ok(())
    }

    async fn delete(&self, id: &NotificationId) -> ClientResult<()> {
        validate_notification_id(id.as_str())?;

        let url = self.endpoint(&["notifications", id.as_str()])?;
        self.send(self.client.delete(url.clone()), &url).await?;

        debug!(id = %id, "Deleted notification");
        Ok(())
    }
}
