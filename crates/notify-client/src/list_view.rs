//! # Notification List
//!
//! Headless model behind the notification dropdown.
//!
//! Opening the list fetches the latest page and marks everything on it as
//! read, one request per unread item. The list never touches the unread
//! counter; the badge catches up on the next count refresh.

use std::sync::Arc;
use tracing::{debug, warn};

use notify_core::{Notification, NotificationId, DEFAULT_PAGE_SIZE};

use crate::api::NotificationApi;
use crate::config::ClientConfig;
use crate::error::ClientResult;

/// Cached notifications shown in the dropdown.
pub struct NotificationList {
    api: Arc<dyn NotificationApi>,
    page_size: u32,
    items: Vec<Notification>,
    error: Option<String>,
    is_loading: bool,
}

impl NotificationList {
    pub fn new(api: Arc<dyn NotificationApi>) -> Self {
        NotificationList {
            api,
            page_size: DEFAULT_PAGE_SIZE,
            items: Vec::new(),
            error: None,
            is_loading: false,
        }
    }

    pub fn from_config(api: Arc<dyn NotificationApi>, config: &ClientConfig) -> Self {
        Self::new(api).with_page_size(config.list.page_size)
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Fetches the latest page and marks its unread items as read.
    ///
    /// If the fetch fails the cached items stay as they were. Failed
    /// mark-as-read calls are recorded in `error`; the items are shown as
    /// read either way.
    pub async fn open(&mut self) -> ClientResult<()> {
        self.is_loading = true;
        self.error = None;

        let page = match self.api.list(self.page_size).await {
            Ok(page) => page,
            Err(e) => {
                warn!(error = %e, "Failed to fetch notifications");
                self.error = Some(e.to_string());
                self.is_loading = false;
                return Err(e);
            }
        };

        let mut items = page.items;
        let unread: Vec<NotificationId> = items
            .iter()
            .filter(|n| !n.is_read)
            .map(|n| n.id.clone())
            .collect();

        let report = self.api.mark_all_as_read(&unread).await;
        if !report.is_complete() {
            self.error = Some(format!(
                "Failed to mark {} of {} notifications as read",
                report.failed.len(),
                unread.len()
            ));
        }

        items.iter_mut().for_each(Notification::mark_read);
        debug!(count = items.len(), marked = report.marked.len(), "Notification list opened");

        self.items = items;
        self.is_loading = false;
        Ok(())
    }

    /// Deletes a notification and drops it from the cache.
    pub async fn delete(&mut self, id: &NotificationId) -> ClientResult<()> {
        match self.api.delete(id).await {
            Ok(()) => {
                self.items.retain(|n| &n.id != id);
                Ok(())
            }
            Err(e) => {
                warn!(id = %id, error = %e, "Failed to delete notification");
                self.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    pub fn items(&self) -> &[Notification] {
        &self.items
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// Unread items in the cache.
    pub fn unread_in_view(&self) -> usize {
        self.items.iter().filter(|n| !n.is_read).count()
    }
}
