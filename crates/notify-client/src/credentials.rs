//! # Bearer Credentials
//!
//! Lookup of the bearer token used by the REST client and the realtime hub.
//!
//! The token is read at call time, every time. A REST call reads it before
//! sending. The transport reads it before each connection attempt, so a
//! rotated token is picked up on the next reconnect.
//!
//! ```text
//! ┌──────────────────┐   bearer_token()   ┌────────────────────────────┐
//! │ HttpNotification │ ─────────────────► │ CredentialStore            │
//! │ Api / HubTransport│                   │  • MemoryCredentials       │
//! └──────────────────┘ ◄──────────────── │  • FileCredentials         │
//!                        Option<String>   └────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

/// Source of the bearer credential.
///
/// `None` means the user is not signed in. That is not an error.
pub trait CredentialStore: Send + Sync {
    /// Returns the current bearer token, if any.
    fn bearer_token(&self) -> Option<String>;
}

// =============================================================================
// In-Memory Credentials
// =============================================================================

/// Token slot held in memory, shared between clones.
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentials {
    token: Arc<RwLock<Option<String>>>,
}

impl MemoryCredentials {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `token`.
    pub fn with_token(token: impl Into<String>) -> Self {
        let store = Self::new();
        store.set(token);
        store
    }

    /// Stores a token (e.g. after login or a refresh).
    pub fn set(&self, token: impl Into<String>) {
        if let Ok(mut slot) = self.token.write() {
            *slot = Some(token.into());
        }
    }

    /// Forgets the token (e.g. on logout).
    pub fn clear(&self) {
        if let Ok(mut slot) = self.token.write() {
            *slot = None;
        }
    }
}

impl CredentialStore for MemoryCredentials {
    fn bearer_token(&self) -> Option<String> {
        self.token
            .read()
            .ok()
            .and_then(|slot| slot.clone())
            .filter(|t| !t.is_empty())
    }
}

// =============================================================================
// File Credentials
// =============================================================================

/// Reads the token from a file on every lookup.
///
/// A missing, unreadable or blank file means "no credential".
#[derive(Debug, Clone)]
pub struct FileCredentials {
    path: PathBuf,
}

impl FileCredentials {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileCredentials { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl CredentialStore for FileCredentials {
    fn bearer_token(&self) -> Option<String> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => {
                let token = contents.trim();
                (!token.is_empty()).then(|| token.to_string())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = ?self.path, "No token file");
                None
            }
            Err(e) => {
                warn!(path = ?self.path, error = %e, "Failed to read token file");
                None
            }
        }
    }
}
