//! # Client Error Types
//!
//! Error types for REST, realtime and configuration failures.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Client Error Categories                            │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  REST (Network) │  │   Realtime      │  │   Configuration         │ │
//! │  │                 │  │  (Connection)   │  │                         │ │
//! │  │  Network        │  │  ConnectionFailed│ │  InvalidConfig          │ │
//! │  │  HttpStatus     │  │  Handshake      │  │  InvalidUrl             │ │
//! │  │  Decode         │  │  WebSocket      │  │  ConfigLoadFailed       │ │
//! │  │                 │  │  Timeout        │  │  ConfigSaveFailed       │ │
//! │  │                 │  │  Disconnected   │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  REST errors land in the counter's `error` field and are not retried.  │
//! │  Realtime errors are logged and retried by the transport's policy.     │
//! │  AuthMissing is a silent no-op for connect().                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use notify_core::ValidationError;

/// Result type alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Client error type covering all possible failures.
#[derive(Debug, Error)]
pub enum ClientError {
    // =========================================================================
    // REST Errors
    // =========================================================================
    /// Request could not be sent or the response could not be read.
    #[error("Network error: {0}")]
    Network(String),

    /// Server answered with a non-success status.
    #[error("Request to {path} failed with status {status}")]
    HttpStatus { status: u16, path: String },

    /// Response body did not match the expected shape.
    #[error("Failed to decode response: {0}")]
    Decode(String),

    // =========================================================================
    // Realtime Errors
    // =========================================================================
    /// Failed to establish the WebSocket connection.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// SignalR handshake was rejected or malformed.
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// WebSocket protocol error.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Connection or keepalive timeout.
    #[error("Timed out after {0} seconds")]
    Timeout(u64),

    /// Connection closed.
    #[error("Disconnected from notification hub")]
    Disconnected,

    /// No bearer credential in client storage.
    #[error("No bearer credential available")]
    AuthMissing,

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid client configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid server URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Other Errors
    // =========================================================================
    /// Input rejected before it reached the wire.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Internal client error.
    #[error("Internal error: {0}")]
    Internal(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            ClientError::HttpStatus {
                status: status.as_u16(),
                path: err.url().map(|u| u.path().to_string()).unwrap_or_default(),
            }
        } else {
            ClientError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Decode(err.to_string())
    }
}

impl From<url::ParseError> for ClientError {
    fn from(err: url::ParseError) -> Self {
        ClientError::InvalidUrl(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match err {
            WsError::ConnectionClosed => ClientError::Disconnected,
            WsError::AlreadyClosed => ClientError::Disconnected,
            WsError::Io(io) => ClientError::ConnectionFailed(io.to_string()),
            WsError::Http(response) => {
                ClientError::ConnectionFailed(format!("HTTP {}", response.status()))
            }
            other => ClientError::WebSocket(other.to_string()),
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        ClientError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for ClientError {
    fn from(err: toml::de::Error) -> Self {
        ClientError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for ClientError {
    fn from(err: toml::ser::Error) -> Self {
        ClientError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl ClientError {
    /// Returns true if the realtime loop should try again after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClientError::ConnectionFailed(_)
                | ClientError::Handshake(_)
                | ClientError::WebSocket(_)
                | ClientError::Timeout(_)
                | ClientError::Disconnected
        )
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            ClientError::InvalidConfig(_)
                | ClientError::InvalidUrl(_)
                | ClientError::ConfigLoadFailed(_)
                | ClientError::ConfigSaveFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(ClientError::ConnectionFailed("refused".into()).is_retryable());
        assert!(ClientError::Disconnected.is_retryable());
        assert!(ClientError::Timeout(10).is_retryable());

        assert!(!ClientError::AuthMissing.is_retryable());
        assert!(!ClientError::Network("dns".into()).is_retryable());
        assert!(!ClientError::InvalidConfig("bad".into()).is_retryable());
    }

    #[test]
    fn test_categories() {
        assert!(ClientError::InvalidUrl("x".into()).is_config_error());
        assert!(ClientError::ConfigLoadFailed("missing".into()).is_config_error());
        assert!(!ClientError::AuthMissing.is_config_error());
        assert!(!ClientError::HttpStatus {
            status: 500,
            path: "/notifications".into()
        }
        .is_config_error());
    }

    #[test]
    fn test_error_display() {
        let err = ClientError::HttpStatus {
            status: 503,
            path: "/notifications/unreadCount".into(),
        };
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("unreadCount"));
    }
}
