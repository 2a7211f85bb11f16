//! # Error Types
//!
//! Domain-specific error types for notify-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  notify-core errors (this file)                                        │
//! │  ├── CoreError        - Payload / domain errors                        │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  notify-client errors (separate crate)                                 │
//! │  └── ClientError      - REST, realtime and config failures             │
//! │                                                                         │
//! │  Flow: ValidationError → ClientError → counter `error`                 │
//! │        CoreError (push payload) → logged, push still counted           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Domain errors raised while interpreting notification data.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A push or REST payload could not be read as a notification.
    #[error("Invalid notification payload: {0}")]
    InvalidPayload(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::InvalidPayload(err.to_string())
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Invalid format.
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
