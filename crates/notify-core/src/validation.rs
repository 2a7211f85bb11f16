//! # Validation Module
//!
//! Checks run before a value is put on the wire.
//!
//! ## Usage
//! ```rust
//! use notify_core::validation::{validate_notification_id, validate_page_size};
//!
//! validate_page_size(50).unwrap();
//! validate_notification_id("42").unwrap();
//! assert!(validate_notification_id("../admin").is_err());
//! ```

use crate::error::ValidationError;
use crate::MAX_PAGE_SIZE;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validates a list page size.
///
/// ## Rules
/// - Between 1 and [`MAX_PAGE_SIZE`]
pub fn validate_page_size(page_size: u32) -> ValidationResult<()> {
    if page_size == 0 || page_size > MAX_PAGE_SIZE {
        return Err(ValidationError::OutOfRange {
            field: "page_size".to_string(),
            min: 1,
            max: i64::from(MAX_PAGE_SIZE),
        });
    }
    Ok(())
}

/// Validates a notification id before it is placed in a REST path.
///
/// ## Rules
/// - Must not be empty
/// - Must not contain whitespace, `/`, `?`, `#` or `..`
pub fn validate_notification_id(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "id".to_string(),
        });
    }

    let path_unsafe = id
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '/' | '?' | '#'))
        || id.contains("..");

    if path_unsafe {
        return Err(ValidationError::InvalidFormat {
            field: "id".to_string(),
            reason: "must be a single path segment".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
