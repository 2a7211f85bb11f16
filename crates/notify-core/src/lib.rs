//! # notify-core: Pure Types for the Notification Client
//!
//! This crate holds everything about notifications that does not touch the
//! network: the wire types, the unread counter reducer, and input validation.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Notify Client Architecture                         │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Web Frontend (dropdown, badge)                  │   │
//! │  │         reads UnreadCounterState / Notification (ts-rs)         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │           notify-client (REST, SignalR, sync hook)              │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ notify-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────────┐  ┌─────────────┐             │   │
//! │  │   │   types   │  │    counter    │  │ validation  │             │   │
//! │  │   │Notification│ │UnreadCounter  │  │ page size,  │             │   │
//! │  │   │ PushEvent │  │ CounterAction │  │ ids         │             │   │
//! │  │   └───────────┘  └───────────────┘  └─────────────┘             │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO NETWORK • PURE FUNCTIONS                          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Notification, PushEvent, Page, ConnectionState
//! - [`counter`] - Unread counter state and its reducer
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use notify_core::counter::{CounterAction, UnreadCounterState};
//!
//! let state = UnreadCounterState::default()
//!     .reduce(CounterAction::SetCount(7))
//!     .reduce(CounterAction::Increment);
//! assert_eq!(state.unread_count(), 8);
//!
//! // Negative counts clamp to zero
//! let state = state.reduce(CounterAction::SetCount(-5));
//! assert_eq!(state.unread_count(), 0);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod counter;
pub mod error;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use counter::{CounterAction, UnreadCounterState};
pub use error::{CoreError, CoreResult, ValidationError};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Number of notifications the dropdown fetches when it opens.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Largest page the list endpoint is asked for.
pub const MAX_PAGE_SIZE: u32 = 100;
