//! # Unread Counter
//!
//! The unread counter state and its reducer.
//!
//! ## Transitions
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     UnreadCounterState Reducer                          │
//! │                                                                         │
//! │  state { unread_count: u32, is_loading: bool, error: Option<String> }   │
//! │                                                                         │
//! │  SetCount(n)     unread_count = max(n, 0)                              │
//! │  Increment       unread_count += 1                                     │
//! │  Decrement       unread_count -= 1   (no-op at 0)                      │
//! │  Reset           unread_count = 0                                      │
//! │  SetLoading(b)   is_loading = b                                        │
//! │  SetError(e)     error = e                                             │
//! │  ClearError      error = None                                          │
//! │                                                                         │
//! │  Every transition is total. The flags never touch the count.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The count is a `u32`, so it cannot go negative no matter which sequence of
//! actions is applied.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// =============================================================================
// Actions
// =============================================================================

/// An action understood by [`UnreadCounterState::reduce`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CounterAction {
    /// Replace the count with a server-reported value. Negative values clamp
    /// to zero.
    SetCount(i64),
    /// One more unread notification.
    Increment,
    /// One fewer unread notification.
    Decrement,
    /// Back to zero.
    Reset,
    /// Toggle the loading flag.
    SetLoading(bool),
    /// Set or clear the error message.
    SetError(Option<String>),
    /// Clear the error message.
    ClearError,
}

// =============================================================================
// State
// =============================================================================

/// Unread counter state shown by the notification badge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UnreadCounterState {
    unread_count: u32,
    is_loading: bool,
    error: Option<String>,
}

impl UnreadCounterState {
    /// Returns the number of unread notifications.
    #[inline]
    pub fn unread_count(&self) -> u32 {
        self.unread_count
    }

    /// Returns true while the initial count is being fetched.
    #[inline]
    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// Returns the last error message, if any.
    #[inline]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Returns the state after applying `action`.
    pub fn reduce(mut self, action: CounterAction) -> Self {
        self.apply(action);
        self
    }

    /// Applies `action` in place.
    pub fn apply(&mut self, action: CounterAction) {
        match action {
            CounterAction::SetCount(n) => self.set_count(n),
            CounterAction::Increment => self.increment(),
            CounterAction::Decrement => self.decrement(),
            CounterAction::Reset => self.reset(),
            CounterAction::SetLoading(loading) => self.set_loading(loading),
            CounterAction::SetError(error) => self.set_error(error),
            CounterAction::ClearError => self.clear_error(),
        }
    }

    /// Sets the count, clamping into `0..=u32::MAX`.
    pub fn set_count(&mut self, n: i64) {
        self.unread_count = n.clamp(0, i64::from(u32::MAX)) as u32;
    }

    /// Adds one.
    pub fn increment(&mut self) {
        self.unread_count = self.unread_count.saturating_add(1);
    }

    /// Subtracts one unless already zero.
    pub fn decrement(&mut self) {
        self.unread_count = self.unread_count.saturating_sub(1);
    }

    /// Sets the count to zero.
    pub fn reset(&mut self) {
        self.unread_count = 0;
    }

    pub fn set_loading(&mut self, loading: bool) {
        self.is_loading = loading;
    }

    pub fn set_error(&mut self, error: Option<String>) {
        self.error = error;
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }
}
