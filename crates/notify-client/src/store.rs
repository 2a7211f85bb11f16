//! # Counter Store
//!
//! Process-wide holder of the unread counter state.
//!
//! ```text
//! ┌──────────────┐  dispatch(action)  ┌──────────────────────┐  watch   ┌──────────┐
//! │ Sync hook    │ ─────────────────► │ CounterStore         │ ───────► │ Badge UI │
//! │ push handler │                    │  reduce(state, act)  │          │ agent log│
//! └──────────────┘                    └──────────────────────┘          └──────────┘
//! ```
//!
//! The state can only change through `dispatch`. Clones share the state.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

use notify_core::{CounterAction, UnreadCounterState};

/// Shared unread counter.
#[derive(Debug, Clone)]
pub struct CounterStore {
    state_tx: Arc<watch::Sender<UnreadCounterState>>,
}

impl Default for CounterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CounterStore {
    /// Creates a store with a zero count.
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(UnreadCounterState::default());
        CounterStore {
            state_tx: Arc::new(state_tx),
        }
    }

    /// Applies an action and returns the resulting state.
    pub fn dispatch(&self, action: CounterAction) -> UnreadCounterState {
        debug!(action = ?action, "Counter action");
        self.state_tx.send_modify(|state| state.apply(action));
        self.state()
    }

    /// Returns a snapshot of the current state.
    pub fn state(&self) -> UnreadCounterState {
        self.state_tx.borrow().clone()
    }

    /// Convenience accessor for the badge.
    pub fn unread_count(&self) -> u32 {
        self.state_tx.borrow().unread_count()
    }

    /// Observes every state change.
    pub fn subscribe(&self) -> watch::Receiver<UnreadCounterState> {
        self.state_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_updates_shared_state() {
        let store = CounterStore::new();
        let clone = store.clone();

        store.dispatch(CounterAction::SetCount(3));
        clone.dispatch(CounterAction::Increment);

        assert_eq!(store.unread_count(), 4);
        assert_eq!(clone.state().unread_count(), 4);
    }

    #[test]
    fn test_dispatch_never_goes_negative() {
        let store = CounterStore::new();
        store.dispatch(CounterAction::Decrement);
        let state = store.dispatch(CounterAction::SetCount(-5));
        assert_eq!(state.unread_count(), 0);
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let store = CounterStore::new();
        let mut rx = store.subscribe();

        store.dispatch(CounterAction::SetError(Some("boom".into())));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().error(), Some("boom"));

        store.dispatch(CounterAction::ClearError);
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().error(), None);
    }
}
