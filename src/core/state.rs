//! # Run state machine.
//!
//! ```text
//! Init ─► ResolvingPort ─┬─► Launching ─► Probing ─┬─► Running ─► Cleanup ─► Terminated
//!                        └─────────────────────────┘
//! ```
//!
//! [`StateCell`] only moves forward. A detached pipeline that keeps going after an
//! interrupt can therefore never pull the run back out of `Cleanup` or `Terminated`.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;

use crate::events::{Bus, Event};

/// Lifecycle state of one run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RunState {
    Init,
    ResolvingPort,
    /// Starting a managed worker.
    Launching,
    /// Polling the worker's control endpoint.
    Probing,
    /// Worker ready; addresses are being audited.
    Running,
    /// Cleanup registry is draining.
    Cleanup,
    Terminated,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Init => "init",
            RunState::ResolvingPort => "resolving_port",
            RunState::Launching => "launching",
            RunState::Probing => "probing",
            RunState::Running => "running",
            RunState::Cleanup => "cleanup",
            RunState::Terminated => "terminated",
        }
    }

    /// `true` once the run has left the pipeline.
    #[inline]
    pub fn is_closing(&self) -> bool {
        *self >= RunState::Cleanup
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared, forward-only holder of the current [`RunState`].
#[derive(Clone)]
pub(crate) struct StateCell {
    tx: Arc<watch::Sender<RunState>>,
    bus: Bus,
}

impl StateCell {
    pub(crate) fn new(bus: Bus) -> Self {
        let (tx, _rx) = watch::channel(RunState::Init);
        Self {
            tx: Arc::new(tx),
            bus,
        }
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<RunState> {
        self.tx.subscribe()
    }

    pub(crate) fn current(&self) -> RunState {
        *self.tx.borrow()
    }

    /// Moves to `next` if it lies ahead of the current state.
    ///
    /// Returns `false` (and publishes nothing) when the transition would go backwards.
    pub(crate) fn enter(&self, next: RunState) -> bool {
        let moved = self.tx.send_if_modified(|cur| {
            if next > *cur {
                *cur = next;
                true
            } else {
                false
            }
        });
        if moved {
            self.bus.publish(Event::state_changed(next));
        }
        moved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[test]
    fn test_transitions_only_move_forward() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let cell = StateCell::new(bus);

        assert!(cell.enter(RunState::ResolvingPort));
        assert!(cell.enter(RunState::Cleanup));
        assert!(!cell.enter(RunState::Running));
        assert_eq!(cell.current(), RunState::Cleanup);

        let first = rx.try_recv().expect("first transition");
        assert_eq!(first.kind, EventKind::StateChanged);
        assert_eq!(first.state, Some(RunState::ResolvingPort));
        assert_eq!(rx.try_recv().expect("second").state, Some(RunState::Cleanup));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_receivers_observe_latest() {
        let cell = StateCell::new(Bus::new(4));
        let rx = cell.subscribe();
        cell.enter(RunState::Terminated);
        assert_eq!(*rx.borrow(), RunState::Terminated);
        assert!(rx.borrow().is_closing());
    }
}
