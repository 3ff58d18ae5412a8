//! # Cleanup registry.
//!
//! [`CleanupRegistry`] collects named release actions while a run is in progress and
//! drains them exactly once when the run ends, whichever way it ends.
//!
//! ## Rules
//! - Actions run **in registration order**, one after another
//! - Each action is isolated: an error or a panic is recorded and the next action still runs
//! - [`CleanupRegistry::run_all`] never fails and never panics
//! - Draining closes the registry: a second drain is a no-op and a late
//!   [`register`](CleanupRegistry::register) hands the action back to the caller
//!
//! ## Example
//! ```rust
//! use auditvisor::CleanupRegistry;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let registry = CleanupRegistry::new();
//! let _ = registry.register("remove-temp-dir", || async { Ok::<_, std::io::Error>(()) });
//!
//! let failures = registry.run_all().await;
//! assert!(failures.is_empty());
//! assert!(registry.is_drained());
//! # }
//! ```

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::{debug, warn};

use crate::error::{BoxError, CleanupFailure, panic_message};
use crate::events::{Bus, Event, EventKind};

type Action = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), BoxError>> + Send>;

struct Entry {
    name: String,
    action: Action,
}

#[derive(Default)]
struct Inner {
    entries: Vec<Entry>,
    drained: bool,
}

/// Ordered, drain-once set of release actions.
#[derive(Default)]
pub struct CleanupRegistry {
    inner: Mutex<Inner>,
    bus: Option<Bus>,
}

impl CleanupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry that reports draining progress on `bus`.
    pub fn with_bus(bus: Bus) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            bus: Some(bus),
        }
    }

    /// Appends a release action.
    ///
    /// Returns `Err(action)` untouched if the registry has already been drained; the
    /// caller is then responsible for releasing the resource itself.
    pub fn register<F, Fut, E>(&self, name: impl Into<String>, action: F) -> Result<(), F>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<BoxError> + 'static,
    {
        let mut inner = self.lock();
        if inner.drained {
            return Err(action);
        }

        let name = name.into();
        debug!(action = %name, "cleanup action registered");
        let boxed: Action =
            Box::new(move || async move { action().await.map_err(Into::<BoxError>::into) }.boxed());
        inner.entries.push(Entry { name, action: boxed });
        Ok(())
    }

    /// Runs every registered action once, in order, and returns those that failed.
    pub async fn run_all(&self) -> Vec<CleanupFailure> {
        let entries = {
            let mut inner = self.lock();
            if inner.drained {
                return Vec::new();
            }
            inner.drained = true;
            std::mem::take(&mut inner.entries)
        };

        self.publish(Event::new(EventKind::CleanupStarted).with_attempt(count(entries.len())));

        let mut failures = Vec::new();
        for Entry { name, action } in entries {
            let res = std::panic::AssertUnwindSafe(async move { action().await })
                .catch_unwind()
                .await;

            let reason = match res {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(panic) => format!("panicked: {}", panic_message(&*panic)),
            };
            warn!(action = %name, err = %reason, "cleanup action failed");
            self.publish(
                Event::new(EventKind::CleanupActionFailed)
                    .with_target(name.as_str())
                    .with_reason(reason.as_str()),
            );
            failures.push(CleanupFailure { name, reason });
        }

        self.publish(Event::new(EventKind::CleanupFinished).with_attempt(count(failures.len())));
        failures
    }

    /// Number of actions waiting to run.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `true` once [`run_all`](Self::run_all) has started.
    pub fn is_drained(&self) -> bool {
        self.lock().drained
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // actions never run under the lock, so a poisoned guard still holds consistent data
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, ev: Event) {
        if let Some(bus) = &self.bus {
            bus.publish(ev);
        }
    }
}

fn count(n: usize) -> u32 {
    n.min(u32::MAX as usize) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::Arc;

    fn recorder() -> Arc<Mutex<Vec<&'static str>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn push(
        log: &Arc<Mutex<Vec<&'static str>>>,
        name: &'static str,
    ) -> impl FnOnce() -> BoxFuture<'static, io::Result<()>> + Send + 'static {
        let log = Arc::clone(log);
        move || {
            async move {
                log.lock().expect("log").push(name);
                Ok(())
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn test_runs_in_registration_order() {
        let log = recorder();
        let reg = CleanupRegistry::new();
        for name in ["a", "b", "c"] {
            assert!(reg.register(name, push(&log, name)).is_ok());
        }
        assert_eq!(reg.len(), 3);

        assert!(reg.run_all().await.is_empty());
        assert_eq!(*log.lock().expect("log"), vec!["a", "b", "c"]);
        assert!(reg.is_empty());
    }

    #[tokio::test]
    async fn test_failure_and_panic_do_not_stop_the_rest() {
        let log = recorder();
        let reg = CleanupRegistry::new();
        let _ = reg.register("first", push(&log, "first"));
        let _ = reg.register("fails", || async { Err::<(), _>(io::Error::other("disk gone")) });
        let _ = reg.register("panics", || async {
            if true {
                panic!("teardown exploded");
            }
            Ok::<(), io::Error>(())
        });
        let _ = reg.register("last", push(&log, "last"));

        let failures = reg.run_all().await;
        assert_eq!(*log.lock().expect("log"), vec!["first", "last"]);
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].name, "fails");
        assert!(failures[0].reason.contains("disk gone"));
        assert_eq!(failures[1].name, "panics");
        assert!(failures[1].reason.contains("teardown exploded"));
    }

    #[tokio::test]
    async fn test_second_drain_is_noop() {
        let log = recorder();
        let reg = CleanupRegistry::new();
        let _ = reg.register("once", push(&log, "once"));

        reg.run_all().await;
        assert!(reg.run_all().await.is_empty());
        assert_eq!(log.lock().expect("log").len(), 1);
    }

    #[tokio::test]
    async fn test_register_after_drain_hands_action_back() {
        let log = recorder();
        let reg = CleanupRegistry::new();
        reg.run_all().await;

        let rejected = reg.register("late", push(&log, "late"));
        let action = rejected.err().expect("registry is closed");
        action().await.expect("caller runs it");
        assert_eq!(*log.lock().expect("log"), vec!["late"]);
        assert!(reg.is_empty());
    }

    #[tokio::test]
    async fn test_events_report_failures() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let reg = CleanupRegistry::with_bus(bus);
        let _ = reg.register("kill-worker", || async { Err::<(), _>(io::Error::other("no such process")) });

        reg.run_all().await;

        let started = rx.recv().await.expect("started");
        assert_eq!(started.kind, EventKind::CleanupStarted);
        assert_eq!(started.attempt, Some(1));
        let failed = rx.recv().await.expect("failed");
        assert_eq!(failed.kind, EventKind::CleanupActionFailed);
        assert_eq!(failed.target.as_deref(), Some("kill-worker"));
        let finished = rx.recv().await.expect("finished");
        assert_eq!(finished.kind, EventKind::CleanupFinished);
        assert_eq!(finished.attempt, Some(1));
    }
}
