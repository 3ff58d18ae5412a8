//! # LogWriter: renders runtime events through `tracing`
//!
//! ## Example output (with a `fmt` subscriber)
//! ```text
//! INFO  auditvisor: port resolved port=9222
//! INFO  auditvisor: worker launched port=9222
//! DEBUG auditvisor: probe failed port=9222 attempt=1 delay_ms=500 err="connection refused"
//! INFO  auditvisor: worker ready port=9222 attempt=2
//! INFO  auditvisor: auditing target="https://example.com" index=0
//! WARN  auditvisor: cleanup action failed action="kill-worker" err="..."
//! ```

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let target = e.target.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");

        match e.kind {
            EventKind::StateChanged => {
                debug!(target: "auditvisor", state = ?e.state, "state changed");
            }
            EventKind::PortResolved => {
                info!(target: "auditvisor", port = ?e.port, "port resolved");
            }
            EventKind::InterruptReceived => {
                warn!(target: "auditvisor", "interrupt received, cleaning up");
            }
            EventKind::RunFinished => {
                info!(target: "auditvisor", outcome = reason, "run finished");
            }
            EventKind::WorkerProbing => {
                debug!(target: "auditvisor", port = ?e.port, attempt = ?e.attempt, "probing worker");
            }
            EventKind::WorkerProbeFailed => {
                debug!(
                    target: "auditvisor",
                    port = ?e.port,
                    attempt = ?e.attempt,
                    delay_ms = ?e.delay_ms,
                    err = reason,
                    "probe failed"
                );
            }
            EventKind::WorkerExternal => {
                info!(target: "auditvisor", port = ?e.port, "using already running worker");
            }
            EventKind::WorkerLaunched => {
                info!(target: "auditvisor", port = ?e.port, "worker launched");
            }
            EventKind::WorkerReady => {
                info!(target: "auditvisor", port = ?e.port, attempt = ?e.attempt, "worker ready");
            }
            EventKind::WorkerKilled => {
                info!(target: "auditvisor", port = ?e.port, "worker killed");
            }
            EventKind::TargetStarting => {
                info!(target: "auditvisor", address = target, index = ?e.index, "auditing");
            }
            EventKind::TargetWritten => {
                info!(target: "auditvisor", address = target, index = ?e.index, "result written");
            }
            EventKind::TargetFailed => {
                error!(target: "auditvisor", address = target, index = ?e.index, err = reason, "target failed");
            }
            EventKind::CleanupStarted => {
                debug!(target: "auditvisor", actions = ?e.attempt, "cleanup started");
            }
            EventKind::CleanupActionFailed => {
                warn!(target: "auditvisor", action = target, err = reason, "cleanup action failed");
            }
            EventKind::CleanupFinished => {
                debug!(target: "auditvisor", failed = ?e.attempt, "cleanup finished");
            }
            EventKind::SubscriberOverflow => {
                warn!(target: "auditvisor", subscriber = target, reason = reason, "subscriber overflow");
            }
            EventKind::SubscriberPanicked => {
                error!(target: "auditvisor", subscriber = target, info = reason, "subscriber panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
