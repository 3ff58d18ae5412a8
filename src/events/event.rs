//! # Runtime events emitted by the runner, the worker supervisor and the target sequence.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Run events**: state transitions of the top-level run, port resolution, interrupts
//! - **Worker events**: probing, launch, readiness and teardown of the worker process
//! - **Target events**: per-address job execution and result writing
//! - **Cleanup events**: draining of the cleanup registry
//!
//! The [`Event`] struct carries additional metadata such as timestamps, the target
//! address, probe attempts, the resolved port and failure reasons.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use auditvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::TargetFailed)
//!     .with_target("https://example.com")
//!     .with_index(0)
//!     .with_reason("boom");
//!
//! assert_eq!(ev.kind, EventKind::TargetFailed);
//! assert_eq!(ev.target.as_deref(), Some("https://example.com"));
//! assert_eq!(ev.reason.as_deref(), Some("boom"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::core::RunState;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `target`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `target`: subscriber name
    /// - `reason`: reason string (e.g., "full", "closed")
    SubscriberOverflow,

    // === Run events ===
    /// The run moved to a new state.
    ///
    /// Sets:
    /// - `state`: the state entered
    StateChanged,

    /// The requested port was resolved.
    ///
    /// Sets:
    /// - `port`: resolved port (always `> 0`)
    PortResolved,

    /// An interrupt signal won the race against the pipeline.
    InterruptReceived,

    /// The run produced its outcome.
    ///
    /// Sets:
    /// - `reason`: outcome label (`success`, `interrupted`, or a cause label)
    RunFinished,

    // === Worker events ===
    /// A readiness probe is about to be sent.
    ///
    /// Sets:
    /// - `port`: probed port
    /// - `attempt`: probe attempt (1-based)
    WorkerProbing,

    /// A readiness probe failed.
    ///
    /// Sets:
    /// - `port`: probed port
    /// - `attempt`: probe attempt
    /// - `delay_ms`: wait before the next probe (absent on the last attempt)
    /// - `reason`: probe failure
    WorkerProbeFailed,

    /// A worker was already listening; nothing was launched.
    ///
    /// Sets:
    /// - `port`: port of the external worker
    WorkerExternal,

    /// A managed worker process was started.
    ///
    /// Sets:
    /// - `port`: port the worker was bound to
    WorkerLaunched,

    /// The worker completed the control-protocol handshake.
    ///
    /// Sets:
    /// - `port`: worker port
    /// - `attempt`: the probe attempt that succeeded
    WorkerReady,

    /// The managed worker process was terminated.
    ///
    /// Sets:
    /// - `port`: worker port
    WorkerKilled,

    // === Target events ===
    /// The audit job for an address is starting.
    ///
    /// Sets:
    /// - `target`: address
    /// - `index`: position in the address list (0-based)
    TargetStarting,

    /// The result for an address was fully written.
    ///
    /// Sets:
    /// - `target`: address
    /// - `index`: position in the address list
    TargetWritten,

    /// The job or the writer failed for an address; the sequence stops.
    ///
    /// Sets:
    /// - `target`: address
    /// - `index`: position in the address list
    /// - `reason`: failure message
    TargetFailed,

    // === Cleanup events ===
    /// Cleanup registry drain started.
    ///
    /// Sets:
    /// - `attempt`: number of registered actions
    CleanupStarted,

    /// One cleanup action failed (the others still run).
    ///
    /// Sets:
    /// - `target`: action name
    /// - `reason`: failure message
    CleanupActionFailed,

    /// Cleanup registry drain finished.
    ///
    /// Sets:
    /// - `attempt`: number of failed actions
    CleanupFinished,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Target address, subscriber name or cleanup action name.
    pub target: Option<Arc<str>>,
    /// Position of the target in the address list.
    pub index: Option<u32>,
    /// Probe attempt (starting from 1) or a count, depending on the kind.
    pub attempt: Option<u32>,
    /// Worker port.
    pub port: Option<u16>,
    /// Delay before the next probe in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Run state entered (only for [`EventKind::StateChanged`]).
    pub state: Option<RunState>,
    /// Human-readable reason (errors, overflow details, outcome labels).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            target: None,
            index: None,
            attempt: None,
            port: None,
            delay_ms: None,
            state: None,
            reason: None,
        }
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a target address (or subscriber/action name).
    #[inline]
    pub fn with_target(mut self, target: impl Into<Arc<str>>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Attaches the position of the target in the address list.
    #[inline]
    pub fn with_index(mut self, index: usize) -> Self {
        self.index = Some(index.min(u32::MAX as usize) as u32);
        self
    }

    /// Attaches an attempt count.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches the worker port.
    #[inline]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Creates a state transition event.
    #[inline]
    pub fn state_changed(state: RunState) -> Self {
        let mut ev = Event::new(EventKind::StateChanged);
        ev.state = Some(state);
        ev
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_target(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_target(subscriber)
            .with_reason(info)
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }

    #[inline]
    pub fn is_subscriber_panic(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberPanicked)
    }
}
