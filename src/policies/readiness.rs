//! # Readiness policy
//!
//! Bounds how long the supervisor waits for a worker's control endpoint to come up.
//! Exceeding the bound is a protocol timeout, never an unbounded wait.

use std::time::Duration;

use crate::policies::BackoffPolicy;

/// Bounded polling parameters for readiness probing.
///
/// Worst-case wait is roughly `max_attempts × (probe_timeout + interval)`.
#[derive(Clone, Copy, Debug)]
pub struct ReadinessPolicy {
    /// Maximum number of probes after launch (min 1).
    pub max_attempts: u32,
    /// Deadline for a single handshake.
    pub probe_timeout: Duration,
    /// Wait between probes.
    pub backoff: BackoffPolicy,
}

impl Default for ReadinessPolicy {
    /// 50 probes, 1s handshake deadline, constant 500ms interval.
    fn default() -> Self {
        Self {
            max_attempts: 50,
            probe_timeout: Duration::from_secs(1),
            backoff: BackoffPolicy::constant(Duration::from_millis(500)),
        }
    }
}

impl ReadinessPolicy {
    /// Returns the attempt bound clamped to a minimum of 1.
    #[inline]
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}
