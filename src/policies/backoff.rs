//! # Probe interval growth.
//!
//! [`BackoffPolicy`] decides how long the supervisor waits between two readiness
//! probes of a worker that is still starting up:
//! - [`BackoffPolicy::first`] the wait after the first failed probe;
//! - [`BackoffPolicy::factor`] the multiplicative growth per probe;
//! - [`BackoffPolicy::max`] the cap.
//!
//! The wait after probe `n` (0-indexed) is `first × factor^n`, clamped to `max`,
//! then jittered. The base is derived from the probe number only, so jitter never
//! feeds back into later waits.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use auditvisor::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_millis(100),
//!     max: Duration::from_secs(1),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(backoff.next(0), Duration::from_millis(100));
//! assert_eq!(backoff.next(2), Duration::from_millis(400));
//! assert_eq!(backoff.next(10), Duration::from_secs(1));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Growth of the wait between readiness probes.
#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    /// Wait after the first failed probe.
    pub first: Duration,
    /// Upper bound for any single wait.
    pub max: Duration,
    /// Multiplicative growth factor (`1.0` = constant interval).
    pub factor: f64,
    /// Randomization applied to each wait.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// Constant 500ms interval, capped at 5s, no jitter.
    fn default() -> Self {
        Self {
            first: Duration::from_millis(500),
            max: Duration::from_secs(5),
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }
}

impl BackoffPolicy {
    /// A fixed interval with no growth and no jitter.
    pub fn constant(interval: Duration) -> Self {
        Self {
            first: interval,
            max: interval,
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }

    /// Computes the wait after the given probe number (0-indexed).
    pub fn next(&self, probe: u32) -> Duration {
        let max_secs = self.max.as_secs_f64();
        let exp = probe.min(i32::MAX as u32) as i32;
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);

        let base = if !secs.is_finite() || secs < 0.0 || secs > max_secs {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        };
        self.jitter.apply(base)
    }
}
