//! # Jitter for probe intervals.
//!
//! [`JitterPolicy`] randomizes the wait between readiness probes so that several
//! runners polling workers on the same host do not hit them in lockstep.
//!
//! - [`JitterPolicy::None`]: exact interval, predictable timing
//! - [`JitterPolicy::Full`]: random wait in `[0, interval]`
//! - [`JitterPolicy::Equal`]: `interval/2 + random[0, interval/2]`

use rand::Rng;
use std::time::Duration;

/// Randomization applied to a computed probe interval.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JitterPolicy {
    /// No jitter: use the exact interval.
    #[default]
    None,
    /// Full jitter: random wait in `[0, interval]`.
    Full,
    /// Equal jitter: keeps at least half of the interval.
    Equal,
}

impl JitterPolicy {
    /// Applies jitter to the given interval.
    pub fn apply(&self, delay: Duration) -> Duration {
        let ms = delay.as_millis().min(u128::from(u64::MAX)) as u64;
        if ms == 0 {
            return Duration::ZERO;
        }
        match self {
            JitterPolicy::None => delay,
            JitterPolicy::Full => Duration::from_millis(rand::rng().random_range(0..=ms)),
            JitterPolicy::Equal => {
                let half = ms / 2;
                let jitter = if half == 0 {
                    0
                } else {
                    rand::rng().random_range(0..=half)
                };
                Duration::from_millis(half + jitter)
            }
        }
    }
}
