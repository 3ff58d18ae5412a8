//! Readiness probing policies.
//!
//! ## Contents
//! - [`ReadinessPolicy`] how many probes, how long each may take
//! - [`BackoffPolicy`] how the wait between probes evolves (first / factor / max + jitter)
//! - [`JitterPolicy`] randomization of that wait
//!
//! ## Defaults
//! - `ReadinessPolicy::default()` → 50 probes, 1s probe timeout, 500ms constant interval.
//! - `JitterPolicy::None`.

mod backoff;
mod jitter;
mod readiness;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
pub use readiness::ReadinessPolicy;
