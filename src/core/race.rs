//! # Pipeline vs. interrupt.
//!
//! [`race`] waits for whichever settles first: the spawned pipeline task or the
//! interrupt future. The interrupt is polled first, so it wins a tie.
//!
//! When the interrupt wins, the pipeline's [`JoinHandle`] is dropped. Dropping a
//! handle detaches the task; it is not aborted and may keep running until the
//! runtime shuts down.

use std::future::Future;

use tokio::task::JoinHandle;

use crate::error::panic_message;

/// Which side of the race settled first.
#[derive(Debug, PartialEq, Eq)]
pub enum Settled<T> {
    /// The pipeline finished with a value.
    Pipeline(T),
    /// The pipeline task panicked (or was cancelled by the runtime).
    Panicked(String),
    /// The interrupt fired first.
    Interrupted,
}

impl<T> Settled<T> {
    #[inline]
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Settled::Interrupted)
    }
}

/// Races `pipeline` against `interrupt`.
pub async fn race<T, I>(pipeline: JoinHandle<T>, interrupt: I) -> Settled<T>
where
    I: Future<Output = ()>,
{
    tokio::select! {
        biased;
        _ = interrupt => Settled::Interrupted,
        res = pipeline => match res {
            Ok(v) => Settled::Pipeline(v),
            Err(e) if e.is_panic() => Settled::Panicked(panic_message(&*e.into_panic())),
            Err(_) => Settled::Panicked("pipeline task was cancelled".to_string()),
        },
    }
}
