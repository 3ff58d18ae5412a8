//! # Interrupt signal source.
//!
//! [`wait_for_interrupt_signal`] completes when the process is asked to stop.
//!
//! ## Signals
//! **Unix platforms:**
//! - `SIGINT` (Ctrl-C in terminal)
//! - `SIGTERM` (default kill signal)
//! - `SIGQUIT`
//!
//! **Other platforms:**
//! - `Ctrl-C` via [`tokio::signal::ctrl_c`]
//!
//! Once a listener is installed the default handler stays replaced, so a second
//! signal arriving while cleanup runs does not terminate the process.

/// Waits for an interrupt signal.
///
/// Each call creates independent signal listeners.
///
/// Returns `Ok(())` when any signal is received, or `Err` if signal registration fails.
#[cfg(unix)]
pub async fn wait_for_interrupt_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = sigint.recv()  => {},
        _ = sigterm.recv() => {},
        _ = sigquit.recv() => {},
    }
    Ok(())
}

/// Waits for an interrupt signal.
///
/// Returns `Ok(())` on Ctrl-C, or `Err` if signal registration fails.
#[cfg(not(unix))]
pub async fn wait_for_interrupt_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

/// Interrupt future for the runner: a registration failure is logged and the run
/// continues without an interrupt source.
pub(crate) async fn interrupt_or_pending() {
    if let Err(e) = wait_for_interrupt_signal().await {
        tracing::warn!(error = %e, "interrupt handler unavailable; run cannot be interrupted");
        std::future::pending::<()>().await;
    }
}
