//! # Port resolution.
//!
//! A requested port of `0` means "any free port": the OS picks one for a throwaway
//! loopback listener and that number is handed to the worker.

use std::net::Ipv4Addr;

use tokio::net::TcpListener;
use tracing::debug;

use crate::error::RunError;

/// Returns `requested` unchanged when it is non-zero, otherwise a free loopback port.
///
/// The listener used to find the port is closed before this returns.
pub async fn resolve_port(requested: u16) -> Result<u16, RunError> {
    if requested > 0 {
        return Ok(requested);
    }

    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
        .await
        .map_err(|source| RunError::PortUnavailable { source })?;
    let port = listener
        .local_addr()
        .map_err(|source| RunError::PortUnavailable { source })?
        .port();
    drop(listener);

    debug!(port, "allocated ephemeral port");
    Ok(port)
}
