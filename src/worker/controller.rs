//! # Worker controller abstraction.
//!
//! A controller knows how to reach, start and stop one worker process. It holds no
//! policy: retry bounds, probe-first precedence and teardown registration belong to
//! [`ProcessSupervisor`](crate::ProcessSupervisor).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{LaunchError, ProbeError};

/// Shared handle to a controller.
pub type WorkerControllerRef = Arc<dyn WorkerController>;

/// # Start, probe and stop a worker exposing a control endpoint.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use async_trait::async_trait;
/// use auditvisor::{LaunchError, ProbeError, WorkerController};
///
/// /// A worker someone else manages; launch is a no-op.
/// struct Attached;
///
/// #[async_trait]
/// impl WorkerController for Attached {
///     async fn is_ready(&self, port: u16, timeout: Duration) -> Result<(), ProbeError> {
///         auditvisor::handshake(port, timeout).await
///     }
///     async fn launch(&self, _port: u16) -> Result<(), LaunchError> { Ok(()) }
///     async fn kill(&self) -> Result<(), LaunchError> { Ok(()) }
/// }
/// ```
#[async_trait]
pub trait WorkerController: Send + Sync + 'static {
    /// One handshake attempt within `timeout`. Must not start anything.
    async fn is_ready(&self, port: u16, timeout: Duration) -> Result<(), ProbeError>;

    /// Starts a worker bound to `port`. Returns once the process is spawned, not once it is ready.
    async fn launch(&self, port: u16) -> Result<(), LaunchError>;

    /// `true` when a launched worker has already exited.
    async fn has_exited(&self) -> bool {
        false
    }

    /// Stops the launched worker. Idempotent; a no-op when nothing was launched.
    async fn kill(&self) -> Result<(), LaunchError>;
}
