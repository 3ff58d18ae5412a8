//! Error types used by the auditvisor runtime, its collaborators, and the classifier.
//!
//! This module defines:
//!
//! - [`RunError`]: failures of the run pipeline (port, worker, targets).
//! - [`JobError`], [`WriteError`]: failures raised by the per-target job and the result writer.
//! - [`ProbeError`], [`LaunchError`]: failures raised by a [`WorkerController`](crate::WorkerController).
//! - [`ConfigError`]: rejected run configuration.
//! - [`CleanupFailure`]: one cleanup action that did not complete.
//!
//! [`classify`] maps a [`RunError`] to exactly one [`Cause`] and its process exit code.
//! Every enum provides `as_label` (stable snake_case label for logs/metrics).

use std::error::Error as StdError;
use std::io;
use std::time::Duration;

use thiserror::Error;

/// Boxed error accepted from opaque collaborators.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Process exit codes produced at the boundary.
pub mod exit_code {
    /// Run completed.
    pub const SUCCESS: i32 = 0;
    /// Connection refused or generic runtime error.
    pub const GENERIC: i32 = 1;
    /// The worker's protocol endpoint never became ready.
    pub const PROTOCOL_TIMEOUT: i32 = 67;
    /// The run was interrupted by a signal.
    pub const INTERRUPTED: i32 = 130;
}

/// # Errors produced by the run pipeline.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RunError {
    /// No ephemeral port could be allocated.
    #[error("unable to allocate a port: {source}")]
    PortUnavailable {
        #[source]
        source: io::Error,
    },

    /// The worker's control endpoint refused the connection.
    #[error("unable to connect to the worker on port {port}: {source}")]
    ConnectionRefused {
        port: u16,
        #[source]
        source: ProbeError,
    },

    /// A single probe against an external worker failed for a reason other than refusal.
    #[error("worker on port {port} is not usable: {source}")]
    Probe {
        port: u16,
        #[source]
        source: ProbeError,
    },

    /// Readiness was not reached within the probe bound.
    #[error("worker on port {port} not ready after {attempts} probes ({waited:?})")]
    ProtocolTimeout {
        port: u16,
        attempts: u32,
        waited: Duration,
    },

    /// The managed worker exited before its endpoint became ready.
    #[error("worker process on port {port} exited before becoming ready")]
    WorkerExited { port: u16 },

    /// The worker process could not be started or stopped.
    #[error(transparent)]
    Launch(#[from] LaunchError),

    /// The per-target job failed.
    #[error("audit of {address} failed: {source}")]
    Job {
        address: String,
        #[source]
        source: JobError,
    },

    /// The result writer failed.
    #[error("writing result for {address} failed: {source}")]
    Write {
        address: String,
        #[source]
        source: WriteError,
    },

    /// The pipeline task panicked.
    #[error("pipeline panicked: {message}")]
    Panicked { message: String },
}

impl RunError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RunError::PortUnavailable { .. } => "run_port_unavailable",
            RunError::ConnectionRefused { .. } => "run_connection_refused",
            RunError::Probe { .. } => "run_probe_failed",
            RunError::ProtocolTimeout { .. } => "run_protocol_timeout",
            RunError::WorkerExited { .. } => "run_worker_exited",
            RunError::Launch(_) => "run_launch_failed",
            RunError::Job { .. } => "run_job_failed",
            RunError::Write { .. } => "run_write_failed",
            RunError::Panicked { .. } => "run_panicked",
        }
    }

    /// Returns a compact `key=value` message for event reasons.
    pub fn as_message(&self) -> String {
        match self {
            RunError::PortUnavailable { source } => format!("port allocation failed: {source}"),
            RunError::ConnectionRefused { port, .. } => format!("connection refused; port={port}"),
            RunError::Probe { port, source } => format!("probe failed; port={port} kind={}", source.as_label()),
            RunError::ProtocolTimeout { port, attempts, waited } => {
                format!("protocol timeout; port={port} attempts={attempts} waited={waited:?}")
            }
            RunError::WorkerExited { port } => format!("worker exited early; port={port}"),
            RunError::Launch(e) => format!("launch failed; kind={} error={e}", e.as_label()),
            RunError::Job { address, source } => format!("job failed; address={address} error={source}"),
            RunError::Write { address, source } => format!("write failed; address={address} error={source}"),
            RunError::Panicked { message } => format!("pipeline panicked: {message}"),
        }
    }
}

/// # Errors produced by a per-target audit job.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum JobError {
    /// The job reported a failure.
    #[error("{message}")]
    Failed { message: String },

    /// I/O failure while talking to the worker.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// Any other error raised by the job.
    #[error("{0}")]
    Other(#[source] BoxError),
}

impl JobError {
    /// Shorthand for [`JobError::Failed`].
    pub fn failed(message: impl Into<String>) -> Self {
        JobError::Failed {
            message: message.into(),
        }
    }

    /// Wraps an arbitrary error.
    pub fn other(err: impl Into<BoxError>) -> Self {
        JobError::Other(err.into())
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            JobError::Failed { .. } => "job_failed",
            JobError::Io(_) => "job_io",
            JobError::Other(_) => "job_other",
        }
    }
}

/// # Errors produced by a result writer.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl WriteError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            WriteError::Io(_) => "write_io",
            WriteError::Serialize(_) => "write_serialize",
        }
    }
}

/// # Errors produced by a single readiness probe.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ProbeError {
    /// TCP connection to the endpoint failed.
    #[error("connect to 127.0.0.1:{port} failed: {source}")]
    Connect {
        port: u16,
        #[source]
        source: io::Error,
    },

    /// The handshake did not complete within the probe deadline.
    #[error("handshake on port {port} timed out after {timeout:?}")]
    Timeout { port: u16, timeout: Duration },

    /// The endpoint answered with something other than a protocol handshake.
    #[error("unexpected handshake response on port {port}: {detail}")]
    Handshake { port: u16, detail: String },
}

impl ProbeError {
    /// `true` when the endpoint actively refused the connection.
    pub fn is_connection_refused(&self) -> bool {
        matches!(self, ProbeError::Connect { source, .. } if source.kind() == io::ErrorKind::ConnectionRefused)
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ProbeError::Connect { .. } => "probe_connect",
            ProbeError::Timeout { .. } => "probe_timeout",
            ProbeError::Handshake { .. } => "probe_handshake",
        }
    }
}

/// # Errors produced while starting or stopping the worker process.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LaunchError {
    /// The worker binary could not be spawned.
    #[error("failed to spawn worker {program:?}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// The worker process could not be terminated.
    #[error("failed to kill worker: {0}")]
    Kill(#[source] io::Error),

    /// The run is already cleaning up; the freshly started worker was stopped again.
    #[error("cleanup already ran; refusing to keep a new worker alive")]
    RegistryClosed,
}

impl LaunchError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            LaunchError::Spawn { .. } => "launch_spawn",
            LaunchError::Kill(_) => "launch_kill",
            LaunchError::RegistryClosed => "launch_registry_closed",
        }
    }
}

/// # Rejected run configuration.
#[non_exhaustive]
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("at least one address is required")]
    NoAddresses,

    #[error("worker program must not be empty")]
    EmptyWorkerProgram,
}

/// One cleanup action that failed or panicked.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cleanup action {name:?} failed: {reason}")]
pub struct CleanupFailure {
    /// Name the action was registered under.
    pub name: String,
    /// Rendered failure.
    pub reason: String,
}

/// Failure category exposed at the process boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cause {
    /// The worker's control endpoint was unreachable.
    ConnectionRefused,
    /// Readiness never reached within the probe bound.
    ProtocolTimeout,
    /// Anything else.
    RuntimeError,
}

impl Cause {
    /// Process exit code for this cause.
    pub fn exit_code(&self) -> i32 {
        match self {
            Cause::ConnectionRefused => exit_code::GENERIC,
            Cause::ProtocolTimeout => exit_code::PROTOCOL_TIMEOUT,
            Cause::RuntimeError => exit_code::GENERIC,
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            Cause::ConnectionRefused => "connection_refused",
            Cause::ProtocolTimeout => "protocol_timeout",
            Cause::RuntimeError => "runtime_error",
        }
    }
}

/// Result of classifying a [`RunError`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnosis {
    pub cause: Cause,
    pub exit_code: i32,
    /// One-line user message.
    pub message: String,
    /// Source chain, only for [`Cause::RuntimeError`].
    pub detail: Option<String>,
}

/// Maps a failure to exactly one [`Cause`].
///
/// Priority:
/// 1. a connection-refused marker anywhere in the source chain → `ConnectionRefused`
/// 2. [`RunError::ProtocolTimeout`] → `ProtocolTimeout`
/// 3. anything else → `RuntimeError` (with the rendered chain as detail)
///
/// # Example
/// ```
/// use auditvisor::{Cause, RunError, classify};
/// use std::time::Duration;
///
/// let err = RunError::ProtocolTimeout { port: 9222, attempts: 3, waited: Duration::from_secs(1) };
/// let d = classify(&err);
/// assert_eq!(d.cause, Cause::ProtocolTimeout);
/// assert_eq!(d.exit_code, 67);
/// ```
pub fn classify(err: &RunError) -> Diagnosis {
    if carries_connection_refused(err) {
        let message = match err {
            RunError::ConnectionRefused { port, .. } => format!(
                "Unable to connect to the worker on port {port}. \
                 Make sure it is running with remote debugging enabled."
            ),
            _ => "Unable to connect to the worker: connection refused.".to_string(),
        };
        return diagnosis(Cause::ConnectionRefused, message, None);
    }

    if let RunError::ProtocolTimeout { port, attempts, waited } = err {
        let message = format!(
            "Timed out waiting for the worker's debugging protocol on port {port} \
             ({attempts} probes over {waited:?})."
        );
        return diagnosis(Cause::ProtocolTimeout, message, None);
    }

    diagnosis(
        Cause::RuntimeError,
        format!("Runtime error encountered: {err}"),
        Some(render_chain(err)),
    )
}

fn diagnosis(cause: Cause, message: String, detail: Option<String>) -> Diagnosis {
    Diagnosis {
        cause,
        exit_code: cause.exit_code(),
        message,
        detail,
    }
}

/// Walks the source chain looking for a refused connection.
fn carries_connection_refused(err: &RunError) -> bool {
    let mut cur: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = cur {
        if let Some(RunError::ConnectionRefused { .. }) = e.downcast_ref::<RunError>() {
            return true;
        }
        if let Some(io) = e.downcast_ref::<io::Error>() {
            if io.kind() == io::ErrorKind::ConnectionRefused {
                return true;
            }
        }
        cur = e.source();
    }
    false
}

/// Extracts a printable message from a panic payload.
pub(crate) fn panic_message(any: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = any.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = any.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn render_chain(err: &(dyn StdError + 'static)) -> String {
    let mut out = err.to_string();
    let mut cur = err.source();
    while let Some(e) = cur {
        out.push_str("\n  caused by: ");
        out.push_str(&e.to_string());
        cur = e.source();
    }
    out
}
