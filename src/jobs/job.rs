//! # Per-target audit job.
//!
//! A job gathers whatever it needs from the ready worker for one address and
//! returns a [`ResultDocument`]. The runner calls it once per address, never
//! concurrently, and never retries it; retries belong inside the job.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::RunConfig;
use crate::error::JobError;
use crate::jobs::ResultDocument;

/// Shared handle to a job.
pub type AuditJobRef = Arc<dyn AuditJob>;

/// # Opaque per-address operation.
///
/// `cfg.port` is the resolved worker port.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use auditvisor::{AuditJob, JobError, ResultDocument, RunConfig};
///
/// struct Title;
///
/// #[async_trait]
/// impl AuditJob for Title {
///     async fn run(&self, address: &str, cfg: &RunConfig) -> Result<ResultDocument, JobError> {
///         let body = serde_json::json!({ "port": cfg.port, "title": "Example Domain" });
///         Ok(ResultDocument::new(address, body))
///     }
/// }
/// ```
#[async_trait]
pub trait AuditJob: Send + Sync + 'static {
    /// Audits one address.
    async fn run(&self, address: &str, cfg: &RunConfig) -> Result<ResultDocument, JobError>;
}
