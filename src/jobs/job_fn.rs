//! # Function-backed job (`JobFn`)
//!
//! [`JobFn`] wraps a closure `F: Fn(String, RunConfig) -> Fut`, producing a fresh
//! future per address. The config handed to the closure carries the resolved
//! worker port. If the closure needs shared state, capture an `Arc<...>` explicitly.
//!
//! ## Example
//! ```rust
//! use auditvisor::{AuditJobRef, JobError, JobFn, ResultDocument, RunConfig};
//!
//! let job: AuditJobRef = JobFn::arc(|address: String, cfg: RunConfig| async move {
//!     Ok::<_, JobError>(ResultDocument::new(address, serde_json::json!({ "port": cfg.port })))
//! });
//! # let _ = job;
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::RunConfig;
use crate::error::JobError;
use crate::jobs::{AuditJob, ResultDocument};

/// Function-backed job implementation.
#[derive(Debug)]
pub struct JobFn<F> {
    f: F,
}

impl<F> JobFn<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Creates the job and returns it as a shared handle.
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

#[async_trait]
impl<F, Fut> AuditJob for JobFn<F>
where
    F: Fn(String, RunConfig) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ResultDocument, JobError>> + Send + 'static,
{
    async fn run(&self, address: &str, cfg: &RunConfig) -> Result<ResultDocument, JobError> {
        (self.f)(address.to_string(), cfg.clone()).await
    }
}
