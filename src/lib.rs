//! # auditvisor
//!
//! **Auditvisor** supervises a remote-debuggable worker process (a headless browser,
//! typically) and drives it through a sequence of audit jobs, one address at a time.
//!
//! It resolves the worker port, launches the worker when nobody is listening, confirms the
//! control endpoint answers, audits each address in order, and always tears the worker down
//! again, also when the run is interrupted. Failures map to a small set of exit codes.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!  RunConfig + AuditJob (+ ResultWriter, WorkerController, subscribers)
//!                               │
//!                               ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Runner                                                           │
//! │  - Bus (broadcast events)                                         │
//! │  - CleanupRegistry (drain-once release actions)                   │
//! │  - RunState (watch channel, forward-only)                         │
//! └──────┬───────────────────────────────────────────────┬────────────┘
//!        ▼ tokio::spawn                                  ▼
//!  ┌─────────────────────────────────────────┐    ┌──────────────────┐
//!  │ pipeline                                │    │ interrupt        │
//!  │  resolve_port                           │    │ (SIGINT/SIGTERM/ │
//!  │  ProcessSupervisor::ensure_ready        │    │  SIGQUIT/Ctrl-C) │
//!  │     └─ registers kill-worker ─► Cleanup │    └────────┬─────────┘
//!  │  SequentialRunner::run                  │             │
//!  │     job.run(addr) ─► writer.write(doc)  │             │
//!  └──────────────────┬──────────────────────┘             │
//!                     └──────────────► race ◄──────────────┘
//!                                       │
//!                     CleanupRegistry::run_all (always)
//!                                       │
//!                                       ▼
//!                    RunOutcome ─► exit code 0 / 1 / 67 / 130
//! ```
//!
//! ### Exit codes
//! | Outcome                               | Code |
//! |---------------------------------------|------|
//! | success                               | 0    |
//! | connection refused / runtime error    | 1    |
//! | worker endpoint never became ready    | 67   |
//! | interrupted                           | 130  |
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                              |
//! |-------------------|---------------------------------------------------------------|-------------------------------------------------|
//! | **Runner**        | One interruptible run with guaranteed cleanup.                | [`Runner`], [`RunOutcome`], [`RunState`]        |
//! | **Worker**        | Probe, launch and kill the worker process.                    | [`ProcessSupervisor`], [`WorkerController`]     |
//! | **Jobs**          | Per-address audit and result output.                          | [`AuditJob`], [`JobFn`], [`ResultWriter`]       |
//! | **Cleanup**       | Ordered release actions drained exactly once.                 | [`CleanupRegistry`]                             |
//! | **Errors**        | Typed errors and their exit-code classification.              | [`RunError`], [`classify`], [`Cause`]           |
//! | **Policies**      | Bounded readiness polling.                                    | [`ReadinessPolicy`], [`BackoffPolicy`]          |
//! | **Subscriber API**| Hook into runtime events (logging, progress, metrics).        | [`Subscribe`], [`LogWriter`]                    |
//! | **Configuration** | Run settings.                                                 | [`RunConfig`]                                   |
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use auditvisor::{JobError, JobFn, LogWriter, ResultDocument, RunConfig, Runner, Subscribe};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let cfg = RunConfig::for_addresses(["https://example.com", "https://example.org"]);
//!
//!     let job = JobFn::arc(|address: String, cfg: RunConfig| async move {
//!         // talk to the worker on cfg.port here
//!         let body = serde_json::json!({ "port": cfg.port, "score": 1.0 });
//!         Ok::<_, JobError>(ResultDocument::new(address, body))
//!     });
//!
//!     let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
//!     let outcome = Runner::builder(cfg, job).with_subscribers(subs).build().run().await;
//!
//!     outcome.report();
//!     std::process::exit(outcome.exit_code());
//! }
//! ```
mod config;
mod core;
mod error;
mod events;
mod jobs;
mod policies;
mod subscribers;
mod worker;

// ---- Public re-exports ----

pub use config::{
    DEFAULT_PORT, DEFAULT_WORKER_PROGRAM, Destination, LogLevel, OutputMode, RunConfig, WORKER_ENV,
    WorkerCommand,
};
pub use crate::core::{
    CleanupRegistry, KILL_WORKER, LaunchMode, ProcessSupervisor, RunOutcome, RunState, Runner,
    RunnerBuilder, SequentialRunner, Settled, WorkerHandle, WorkerState, race, resolve_port,
    wait_for_interrupt_signal,
};
pub use error::{
    BoxError, Cause, CleanupFailure, ConfigError, Diagnosis, JobError, LaunchError, ProbeError,
    RunError, WriteError, classify, exit_code,
};
pub use events::{Bus, Event, EventKind};
pub use jobs::{
    AuditJob, AuditJobRef, JobFn, ReportWriter, ResultDocument, ResultWriter, ResultWriterRef,
    secondary_report_path, slug,
};
pub use policies::{BackoffPolicy, JitterPolicy, ReadinessPolicy};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
pub use worker::{ProcessController, WorkerController, WorkerControllerRef, handshake};
