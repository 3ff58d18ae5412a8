//! # Example: sequence
//!
//! Runs three addresses against an in-process worker that answers the handshake
//! after a few probes, with a custom subscriber printing progress.
//!
//! ## Flow
//! ```text
//! Runner::run_until(ctrl_c)
//!     ├─► resolve_port(0)
//!     ├─► ProcessSupervisor: probe ✗ ─► launch ─► probe ✗ ─► probe ✓
//!     ├─► SequentialRunner: a ─► b ─► c   (JobFn + ReportWriter, json to stdout)
//!     └─► CleanupRegistry: kill-worker
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example sequence
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use auditvisor::{
    Destination, Event, EventKind, JobError, JobFn, LaunchError, OutputMode, ProbeError,
    ReadinessPolicy, ResultDocument, RunConfig, Runner, Subscribe, WorkerController,
};

/// Pretends to be a browser that needs three probes to come up.
#[derive(Default)]
struct Simulated {
    running: AtomicBool,
    probes: AtomicU32,
}

#[async_trait]
impl WorkerController for Simulated {
    async fn is_ready(&self, port: u16, timeout: Duration) -> Result<(), ProbeError> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(ProbeError::Connect {
                port,
                source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
            });
        }
        match self.probes.fetch_add(1, Ordering::SeqCst) {
            0 | 1 => Err(ProbeError::Timeout { port, timeout }),
            _ => Ok(()),
        }
    }

    async fn launch(&self, port: u16) -> Result<(), LaunchError> {
        println!("[worker] starting on port {port}");
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn kill(&self) -> Result<(), LaunchError> {
        println!("[worker] stopped");
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Prints target progress.
struct Progress;

#[async_trait]
impl Subscribe for Progress {
    async fn on_event(&self, ev: &Event) {
        match ev.kind {
            EventKind::StateChanged => {
                println!("[run] {}", ev.state.map(|s| s.as_str()).unwrap_or("?"));
            }
            EventKind::WorkerProbeFailed => {
                println!(
                    "[run] probe {} failed, retry in {}ms",
                    ev.attempt.unwrap_or(0),
                    ev.delay_ms.unwrap_or(0)
                );
            }
            EventKind::TargetWritten => {
                println!(
                    "[run] {} done (#{})",
                    ev.target.as_deref().unwrap_or("?"),
                    ev.index.unwrap_or(0)
                );
            }
            _ => {}
        }
    }

    fn name(&self) -> &'static str {
        "progress"
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cfg = RunConfig {
        readiness: ReadinessPolicy {
            max_attempts: 10,
            ..ReadinessPolicy::default()
        },
        ..RunConfig::for_addresses(["https://a.example", "https://b.example", "https://c.example"])
            .with_port(0)
            .with_output(OutputMode::Json, Destination::Stdout)
    };

    let job = JobFn::arc(|address: String, cfg: RunConfig| async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        Ok::<_, JobError>(ResultDocument::new(
            address.clone(),
            serde_json::json!({ "length": address.len(), "worker_port": cfg.port }),
        ))
    });

    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(Progress)];
    let outcome = Runner::builder(cfg, job)
        .with_controller(Arc::new(Simulated::default()))
        .with_subscribers(subs)
        .build()
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await;

    println!("[run] outcome={} exit={}", outcome.as_label(), outcome.exit_code());
    Ok(())
}
