//! # Example: audit
//!
//! Command-line front end. Launches (or attaches to) a headless browser, asks it for
//! its version document once per address and writes one result per address.
//!
//! ## Run
//! ```bash
//! AUDITVISOR_WORKER=chromium cargo run --example audit -- https://example.com https://example.org
//! cargo run --example audit -- --port 9222 --no-launch --output json https://example.com
//! cargo run --example audit -- --check
//! ```
//!
//! Exit codes: `0` success, `1` connection refused / runtime error, `67` worker never
//! became ready, `130` interrupted.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::Parser;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing_subscriber::EnvFilter;

use auditvisor::{
    AuditJob, Destination, JobError, LogLevel, LogWriter, OutputMode, ResultDocument, RunConfig,
    Runner, Subscribe, WorkerCommand,
};

#[derive(Parser, Debug)]
#[command(name = "audit", about = "Audit addresses with a supervised headless browser")]
struct Args {
    /// Addresses to audit, in order.
    #[arg(required_unless_present = "check")]
    addresses: Vec<String>,

    /// Bring the browser up and tear it down without auditing anything.
    #[arg(long)]
    check: bool,

    /// Remote-debugging port (0 = pick a free one).
    #[arg(long, default_value_t = auditvisor::DEFAULT_PORT)]
    port: u16,

    /// Never start a browser; fail if none is listening.
    #[arg(long)]
    no_launch: bool,

    /// With --no-launch, wait for an externally started browser instead of failing.
    #[arg(long)]
    prefer_external: bool,

    /// Output mode: json, html or pretty.
    #[arg(long, default_value = "pretty")]
    output: OutputMode,

    /// Output destination ("stdout" or a file path).
    #[arg(long, default_value = Destination::STDOUT)]
    output_path: String,

    /// Worker binary (defaults to $AUDITVISOR_WORKER, else chromium).
    #[arg(long)]
    worker: Option<String>,

    /// Only log errors.
    #[arg(long, conflicts_with = "verbose")]
    quiet: bool,

    /// Log debug events.
    #[arg(long)]
    verbose: bool,
}

impl Args {
    fn into_config(self) -> RunConfig {
        let log_level = match (self.quiet, self.verbose) {
            (true, _) => LogLevel::Silent,
            (_, true) => LogLevel::Verbose,
            _ => LogLevel::Info,
        };
        let mut worker = WorkerCommand::default();
        if let Some(program) = self.worker {
            worker.program = program;
        }

        RunConfig {
            addresses: self.addresses,
            port: self.port,
            auto_launch: !self.no_launch,
            prefer_external: self.prefer_external,
            output: self.output,
            destination: Destination::parse(&self.output_path),
            log_level,
            worker,
            allow_empty: self.check,
            ..RunConfig::default()
        }
    }
}

/// Records the worker's version document next to the audited address.
struct VersionProbe;

#[async_trait]
impl AuditJob for VersionProbe {
    async fn run(&self, address: &str, cfg: &RunConfig) -> Result<ResultDocument, JobError> {
        let mut stream = TcpStream::connect(("127.0.0.1", cfg.port)).await?;
        let request = format!(
            "GET /json/version HTTP/1.1\r\nHost: 127.0.0.1:{}\r\nConnection: close\r\n\r\n",
            cfg.port
        );
        stream.write_all(request.as_bytes()).await?;

        let mut raw = String::new();
        tokio::time::timeout(Duration::from_secs(10), stream.read_to_string(&mut raw))
            .await
            .map_err(|_| JobError::failed("worker did not answer within 10s"))??;

        let body = raw.split("\r\n\r\n").nth(1).unwrap_or_default();
        let worker = serde_json::from_str::<serde_json::Value>(body)
            .unwrap_or_else(|_| serde_json::Value::String(body.to_string()));

        Ok(ResultDocument::new(
            address,
            serde_json::json!({ "address": address, "worker": worker }),
        ))
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cfg = Args::parse().into_config();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(cfg.log_level.as_tracing().into()),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();

    if let Err(e) = cfg.validate() {
        tracing::error!("{e}");
        std::process::exit(auditvisor::exit_code::GENERIC);
    }

    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let outcome = Runner::builder(cfg, Arc::new(VersionProbe))
        .with_subscribers(subs)
        .build()
        .run()
        .await;

    outcome.report();
    std::process::exit(outcome.exit_code());
}
