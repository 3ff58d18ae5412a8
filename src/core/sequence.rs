//! # Sequential target execution.
//!
//! [`SequentialRunner`] audits addresses strictly one at a time, in input order:
//!
//! ```text
//! for index in 0..addresses.len():
//!     publish TargetStarting
//!     job.run(address)            ──Err──► publish TargetFailed, stop (RunError::Job)
//!     writer.write(doc, mode)     ──Err──► publish TargetFailed, stop (RunError::Write)
//!     pretty? writer.write(doc, html, <slug>.report.html)
//!     publish TargetWritten
//! ```
//!
//! Once the stop token is cancelled no further address is started; a job already in
//! flight is left to finish.

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::{Destination, OutputMode, RunConfig};
use crate::error::RunError;
use crate::events::{Bus, Event, EventKind};
use crate::jobs::{AuditJobRef, ResultWriterRef, secondary_report_path};

/// Runs the per-address job and writer over an address list.
pub struct SequentialRunner {
    job: AuditJobRef,
    writer: ResultWriterRef,
    bus: Bus,
    stop: CancellationToken,
}

impl SequentialRunner {
    pub fn new(job: AuditJobRef, writer: ResultWriterRef, bus: Bus) -> Self {
        Self {
            job,
            writer,
            bus,
            stop: CancellationToken::new(),
        }
    }

    /// Stops the sequence before the next address once `stop` is cancelled.
    pub fn with_stop(mut self, stop: CancellationToken) -> Self {
        self.stop = stop;
        self
    }

    /// Audits every address of `cfg` and returns how many were completed.
    ///
    /// The first failure aborts the remaining addresses.
    pub async fn run(&self, cfg: &RunConfig) -> Result<usize, RunError> {
        let addresses = cfg.addresses.clone();
        let mut cursor = 0;

        while cursor < addresses.len() {
            if self.stop.is_cancelled() {
                debug!(done = cursor, left = addresses.len() - cursor, "sequence stopped");
                break;
            }

            let address = addresses[cursor].as_str();
            if let Err(e) = self.run_one(cursor, address, cfg).await {
                self.bus.publish(
                    Event::new(EventKind::TargetFailed)
                        .with_target(address)
                        .with_index(cursor)
                        .with_reason(e.as_message()),
                );
                return Err(e);
            }
            cursor += 1;
        }
        Ok(cursor)
    }

    async fn run_one(&self, index: usize, address: &str, cfg: &RunConfig) -> Result<(), RunError> {
        self.bus.publish(
            Event::new(EventKind::TargetStarting)
                .with_target(address)
                .with_index(index),
        );

        let doc = self
            .job
            .run(address, cfg)
            .await
            .map_err(|source| RunError::Job {
                address: address.to_string(),
                source,
            })?;

        let write_err = |source| RunError::Write {
            address: address.to_string(),
            source,
        };
        let doc = self
            .writer
            .write(doc, cfg.output, &cfg.destination)
            .await
            .map_err(write_err)?;

        if cfg.output == OutputMode::Pretty {
            let copy = Destination::File(secondary_report_path(address, &cfg.destination));
            self.writer
                .write(doc, OutputMode::Html, &copy)
                .await
                .map_err(write_err)?;
        }

        self.bus.publish(
            Event::new(EventKind::TargetWritten)
                .with_target(address)
                .with_index(index),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use serde_json::json;

    use crate::error::{JobError, WriteError};
    use crate::jobs::{AuditJob, ResultDocument, ResultWriter};

    /// Records every call; fails the job for `fail_at`.
    #[derive(Default)]
    struct Script {
        fail_at: Option<&'static str>,
        jobs: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl AuditJob for Script {
        async fn run(&self, address: &str, _cfg: &RunConfig) -> Result<ResultDocument, JobError> {
            self.jobs.lock().expect("jobs").push(address.to_string());
            if self.fail_at == Some(address) {
                return Err(JobError::failed("gather failed"));
            }
            Ok(ResultDocument::new(address, json!({ "ok": true })))
        }
    }

    #[derive(Default)]
    struct Sink {
        writes: Mutex<Vec<(String, OutputMode, Destination)>>,
    }

    #[async_trait]
    impl ResultWriter for Sink {
        async fn write(
            &self,
            doc: ResultDocument,
            mode: OutputMode,
            destination: &Destination,
        ) -> Result<ResultDocument, WriteError> {
            self.writes
                .lock()
                .expect("writes")
                .push((doc.address.clone(), mode, destination.clone()));
            Ok(doc)
        }
    }

    fn config(addresses: &[&str], output: OutputMode) -> RunConfig {
        RunConfig::for_addresses(addresses.iter().copied()).with_output(output, Destination::Stdout)
    }

    #[tokio::test]
    async fn test_addresses_run_once_in_order() {
        let job = Arc::new(Script::default());
        let sink = Arc::new(Sink::default());
        let runner = SequentialRunner::new(job.clone(), sink.clone(), Bus::new(64));

        let done = runner
            .run(&config(&["a", "b", "c"], OutputMode::Json))
            .await
            .expect("run");
        assert_eq!(done, 3);
        assert_eq!(*job.jobs.lock().expect("jobs"), vec!["a", "b", "c"]);

        let writes = sink.writes.lock().expect("writes");
        let order: Vec<_> = writes.iter().map(|(a, _, _)| a.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
        assert!(writes.iter().all(|(_, m, d)| *m == OutputMode::Json && *d == Destination::Stdout));
    }

    #[tokio::test]
    async fn test_failure_stops_the_rest() {
        let job = Arc::new(Script {
            fail_at: Some("b"),
            ..Default::default()
        });
        let sink = Arc::new(Sink::default());
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();
        let runner = SequentialRunner::new(job.clone(), sink.clone(), bus);

        let err = runner
            .run(&config(&["a", "b", "c"], OutputMode::Json))
            .await
            .unwrap_err();
        match &err {
            RunError::Job { address, .. } => assert_eq!(address, "b"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(*job.jobs.lock().expect("jobs"), vec!["a", "b"]);
        assert_eq!(sink.writes.lock().expect("writes").len(), 1);

        let mut failed = None;
        while let Ok(ev) = rx.try_recv() {
            if ev.kind == EventKind::TargetFailed {
                failed = Some(ev);
            }
        }
        let failed = failed.expect("TargetFailed published");
        assert_eq!(failed.index, Some(1));
        assert_eq!(failed.target.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_empty_list_writes_nothing() {
        let job = Arc::new(Script::default());
        let sink = Arc::new(Sink::default());
        let runner = SequentialRunner::new(job.clone(), sink.clone(), Bus::new(8));

        assert_eq!(runner.run(&config(&[], OutputMode::Pretty)).await.expect("run"), 0);
        assert!(job.jobs.lock().expect("jobs").is_empty());
        assert!(sink.writes.lock().expect("writes").is_empty());
    }

    #[tokio::test]
    async fn test_pretty_mode_writes_html_copy() {
        let job = Arc::new(Script::default());
        let sink = Arc::new(Sink::default());
        let runner = SequentialRunner::new(job, sink.clone(), Bus::new(64));

        let cfg = RunConfig::for_addresses(["https://example.com/docs"])
            .with_output(OutputMode::Pretty, Destination::parse("out/report.txt"));
        runner.run(&cfg).await.expect("run");

        let writes = sink.writes.lock().expect("writes");
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].1, OutputMode::Pretty);
        assert_eq!(writes[1].1, OutputMode::Html);
        assert_eq!(
            writes[1].2,
            Destination::File(PathBuf::from("out").join("example_com_docs.report.html"))
        );
    }

    #[tokio::test]
    async fn test_stop_token_prevents_next_address() {
        let job = Arc::new(Script::default());
        let sink = Arc::new(Sink::default());
        let stop = CancellationToken::new();
        stop.cancel();
        let runner = SequentialRunner::new(job.clone(), sink, Bus::new(8)).with_stop(stop);

        let done = runner.run(&config(&["a", "b"], OutputMode::Json)).await.expect("run");
        assert_eq!(done, 0);
        assert!(job.jobs.lock().expect("jobs").is_empty());
    }
}
