//! # Runner: one complete, interruptible run.
//!
//! [`Runner`] wires the pieces together and owns the run's [`CleanupRegistry`],
//! event [`Bus`] and [`RunState`].
//!
//! ## Architecture
//! ```text
//! run_until(interrupt)
//!   │
//!   ├─► subscriber listener: Bus.subscribe() ─► SubscriberSet::emit(&Event)
//!   │
//!   ├─► tokio::spawn(pipeline):
//!   │       ResolvingPort   resolve_port(cfg.port)
//!   │       (Launching      ProcessSupervisor::ensure_ready  ── registers kill-worker
//!   │        Probing)?
//!   │       Running         SequentialRunner::run(addresses)
//!   │
//!   ├─► race(pipeline, interrupt)
//!   │       Pipeline(Ok)  → Success
//!   │       Pipeline(Err) → Failed(classify(err))
//!   │       Panicked      → Failed(RuntimeError)
//!   │       Interrupted   → stop token cancelled, pipeline detached → Interrupted
//!   │
//!   ├─► Cleanup      CleanupRegistry::run_all()   (always)
//!   ├─► Terminated   publish RunFinished
//!   └─► listener drained and shut down → RunOutcome
//! ```
//!
//! ## Rules
//! - The cleanup registry is drained on every path before the outcome is returned
//! - The interrupt future is dropped once the race settles; later interrupts are ignored
//! - A detached pipeline never launches a worker that outlives the run: the registry is
//!   closed, so a late launch kills its own process
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use auditvisor::{JobError, JobFn, LogWriter, ResultDocument, RunConfig, Runner, Subscribe};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let cfg = RunConfig::for_addresses(["https://example.com"]).with_port(0);
//!
//!     // cfg.port is the port picked for the worker, never 0
//!     let job = JobFn::arc(|address: String, cfg: RunConfig| async move {
//!         Ok::<_, JobError>(ResultDocument::new(address, serde_json::json!({ "port": cfg.port })))
//!     });
//!
//!     let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
//!     let runner = Runner::builder(cfg, job).with_subscribers(subs).build();
//!
//!     let outcome = runner.run().await;
//!     outcome.report();
//!     std::process::exit(outcome.exit_code());
//! }
//! ```

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    config::RunConfig,
    core::{
        builder::RunnerBuilder,
        cleanup::CleanupRegistry,
        interrupt::interrupt_or_pending,
        outcome::RunOutcome,
        port::resolve_port,
        race::{Settled, race},
        sequence::SequentialRunner,
        state::{RunState, StateCell},
        supervisor::{LaunchMode, ProcessSupervisor},
    },
    error::RunError,
    events::{Bus, Event, EventKind},
    jobs::{AuditJobRef, ResultWriterRef},
    subscribers::{Subscribe, SubscriberSet},
    worker::WorkerControllerRef,
};

/// Drives one run from port resolution to cleanup.
pub struct Runner {
    cfg: RunConfig,
    job: AuditJobRef,
    writer: ResultWriterRef,
    controller: WorkerControllerRef,
    subscribers: Vec<Arc<dyn Subscribe>>,
    bus: Bus,
    cleanup: Arc<CleanupRegistry>,
    state: StateCell,
}

impl Runner {
    /// Starts building a runner for `cfg` that audits each address with `job`.
    pub fn builder(cfg: RunConfig, job: AuditJobRef) -> RunnerBuilder {
        RunnerBuilder::new(cfg, job)
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new_internal(
        cfg: RunConfig,
        job: AuditJobRef,
        writer: ResultWriterRef,
        controller: WorkerControllerRef,
        subscribers: Vec<Arc<dyn Subscribe>>,
        bus: Bus,
        cleanup: Arc<CleanupRegistry>,
        state: StateCell,
    ) -> Self {
        Self {
            cfg,
            job,
            writer,
            controller,
            subscribers,
            bus,
            cleanup,
            state,
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.cfg
    }

    /// Watches the run state; the last value seen after the run is `Terminated`.
    pub fn state(&self) -> watch::Receiver<RunState> {
        self.state.subscribe()
    }

    /// The run's cleanup registry. Callers may register their own release actions.
    pub fn cleanup(&self) -> &Arc<CleanupRegistry> {
        &self.cleanup
    }

    /// The run's event bus.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Runs until completion or until an OS interrupt signal arrives.
    pub async fn run(self) -> RunOutcome {
        self.run_until(interrupt_or_pending()).await
    }

    /// Runs until completion or until `interrupt` resolves.
    pub async fn run_until<I>(self, interrupt: I) -> RunOutcome
    where
        I: Future<Output = ()>,
    {
        let Runner {
            cfg,
            job,
            writer,
            controller,
            subscribers,
            bus,
            cleanup,
            state,
        } = self;

        let listener = Listener::start(subscribers, &bus);
        let stop = CancellationToken::new();

        let pipeline = Pipeline {
            cfg,
            job,
            writer,
            controller,
            bus: bus.clone(),
            cleanup: Arc::clone(&cleanup),
            state: state.clone(),
            stop: stop.clone(),
        };
        let handle = tokio::spawn(pipeline.drive());

        let outcome = match race(handle, interrupt).await {
            Settled::Pipeline(Ok(done)) => {
                debug!(done, "pipeline completed");
                RunOutcome::Success
            }
            Settled::Pipeline(Err(e)) => {
                debug!(error = e.as_label(), "pipeline failed");
                RunOutcome::from_error(&e)
            }
            Settled::Panicked(message) => RunOutcome::from_error(&RunError::Panicked { message }),
            Settled::Interrupted => {
                bus.publish(Event::new(EventKind::InterruptReceived));
                stop.cancel();
                RunOutcome::Interrupted
            }
        };

        state.enter(RunState::Cleanup);
        cleanup.run_all().await;
        state.enter(RunState::Terminated);
        bus.publish(Event::new(EventKind::RunFinished).with_reason(outcome.as_label()));

        if let Some(listener) = listener {
            listener.stop().await;
        }
        outcome
    }
}

/// Everything the spawned pipeline task owns.
struct Pipeline {
    cfg: RunConfig,
    job: AuditJobRef,
    writer: ResultWriterRef,
    controller: WorkerControllerRef,
    bus: Bus,
    cleanup: Arc<CleanupRegistry>,
    state: StateCell,
    stop: CancellationToken,
}

impl Pipeline {
    async fn drive(self) -> Result<usize, RunError> {
        self.state.enter(RunState::ResolvingPort);
        let port = resolve_port(self.cfg.port).await?;
        self.bus
            .publish(Event::new(EventKind::PortResolved).with_port(port));

        let cfg = RunConfig { port, ..self.cfg };

        let supervisor = Arc::new(
            ProcessSupervisor::new(
                port,
                LaunchMode::from_config(&cfg),
                cfg.readiness,
                self.controller,
                self.cleanup,
                self.bus.clone(),
            )
            .with_state(self.state.clone()),
        );
        supervisor.ensure_ready().await?;

        self.state.enter(RunState::Running);
        SequentialRunner::new(self.job, self.writer, self.bus)
            .with_stop(self.stop)
            .run(&cfg)
            .await
    }
}

/// Forwards bus events to the subscriber set until stopped.
struct Listener {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl Listener {
    fn start(subscribers: Vec<Arc<dyn Subscribe>>, bus: &Bus) -> Option<Self> {
        if subscribers.is_empty() {
            return None;
        }

        let set = SubscriberSet::new(subscribers, bus.clone());
        let mut rx = bus.subscribe();
        let token = CancellationToken::new();
        let stop = token.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    ev = rx.recv() => match ev {
                        Ok(ev) => set.emit(&ev),
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    _ = stop.cancelled() => break,
                }
            }
            loop {
                match rx.try_recv() {
                    Ok(ev) => set.emit(&ev),
                    Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                    Err(_) => break,
                }
            }
            set.shutdown().await;
        });

        Some(Self { token, handle })
    }

    /// Delivers what is already published, then waits for the subscribers to finish.
    async fn stop(self) {
        self.token.cancel();
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::oneshot;

    use crate::config::{Destination, OutputMode};
    use crate::error::{Cause, JobError, LaunchError, ProbeError, WriteError};
    use crate::jobs::{JobFn, ResultDocument, ResultWriter};
    use crate::worker::WorkerController;

    /// Refuses until launched; ready on the first probe after launch when `comes_up`.
    struct FakeWorker {
        comes_up: bool,
        launched: AtomicU32,
        kills: AtomicU32,
    }

    impl FakeWorker {
        fn new(comes_up: bool) -> Arc<Self> {
            Arc::new(Self {
                comes_up,
                launched: AtomicU32::new(0),
                kills: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl WorkerController for FakeWorker {
        async fn is_ready(&self, port: u16, _timeout: Duration) -> Result<(), ProbeError> {
            if self.comes_up && self.launched.load(Ordering::SeqCst) > 0 {
                return Ok(());
            }
            Err(ProbeError::Connect {
                port,
                source: io::Error::new(io::ErrorKind::ConnectionRefused, "refused"),
            })
        }

        async fn launch(&self, _port: u16) -> Result<(), LaunchError> {
            self.launched.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn kill(&self) -> Result<(), LaunchError> {
            self.kills.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct Sink {
        written: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ResultWriter for Sink {
        async fn write(
            &self,
            doc: ResultDocument,
            _mode: OutputMode,
            _destination: &Destination,
        ) -> Result<ResultDocument, WriteError> {
            self.written.lock().expect("sink").push(doc.address.clone());
            Ok(doc)
        }
    }

    #[derive(Default)]
    struct States {
        seen: Mutex<Vec<RunState>>,
    }

    #[async_trait]
    impl Subscribe for States {
        async fn on_event(&self, event: &Event) {
            if let Some(state) = event.state {
                self.seen.lock().expect("states").push(state);
            }
        }

        fn name(&self) -> &'static str {
            "states"
        }
    }

    fn echo() -> AuditJobRef {
        JobFn::arc(|address: String, _cfg: RunConfig| async move {
            Ok::<_, JobError>(ResultDocument::new(address, json!({ "ok": true })))
        })
    }

    fn config(addresses: &[&str]) -> RunConfig {
        RunConfig::for_addresses(addresses.iter().copied())
            .with_port(0)
            .with_output(OutputMode::Json, Destination::Stdout)
    }

    #[tokio::test(start_paused = true)]
    async fn test_launch_audit_and_teardown() {
        let worker = FakeWorker::new(true);
        let sink = Arc::new(Sink::default());
        let states = Arc::new(States::default());

        let runner = Runner::builder(config(&["https://a.example", "https://b.example"]), echo())
            .with_controller(worker.clone())
            .with_writer(sink.clone())
            .with_subscribers(vec![states.clone() as Arc<dyn Subscribe>])
            .build();
        let state = runner.state();

        let outcome = runner.run_until(std::future::pending()).await;
        assert_eq!(outcome, RunOutcome::Success);
        assert_eq!(outcome.exit_code(), 0);

        assert_eq!(
            *sink.written.lock().expect("sink"),
            vec!["https://a.example", "https://b.example"]
        );
        assert_eq!(worker.launched.load(Ordering::SeqCst), 1);
        assert_eq!(worker.kills.load(Ordering::SeqCst), 1);
        assert_eq!(*state.borrow(), RunState::Terminated);
        assert_eq!(
            *states.seen.lock().expect("states"),
            vec![
                RunState::ResolvingPort,
                RunState::Launching,
                RunState::Probing,
                RunState::Running,
                RunState::Cleanup,
                RunState::Terminated,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_address_audits_once_and_kills_once() {
        let worker = FakeWorker::new(true);
        let sink = Arc::new(Sink::default());
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let job: AuditJobRef = JobFn::arc(move |address: String, _cfg: RunConfig| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move { Ok::<_, JobError>(ResultDocument::new(address, json!({ "ok": true }))) }
        });

        let runner = Runner::builder(config(&["https://a.example"]), job)
            .with_controller(worker.clone())
            .with_writer(sink.clone())
            .build();
        let outcome = runner.run_until(std::future::pending()).await;

        assert_eq!(outcome, RunOutcome::Success);
        assert_eq!(outcome.exit_code(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(*sink.written.lock().expect("sink"), vec!["https://a.example"]);
        assert_eq!(worker.launched.load(Ordering::SeqCst), 1);
        assert_eq!(worker.kills.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_address_failure_skips_the_rest() {
        let worker = FakeWorker::new(true);
        let sink = Arc::new(Sink::default());
        let calls = Arc::new(Mutex::new(Vec::<String>::new()));
        let seen = Arc::clone(&calls);
        let job: AuditJobRef = JobFn::arc(move |address: String, _cfg: RunConfig| {
            seen.lock().expect("calls").push(address);
            async move { Err::<ResultDocument, _>(JobError::failed("audit failed")) }
        });

        let runner = Runner::builder(config(&["https://one.example", "https://two.example"]), job)
            .with_controller(worker.clone())
            .with_writer(sink.clone())
            .build();
        let outcome = runner.run_until(std::future::pending()).await;

        match &outcome {
            RunOutcome::Failed(d) => assert_eq!(d.cause, Cause::RuntimeError),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(outcome.exit_code(), 1);
        assert_eq!(*calls.lock().expect("calls"), vec!["https://one.example"]);
        assert!(sink.written.lock().expect("sink").is_empty());
        assert_eq!(worker.kills.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_job_receives_resolved_port() {
        let worker = FakeWorker::new(true);
        let ports = Arc::new(Mutex::new(Vec::<u16>::new()));
        let seen = Arc::clone(&ports);
        let job: AuditJobRef = JobFn::arc(move |address: String, cfg: RunConfig| {
            seen.lock().expect("ports").push(cfg.port);
            async move { Ok::<_, JobError>(ResultDocument::new(address, json!(null))) }
        });

        let runner = Runner::builder(config(&["https://a.example", "https://b.example"]), job)
            .with_controller(worker)
            .with_writer(Arc::new(Sink::default()))
            .build();
        let outcome = runner.run_until(std::future::pending()).await;
        assert!(outcome.is_success());

        let ports = ports.lock().expect("ports").clone();
        assert_eq!(ports.len(), 2);
        assert_ne!(ports[0], 0);
        assert_eq!(ports[0], ports[1]);
    }

    #[tokio::test]
    async fn test_refused_without_auto_launch() {
        let worker = FakeWorker::new(true);
        let sink = Arc::new(Sink::default());
        let cfg = config(&["https://a.example"]).with_auto_launch(false);

        let runner = Runner::builder(cfg, echo())
            .with_controller(worker.clone())
            .with_writer(sink.clone())
            .build();
        let outcome = runner.run_until(std::future::pending()).await;

        match &outcome {
            RunOutcome::Failed(d) => assert_eq!(d.cause, Cause::ConnectionRefused),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(outcome.exit_code(), 1);
        assert_eq!(worker.launched.load(Ordering::SeqCst), 0);
        assert!(sink.written.lock().expect("sink").is_empty());
    }

    #[tokio::test]
    async fn test_interrupt_during_job_still_cleans_up() {
        let worker = FakeWorker::new(true);
        let (started_tx, started_rx) = oneshot::channel::<()>();
        let started = Arc::new(Mutex::new(Some(started_tx)));

        let job: AuditJobRef = JobFn::arc(move |_address: String, _cfg: RunConfig| {
            let tx = started.lock().expect("started").take();
            async move {
                if let Some(tx) = tx {
                    let _ = tx.send(());
                }
                std::future::pending::<Result<ResultDocument, JobError>>().await
            }
        });

        let runner = Runner::builder(config(&["https://slow.example", "https://never.example"]), job)
            .with_controller(worker.clone())
            .with_writer(Arc::new(Sink::default()))
            .build();
        let cleanup = Arc::clone(runner.cleanup());
        let state = runner.state();

        let outcome = runner
            .run_until(async move {
                let _ = started_rx.await;
            })
            .await;

        assert_eq!(outcome, RunOutcome::Interrupted);
        assert_eq!(outcome.exit_code(), 130);
        assert_eq!(worker.kills.load(Ordering::SeqCst), 1);
        assert!(cleanup.is_drained());
        assert_eq!(*state.borrow(), RunState::Terminated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_worker_never_ready_is_protocol_timeout() {
        let worker = FakeWorker::new(false);
        let sink = Arc::new(Sink::default());

        let runner = Runner::builder(config(&["https://a.example"]), echo())
            .with_controller(worker.clone())
            .with_writer(sink.clone())
            .build();
        let outcome = runner.run_until(std::future::pending()).await;

        match &outcome {
            RunOutcome::Failed(d) => assert_eq!(d.cause, Cause::ProtocolTimeout),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(outcome.exit_code(), 67);
        assert_eq!(worker.kills.load(Ordering::SeqCst), 1);
        assert!(sink.written.lock().expect("sink").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_job_is_runtime_error() {
        let worker = FakeWorker::new(true);
        let job: AuditJobRef = JobFn::arc(|_address: String, _cfg: RunConfig| async move {
            if true {
                panic!("gather exploded");
            }
            Ok::<_, JobError>(ResultDocument::new("", json!(null)))
        });

        let runner = Runner::builder(config(&["https://a.example"]), job)
            .with_controller(worker.clone())
            .with_writer(Arc::new(Sink::default()))
            .build();
        let outcome = runner.run_until(std::future::pending()).await;

        match &outcome {
            RunOutcome::Failed(d) => {
                assert_eq!(d.cause, Cause::RuntimeError);
                assert!(d.message.contains("gather exploded"), "{}", d.message);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(worker.kills.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_caller_registered_cleanup_runs() {
        let worker = FakeWorker::new(true);
        let runner = Runner::builder(config(&[]), echo())
            .with_controller(worker)
            .with_writer(Arc::new(Sink::default()))
            .build();

        let ran = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&ran);
        let registered = runner.cleanup().register("remove-scratch", move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, io::Error>(())
        });
        assert!(registered.is_ok());

        let outcome = runner.run_until(std::future::pending()).await;
        assert!(outcome.is_success());
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }
}
