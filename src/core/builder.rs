use std::sync::Arc;

use crate::{
    config::RunConfig,
    core::{cleanup::CleanupRegistry, runner::Runner, state::StateCell},
    events::Bus,
    jobs::{AuditJobRef, ReportWriter, ResultWriterRef},
    subscribers::Subscribe,
    worker::{ProcessController, WorkerControllerRef},
};

/// Builder for a [`Runner`] with optional collaborators.
///
/// Defaults: [`ReportWriter`] for results and a [`ProcessController`] built from
/// [`RunConfig::worker`].
pub struct RunnerBuilder {
    cfg: RunConfig,
    job: AuditJobRef,
    writer: Option<ResultWriterRef>,
    controller: Option<WorkerControllerRef>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl RunnerBuilder {
    pub fn new(cfg: RunConfig, job: AuditJobRef) -> Self {
        Self {
            cfg,
            job,
            writer: None,
            controller: None,
            subscribers: Vec::new(),
        }
    }

    /// Replaces the result writer.
    pub fn with_writer(mut self, writer: ResultWriterRef) -> Self {
        self.writer = Some(writer);
        self
    }

    /// Replaces the worker controller.
    pub fn with_controller(mut self, controller: WorkerControllerRef) -> Self {
        self.controller = Some(controller);
        self
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events (state changes, worker lifecycle, targets, cleanup)
    /// through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the runner. Nothing is spawned until the runner is started.
    pub fn build(self) -> Runner {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let cleanup = Arc::new(CleanupRegistry::with_bus(bus.clone()));
        let state = StateCell::new(bus.clone());

        let writer = self
            .writer
            .unwrap_or_else(|| Arc::new(ReportWriter::new()));
        let controller = self
            .controller
            .unwrap_or_else(|| Arc::new(ProcessController::new(self.cfg.worker.clone())));

        Runner::new_internal(
            self.cfg,
            self.job,
            writer,
            controller,
            self.subscribers,
            bus,
            cleanup,
            state,
        )
    }
}
