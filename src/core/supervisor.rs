//! # Process supervisor: brings a worker up, confirms readiness, tears it down.
//!
//! [`ProcessSupervisor`] drives a [`WorkerController`](crate::WorkerController) for one resolved port.
//!
//! ## Launch protocol ([`ProcessSupervisor::ensure_ready`])
//! ```text
//! probe once ──► ok ─────────────────────────────────────────► Ready (external, nothing launched)
//!      │
//!      └─► failed ─► LaunchMode::Attach   ─► ConnectionRefused | Probe error
//!                  ├► LaunchMode::Wait     ─► poll ─────────────────────────► Ready | ProtocolTimeout
//!                  └► LaunchMode::Managed  ─► launch + register kill ─► poll ─► Ready | ProtocolTimeout
//!                                                                        └───► WorkerExited
//! ```
//!
//! ## Rules
//! - A probe never starts anything
//! - The kill teardown is registered with the [`CleanupRegistry`] right after the spawn;
//!   if the registry is already drained the worker is killed on the spot
//! - Polling is bounded by [`ReadinessPolicy`]; running out is a protocol timeout
//! - [`ProcessSupervisor::kill`] is idempotent and only touches a worker this supervisor launched

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, warn};

use crate::config::RunConfig;
use crate::core::cleanup::CleanupRegistry;
use crate::core::state::{RunState, StateCell};
use crate::error::{LaunchError, ProbeError, RunError};
use crate::events::{Bus, Event, EventKind};
use crate::policies::ReadinessPolicy;
use crate::worker::WorkerControllerRef;

/// Name under which the worker teardown is registered.
pub const KILL_WORKER: &str = "kill-worker";

/// Lifecycle of the worker bound to the run's port.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerState {
    NotStarted,
    /// Spawned (or awaited), not yet answering the handshake.
    Starting,
    /// Completed a handshake.
    Ready,
    /// Killed or torn down.
    Terminated,
}

/// Snapshot of the worker bound to a port.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkerHandle {
    pub port: u16,
    pub state: WorkerState,
    /// `true` when this run spawned the process (and will kill it).
    pub managed: bool,
}

/// What to do when the first probe fails.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LaunchMode {
    /// Fail right away.
    Attach,
    /// Keep polling for a worker started by someone else.
    Wait,
    /// Launch a worker, then poll.
    Managed,
}

impl LaunchMode {
    /// `auto_launch` wins over `prefer_external`.
    pub fn from_config(cfg: &RunConfig) -> Self {
        match (cfg.auto_launch, cfg.prefer_external) {
            (true, _) => LaunchMode::Managed,
            (false, true) => LaunchMode::Wait,
            (false, false) => LaunchMode::Attach,
        }
    }
}

/// Owns the worker lifecycle for one port.
pub struct ProcessSupervisor {
    port: u16,
    mode: LaunchMode,
    readiness: ReadinessPolicy,
    controller: WorkerControllerRef,
    registry: Arc<CleanupRegistry>,
    bus: Bus,
    state: Option<StateCell>,
    handle: Mutex<WorkerHandle>,
}

impl ProcessSupervisor {
    pub fn new(
        port: u16,
        mode: LaunchMode,
        readiness: ReadinessPolicy,
        controller: WorkerControllerRef,
        registry: Arc<CleanupRegistry>,
        bus: Bus,
    ) -> Self {
        Self {
            port,
            mode,
            readiness,
            controller,
            registry,
            bus,
            state: None,
            handle: Mutex::new(WorkerHandle {
                port,
                state: WorkerState::NotStarted,
                managed: false,
            }),
        }
    }

    /// Reports `Launching` / `Probing` transitions to the run.
    pub(crate) fn with_state(mut self, state: StateCell) -> Self {
        self.state = Some(state);
        self
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn mode(&self) -> LaunchMode {
        self.mode
    }

    /// Current worker snapshot.
    pub fn handle(&self) -> WorkerHandle {
        *self.lock()
    }

    pub fn state(&self) -> WorkerState {
        self.lock().state
    }

    /// One bounded handshake. Never starts a process.
    pub async fn is_ready(&self) -> Result<(), ProbeError> {
        let timeout = self.readiness.probe_timeout;
        match time::timeout(timeout, self.controller.is_ready(self.port, timeout)).await {
            Ok(res) => res,
            Err(_elapsed) => Err(ProbeError::Timeout {
                port: self.port,
                timeout,
            }),
        }
    }

    /// Starts the worker and registers its teardown.
    ///
    /// Returns [`LaunchError::RegistryClosed`] (after killing the fresh process) when the
    /// run is already cleaning up.
    pub async fn launch(self: &Arc<Self>) -> Result<(), LaunchError> {
        self.controller.launch(self.port).await?;
        self.set(WorkerState::Starting, true);
        self.bus
            .publish(Event::new(EventKind::WorkerLaunched).with_port(self.port));

        let this = Arc::clone(self);
        let registered = self
            .registry
            .register(KILL_WORKER, move || async move { this.kill().await });
        if let Err(teardown) = registered {
            debug!(port = self.port, "cleanup already ran, stopping worker again");
            teardown().await?;
            return Err(LaunchError::RegistryClosed);
        }
        Ok(())
    }

    /// Runs the launch protocol and returns the ready worker.
    pub async fn ensure_ready(self: &Arc<Self>) -> Result<WorkerHandle, RunError> {
        let port = self.port;
        let first = self.probe(1).await;

        let err = match first {
            Ok(()) => {
                self.set(WorkerState::Ready, false);
                self.bus
                    .publish(Event::new(EventKind::WorkerExternal).with_port(port));
                return Ok(self.handle());
            }
            Err(e) => e,
        };
        self.publish_probe_failed(1, &err, None);

        match self.mode {
            LaunchMode::Attach if err.is_connection_refused() => {
                Err(RunError::ConnectionRefused { port, source: err })
            }
            LaunchMode::Attach => Err(RunError::Probe { port, source: err }),
            LaunchMode::Wait => {
                self.enter(RunState::Probing);
                self.set(WorkerState::Starting, false);
                self.poll(1).await
            }
            LaunchMode::Managed => {
                self.enter(RunState::Launching);
                self.launch().await?;
                self.enter(RunState::Probing);
                self.poll(1).await
            }
        }
    }

    /// Polls the endpoint until it answers or the readiness bound runs out.
    pub async fn wait_until_ready(&self) -> Result<WorkerHandle, RunError> {
        self.poll(0).await
    }

    /// Bounded poll after `made` earlier probes; attempt numbers and the
    /// reported total include those probes.
    async fn poll(&self, made: u32) -> Result<WorkerHandle, RunError> {
        let attempts = self.readiness.attempts();
        let started = Instant::now();

        for n in 1..=attempts {
            let attempt = made + n;
            let err = match self.probe(attempt).await {
                Ok(()) => {
                    self.set(WorkerState::Ready, false);
                    self.bus.publish(
                        Event::new(EventKind::WorkerReady)
                            .with_port(self.port)
                            .with_attempt(attempt),
                    );
                    return Ok(self.handle());
                }
                Err(e) => e,
            };

            if self.handle().managed && self.controller.has_exited().await {
                self.publish_probe_failed(attempt, &err, None);
                // releases the controller's child slot and output forwarders
                if let Err(e) = self.kill().await {
                    warn!(port = self.port, error = %e, "releasing exited worker failed");
                }
                return Err(RunError::WorkerExited { port: self.port });
            }

            if n < attempts {
                let delay = self.readiness.backoff.next(n - 1);
                self.publish_probe_failed(attempt, &err, Some(delay));
                time::sleep(delay).await;
            } else {
                self.publish_probe_failed(attempt, &err, None);
            }
        }

        Err(RunError::ProtocolTimeout {
            port: self.port,
            attempts: made + attempts,
            waited: started.elapsed(),
        })
    }

    /// Stops a worker this supervisor launched. Idempotent.
    pub async fn kill(&self) -> Result<(), LaunchError> {
        {
            let mut handle = self.lock();
            if !handle.managed || handle.state == WorkerState::Terminated {
                return Ok(());
            }
            handle.state = WorkerState::Terminated;
        }

        self.controller.kill().await?;
        self.bus
            .publish(Event::new(EventKind::WorkerKilled).with_port(self.port));
        Ok(())
    }

    async fn probe(&self, attempt: u32) -> Result<(), ProbeError> {
        self.bus.publish(
            Event::new(EventKind::WorkerProbing)
                .with_port(self.port)
                .with_attempt(attempt),
        );
        self.is_ready().await
    }

    fn publish_probe_failed(&self, attempt: u32, err: &ProbeError, delay: Option<Duration>) {
        let mut ev = Event::new(EventKind::WorkerProbeFailed)
            .with_port(self.port)
            .with_attempt(attempt)
            .with_reason(err.to_string());
        if let Some(d) = delay {
            ev = ev.with_delay(d);
        }
        self.bus.publish(ev);
    }

    fn set(&self, state: WorkerState, managed: bool) {
        let mut handle = self.lock();
        // a torn-down worker never comes back
        if handle.state != WorkerState::Terminated {
            handle.state = state;
        }
        handle.managed |= managed;
    }

    fn enter(&self, next: RunState) {
        if let Some(cell) = &self.state {
            cell.enter(next);
        }
    }

    fn lock(&self) -> MutexGuard<'_, WorkerHandle> {
        self.handle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
