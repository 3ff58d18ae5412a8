//! Runtime core: run orchestration and worker lifecycle.
//!
//! The public entry point is [`Runner`]; the other items are usable on their own.
//!
//! Internal modules:
//! - [`port`]: resolves the worker port (`0` = any free loopback port);
//! - [`cleanup`]: ordered, drain-once release actions;
//! - [`supervisor`]: probe / launch / poll / kill of the worker;
//! - [`sequence`]: one-at-a-time execution of the per-address job and writer;
//! - [`race`]: pipeline task vs. interrupt;
//! - [`interrupt`]: cross-platform interrupt signal handling;
//! - [`state`], [`outcome`]: run state machine and terminal outcome;
//! - [`runner`], [`builder`]: wiring of all of the above.

mod builder;
mod cleanup;
mod interrupt;
mod outcome;
mod port;
mod race;
mod runner;
mod sequence;
mod state;
mod supervisor;

pub use builder::RunnerBuilder;
pub use cleanup::CleanupRegistry;
pub use interrupt::wait_for_interrupt_signal;
pub use outcome::RunOutcome;
pub use port::resolve_port;
pub use race::{Settled, race};
pub use runner::Runner;
pub use sequence::SequentialRunner;
pub use state::RunState;
pub use supervisor::{KILL_WORKER, LaunchMode, ProcessSupervisor, WorkerHandle, WorkerState};
