//! # Worker process control.
//!
//! - [`WorkerController`] the seam the supervisor drives (probe / launch / kill)
//! - [`ProcessController`] spawns a local binary with a remote-debugging port
//! - [`handshake`] one bounded control-protocol handshake against `127.0.0.1:<port>`

mod controller;
mod probe;
mod process;

pub use controller::{WorkerController, WorkerControllerRef};
pub use probe::handshake;
pub use process::ProcessController;
