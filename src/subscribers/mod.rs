//! # Event subscribers for the auditvisor runtime.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out
//! and the built-in [`LogWriter`].
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   Runner / ProcessSupervisor / SequentialRunner ── publish(Event) ──► Bus
//!                                                                        │
//!                                                     subscriber_listener (in Runner)
//!                                                                        │
//!                                                                   SubscriberSet
//!                                                          ┌─────────────┼─────────────┐
//!                                                          ▼             ▼             ▼
//!                                                      LogWriter      Metrics       Custom
//! ```
//!
//! ## Implementing custom subscribers
//! ```no_run
//! use auditvisor::{Event, EventKind, Subscribe};
//! use async_trait::async_trait;
//!
//! struct Progress;
//!
//! #[async_trait]
//! impl Subscribe for Progress {
//!     async fn on_event(&self, event: &Event) {
//!         if event.kind == EventKind::TargetWritten {
//!             // advance a progress bar
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str {
//!         "progress"
//!     }
//! }
//! ```

mod log;
mod subscriber;
mod subscriber_set;

pub use log::LogWriter;
pub use subscriber::Subscribe;
pub use subscriber_set::SubscriberSet;
