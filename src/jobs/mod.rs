//! # Per-target jobs and result writers.
//!
//! - [`AuditJob`] the opaque per-address operation producing a [`ResultDocument`]
//! - [`JobFn`] closure-backed job
//! - [`ResultWriter`] where a document goes, and [`ReportWriter`] the built-in writer
//! - [`slug`] / [`secondary_report_path`] naming of the HTML copy written in pretty mode

mod document;
mod job;
mod job_fn;
mod slug;
mod writer;

pub use document::ResultDocument;
pub use job::{AuditJob, AuditJobRef};
pub use job_fn::JobFn;
pub use slug::{secondary_report_path, slug};
pub use writer::{ReportWriter, ResultWriter, ResultWriterRef};
