//! # Terminal outcome of a run.

use tracing::{error, warn};

use crate::error::{Diagnosis, RunError, classify, exit_code};

/// How a run ended. Produced exactly once per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every address was audited and written.
    Success,
    /// An interrupt won the race; cleanup still ran.
    Interrupted,
    /// The pipeline failed.
    Failed(Diagnosis),
}

impl RunOutcome {
    /// Classifies a pipeline failure.
    pub fn from_error(err: &RunError) -> Self {
        RunOutcome::Failed(classify(err))
    }

    /// Process exit code: `0`, `130`, or the diagnosis code (`1` / `67`).
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Success => exit_code::SUCCESS,
            RunOutcome::Interrupted => exit_code::INTERRUPTED,
            RunOutcome::Failed(d) => d.exit_code,
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RunOutcome::Success => "success",
            RunOutcome::Interrupted => "interrupted",
            RunOutcome::Failed(d) => d.cause.as_label(),
        }
    }

    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Success)
    }

    /// Logs the user-facing message for a non-successful outcome.
    pub fn report(&self) {
        match self {
            RunOutcome::Success => {}
            RunOutcome::Interrupted => warn!("run interrupted"),
            RunOutcome::Failed(d) => {
                error!(cause = d.cause.as_label(), "{}", d.message);
                if let Some(detail) = &d.detail {
                    error!("{detail}");
                }
            }
        }
    }
}
