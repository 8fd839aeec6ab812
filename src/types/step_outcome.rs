//! What a step action reports back to the scheduler.

use std::fmt;

/// Successful result of a step action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
  /// The step finished; the scheduler moves on to the next one.
  Completed,
  /// The step requested a checkpoint; the scheduler stops this process's run.
  CheckpointRequested,
}

impl fmt::Display for StepOutcome {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      StepOutcome::Completed => write!(f, "completed"),
      StepOutcome::CheckpointRequested => write!(f, "checkpoint_requested"),
    }
  }
}
