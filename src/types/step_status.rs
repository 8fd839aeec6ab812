//! Recorded status of an executed step.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a step in the run journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
  Running,
  Succeeded,
  CheckpointRequested,
  FailedBestEffort,
  Failed,
}

impl fmt::Display for StepStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      StepStatus::Running => write!(f, "running"),
      StepStatus::Succeeded => write!(f, "succeeded"),
      StepStatus::CheckpointRequested => write!(f, "checkpoint_requested"),
      StepStatus::FailedBestEffort => write!(f, "failed_best_effort"),
      StepStatus::Failed => write!(f, "failed"),
    }
  }
}
