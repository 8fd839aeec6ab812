//! Lifecycle of one process's share of a provisioning run.

use std::fmt;

/// `Idle → Loading → (Fresh | Resumed) → Running → {CheckpointPending → Rebooting | Completed | Failed}`.
///
/// `Rebooting` ends the current process; the next process starts again at `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
  Idle,
  Loading,
  Fresh,
  Resumed,
  Running,
  CheckpointPending,
  Rebooting,
  Completed,
  Failed,
}

impl RunState {
  pub fn can_transition_to(self, next: RunState) -> bool {
    use RunState::*;
    matches!(
      (self, next),
      (Idle, Loading)
        | (Loading, Fresh)
        | (Loading, Resumed)
        | (Loading, Completed)
        | (Loading, Failed)
        | (Fresh, Running)
        | (Resumed, Running)
        | (Fresh, Failed)
        | (Resumed, Failed)
        | (Running, CheckpointPending)
        | (Running, Completed)
        | (Running, Failed)
        | (CheckpointPending, Rebooting)
        | (CheckpointPending, Failed)
    )
  }

  pub fn is_terminal(self) -> bool {
    matches!(self, RunState::Rebooting | RunState::Completed | RunState::Failed)
  }
}

impl fmt::Display for RunState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      RunState::Idle => "idle",
      RunState::Loading => "loading",
      RunState::Fresh => "fresh",
      RunState::Resumed => "resumed",
      RunState::Running => "running",
      RunState::CheckpointPending => "checkpoint_pending",
      RunState::Rebooting => "rebooting",
      RunState::Completed => "completed",
      RunState::Failed => "failed",
    };
    f.write_str(s)
  }
}
