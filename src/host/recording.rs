//! Host implementations that record calls instead of touching the OS.
//! Used by tests and by `--simulate-host` runs.

use std::sync::Mutex;
use tracing::info;

use super::{HostError, RebootRequest, Rebooter, ResumeScheduler};
use crate::types::ResumeCommand;

/// Call seen by a [RecordingScheduler].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerCall {
  Schedule(ResumeCommand),
  Cancel,
}

/// Records trigger registrations; can be told to refuse them.
#[derive(Debug, Default)]
pub struct RecordingScheduler {
  calls: Mutex<Vec<TriggerCall>>,
  refuse_schedule: bool,
  refuse_cancel: bool,
  max_command_len: Option<usize>,
}

impl RecordingScheduler {
  pub fn new() -> Self {
    Self::default()
  }

  /// Scheduler that reports the same command length limit as a real hook.
  pub fn with_max_command_len(mut self, max: usize) -> Self {
    self.max_command_len = Some(max);
    self
  }

  /// Scheduler whose `schedule` fails.
  pub fn refusing_schedule() -> Self {
    Self {
      refuse_schedule: true,
      ..Self::default()
    }
  }

  /// Scheduler whose `cancel` fails.
  pub fn refusing_cancel() -> Self {
    Self {
      refuse_cancel: true,
      ..Self::default()
    }
  }

  pub fn calls(&self) -> Vec<TriggerCall> {
    self.calls.lock().unwrap_or_else(|p| p.into_inner()).clone()
  }

  /// Command of the most recent successful `schedule`.
  pub fn scheduled(&self) -> Option<ResumeCommand> {
    self.calls().into_iter().rev().find_map(|c| match c {
      TriggerCall::Schedule(cmd) => Some(cmd),
      TriggerCall::Cancel => None,
    })
  }

  fn push(&self, call: TriggerCall) {
    self.calls.lock().unwrap_or_else(|p| p.into_inner()).push(call);
  }
}

impl ResumeScheduler for RecordingScheduler {
  fn schedule(&self, command: &ResumeCommand) -> Result<(), HostError> {
    if self.refuse_schedule {
      return Err(HostError::Refused("trigger registration refused".to_string()));
    }
    info!(command = %command.command_line(), "simulated: auto-resume trigger registered");
    self.push(TriggerCall::Schedule(command.clone()));
    Ok(())
  }

  fn cancel(&self) -> Result<(), HostError> {
    if self.refuse_cancel {
      return Err(HostError::Refused("trigger removal refused".to_string()));
    }
    info!("simulated: auto-resume trigger removed");
    self.push(TriggerCall::Cancel);
    Ok(())
  }

  fn max_command_len(&self) -> Option<usize> {
    self.max_command_len
  }
}

/// Records reboot requests; can be told to refuse them.
#[derive(Debug, Default)]
pub struct RecordingRebooter {
  requests: Mutex<Vec<RebootRequest>>,
  refuse: bool,
}

impl RecordingRebooter {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn refusing() -> Self {
    Self {
      refuse: true,
      ..Self::default()
    }
  }

  pub fn requests(&self) -> Vec<RebootRequest> {
    self.requests.lock().unwrap_or_else(|p| p.into_inner()).clone()
  }
}

impl Rebooter for RecordingRebooter {
  fn reboot(&self, request: &RebootRequest) -> Result<(), HostError> {
    if self.refuse {
      return Err(HostError::Refused("reboot refused".to_string()));
    }
    info!(delay_secs = request.delay_secs, reason = %request.reason, "simulated: reboot requested");
    self
      .requests
      .lock()
      .unwrap_or_else(|p| p.into_inner())
      .push(request.clone());
    Ok(())
  }
}
