//! Auto-resume through the machine `RunOnce` registry key (`reg.exe`).
//!
//! Windows deletes a `RunOnce` value before running it, so the hook fires at most
//! once even if the orchestrator never gets to cancel it.

use std::sync::Arc;

use super::{CommandRunner, HostError, ResumeScheduler};
use crate::types::ResumeCommand;

const REG: &str = "reg.exe";
/// Windows skips `RunOnce` entries longer than this.
pub const RUN_ONCE_MAX_COMMAND_LEN: usize = 260;

pub(crate) const RUN_ONCE_KEY: &str = r"HKLM\SOFTWARE\Microsoft\Windows\CurrentVersion\RunOnce";

/// `RunOnce` value that re-invokes the orchestrator at next logon.
pub struct RunOnceTrigger {
  value_name: String,
  runner: Arc<dyn CommandRunner>,
}

impl RunOnceTrigger {
  pub fn new(value_name: impl Into<String>, runner: Arc<dyn CommandRunner>) -> Self {
    Self {
      value_name: value_name.into(),
      runner,
    }
  }

  pub(crate) fn add_args(&self, command: &ResumeCommand) -> Vec<String> {
    vec![
      "add".to_string(),
      RUN_ONCE_KEY.to_string(),
      "/v".to_string(),
      self.value_name.clone(),
      "/t".to_string(),
      "REG_SZ".to_string(),
      "/d".to_string(),
      command.command_line(),
      "/f".to_string(),
    ]
  }

  pub(crate) fn delete_args(&self) -> Vec<String> {
    vec![
      "delete".to_string(),
      RUN_ONCE_KEY.to_string(),
      "/v".to_string(),
      self.value_name.clone(),
      "/f".to_string(),
    ]
  }
}

impl ResumeScheduler for RunOnceTrigger {
  fn schedule(&self, command: &ResumeCommand) -> Result<(), HostError> {
    self.runner.run(REG, &self.add_args(command))
  }

  fn cancel(&self) -> Result<(), HostError> {
    self.runner.run(REG, &self.delete_args())
  }

  fn max_command_len(&self) -> Option<usize> {
    Some(RUN_ONCE_MAX_COMMAND_LEN)
  }
}
