//! Auto-resume through the Windows Task Scheduler (`schtasks.exe`).

use std::sync::Arc;

use super::{CommandRunner, HostError, ResumeScheduler};
use crate::types::ResumeCommand;

const SCHTASKS: &str = "schtasks.exe";

/// `schtasks /TR` rejects longer task commands.
pub const SCHTASKS_MAX_COMMAND_LEN: usize = 261;

/// When the scheduled task fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskTrigger {
  /// Next interactive logon, in the logged-on user's session.
  Logon,
  /// Next boot, as SYSTEM, before anyone logs on.
  Boot,
}

/// One-shot scheduled task that re-invokes the orchestrator.
pub struct ScheduledTaskTrigger {
  task_name: String,
  trigger: TaskTrigger,
  runner: Arc<dyn CommandRunner>,
}

impl ScheduledTaskTrigger {
  pub fn new(task_name: impl Into<String>, trigger: TaskTrigger, runner: Arc<dyn CommandRunner>) -> Self {
    Self {
      task_name: task_name.into(),
      trigger,
      runner,
    }
  }

  pub(crate) fn create_args(&self, command: &ResumeCommand) -> Vec<String> {
    let mut args = vec![
      "/Create".to_string(),
      "/TN".to_string(),
      self.task_name.clone(),
      "/TR".to_string(),
      command.command_line(),
      "/SC".to_string(),
    ];
    match self.trigger {
      TaskTrigger::Logon => args.push("ONLOGON".to_string()),
      TaskTrigger::Boot => {
        args.push("ONSTART".to_string());
        args.push("/RU".to_string());
        args.push("SYSTEM".to_string());
      }
    }
    args.extend(["/RL".to_string(), "HIGHEST".to_string(), "/F".to_string()]);
    args
  }

  pub(crate) fn delete_args(&self) -> Vec<String> {
    vec![
      "/Delete".to_string(),
      "/TN".to_string(),
      self.task_name.clone(),
      "/F".to_string(),
    ]
  }
}

impl ResumeScheduler for ScheduledTaskTrigger {
  fn schedule(&self, command: &ResumeCommand) -> Result<(), HostError> {
    self.runner.run(SCHTASKS, &self.create_args(command))
  }

  fn cancel(&self) -> Result<(), HostError> {
    self.runner.run(SCHTASKS, &self.delete_args())
  }

  fn max_command_len(&self) -> Option<usize> {
    Some(SCHTASKS_MAX_COMMAND_LEN)
  }
}
