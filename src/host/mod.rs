//! Host primitives behind the checkpoint manager: the auto-resume trigger and
//! the reboot request.
//!
//! Native implementations shell out to the OS tools (`schtasks.exe`, `reg.exe`,
//! `shutdown.exe`) through a [CommandRunner]; the `recording` implementations
//! only remember what they were asked to do.

use std::process::Command;
use thiserror::Error;
use tracing::{instrument, trace};

use crate::types::ResumeCommand;

mod recording;
mod run_once;
mod scheduled_task;
mod shutdown;

pub use recording::{RecordingRebooter, RecordingScheduler, TriggerCall};
pub use run_once::{RUN_ONCE_MAX_COMMAND_LEN, RunOnceTrigger};
pub use scheduled_task::{SCHTASKS_MAX_COMMAND_LEN, ScheduledTaskTrigger, TaskTrigger};
pub use shutdown::{RebootPlatform, ShutdownRebooter};

/// Failure of a host primitive.
#[derive(Debug, Error)]
pub enum HostError {
  #[error("cannot start `{program}`: {source}")]
  Spawn {
    program: String,
    #[source]
    source: std::io::Error,
  },

  #[error("`{program}` exited with status {code:?}: {stderr}")]
  Exit {
    program: String,
    code: Option<i32>,
    stderr: String,
  },

  #[error("host refused: {0}")]
  Refused(String),
}

/// Registers and removes the OS hook that re-invokes the orchestrator after a reboot.
pub trait ResumeScheduler {
  fn schedule(&self, command: &ResumeCommand) -> Result<(), HostError>;

  /// Removes the hook so it fires at most once.
  fn cancel(&self) -> Result<(), HostError>;

  /// Longest command line (in characters) the hook accepts, if limited.
  fn max_command_len(&self) -> Option<usize> {
    None
  }
}

/// Reboot request handed to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebootRequest {
  pub delay_secs: u32,
  pub reason: String,
}

/// Asks the host to restart.
pub trait Rebooter {
  fn reboot(&self, request: &RebootRequest) -> Result<(), HostError>;
}

/// Runs an external program to completion.
pub trait CommandRunner {
  fn run(&self, program: &str, args: &[String]) -> Result<(), HostError>;
}

/// [CommandRunner] backed by `std::process::Command`; nonzero exit is an error.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
  #[instrument(level = "trace", skip(self))]
  fn run(&self, program: &str, args: &[String]) -> Result<(), HostError> {
    let output = Command::new(program)
      .args(args)
      .output()
      .map_err(|source| HostError::Spawn {
        program: program.to_string(),
        source,
      })?;
    trace!(program, status = ?output.status, "host command finished");
    if output.status.success() {
      Ok(())
    } else {
      Err(HostError::Exit {
        program: program.to_string(),
        code: output.status.code(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
      })
    }
  }
}
