//! Checkpoint manager: persist resume state, arm the auto-resume trigger, reboot.

use chrono::Utc;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::checkpoint_io::CheckpointStore;
use crate::error::CheckpointError;
use crate::host::{RebootRequest, Rebooter, ResumeScheduler};
use crate::logging::{LogEntry, ProvisionLog, Severity};
use crate::types::{Checkpoint, ResumeTarget, Role, StepKey};

/// Seconds between the reboot request and the restart, by default.
pub const DEFAULT_REBOOT_DELAY_SECS: u32 = 10;

/// Performs checkpoint requests for one process run.
pub struct CheckpointManager {
  store: Arc<dyn CheckpointStore>,
  scheduler: Arc<dyn ResumeScheduler>,
  rebooter: Arc<dyn Rebooter>,
  log: Arc<dyn ProvisionLog>,
  run_id: Uuid,
  reboot_delay_secs: u32,
}

impl CheckpointManager {
  pub fn new(
    store: Arc<dyn CheckpointStore>,
    scheduler: Arc<dyn ResumeScheduler>,
    rebooter: Arc<dyn Rebooter>,
    log: Arc<dyn ProvisionLog>,
  ) -> Self {
    Self {
      store,
      scheduler,
      rebooter,
      log,
      run_id: Uuid::new_v4(),
      reboot_delay_secs: DEFAULT_REBOOT_DELAY_SECS,
    }
  }

  /// Logical run written into checkpoints.
  pub fn with_run_id(mut self, run_id: Uuid) -> Self {
    self.run_id = run_id;
    self
  }

  pub fn with_reboot_delay(mut self, secs: u32) -> Self {
    self.reboot_delay_secs = secs;
    self
  }

  pub fn run_id(&self) -> Uuid {
    self.run_id
  }

  /// Records a checkpoint and reboots.
  ///
  /// In order: write the checkpoint (replacing any prior one), register the
  /// auto-resume trigger for `resume_target` with `role`, request the reboot. If
  /// either of the first two fails the reboot is never requested. A trigger
  /// command longer than the trigger accepts is refused before anything is
  /// written. Returns `true`
  /// when the process is about to be terminated by the reboot.
  #[instrument(level = "trace", skip(self, resume_target))]
  pub fn request_checkpoint(
    &self,
    name: &str,
    section: i64,
    resume_target: &ResumeTarget,
    role: &Role,
    next_priority: i64,
  ) -> Result<bool, CheckpointError> {
    let resume_at = StepKey::new(section, next_priority);
    let command = resume_target.command_for(role);
    if let Some(max) = self.scheduler.max_command_len() {
      let len = command.command_line().chars().count();
      if len > max {
        return Err(self.fatal(
          CheckpointError::CommandTooLong {
            name: name.to_string(),
            len,
            max,
          },
          role,
          resume_at,
        ));
      }
    }
    let checkpoint = Checkpoint {
      checkpoint_name: name.to_string(),
      section,
      next_priority,
      role: role.clone(),
      resume_target: resume_target.program.clone(),
      resume_args: resume_target.args.clone(),
      launcher_args: resume_target.launcher_args.clone(),
      run_id: self.run_id,
      timestamp: Utc::now(),
    };

    if let Err(source) = self.store.save(&checkpoint) {
      return Err(self.fatal(
        CheckpointError::Persist {
          name: name.to_string(),
          path: self.store.location(),
          source,
        },
        role,
        resume_at,
      ));
    }
    self.log.record(
      LogEntry::new(
        Severity::Info,
        format!("checkpoint `{}` written to {}", name, self.store.location().display()),
      )
      .with_role(role)
      .with_step(name, resume_at),
    );

    if let Err(source) = self.scheduler.schedule(&command) {
      return Err(self.fatal(
        CheckpointError::Trigger {
          name: name.to_string(),
          source,
        },
        role,
        resume_at,
      ));
    }
    self.log.record(
      LogEntry::new(
        Severity::Info,
        format!("auto-resume trigger registered: {}", command.command_line()),
      )
      .with_role(role)
      .with_step(name, resume_at),
    );

    let request = RebootRequest {
      delay_secs: self.reboot_delay_secs,
      reason: format!("Provisioning checkpoint {}", name),
    };
    if let Err(source) = self.rebooter.reboot(&request) {
      return Err(self.fatal(
        CheckpointError::Reboot {
          name: name.to_string(),
          source,
        },
        role,
        resume_at,
      ));
    }
    self.log.record(
      LogEntry::new(
        Severity::Warning,
        format!("rebooting in {}s; provisioning resumes at {}", self.reboot_delay_secs, resume_at),
      )
      .with_role(role)
      .with_step(name, resume_at),
    );
    Ok(true)
  }

  fn fatal(&self, err: CheckpointError, role: &Role, resume_at: StepKey) -> CheckpointError {
    let name = match &err {
      CheckpointError::ResumePointNotAhead { name, .. }
      | CheckpointError::CommandTooLong { name, .. }
      | CheckpointError::Persist { name, .. }
      | CheckpointError::Trigger { name, .. }
      | CheckpointError::Reboot { name, .. } => name.clone(),
    };
    self.log.record(
      LogEntry::new(Severity::Critical, err.to_string())
        .with_role(role)
        .with_step(&name, resume_at),
    );
    err
  }
}
