//! Ambient values handed explicitly to every step action.

use std::cell::RefCell;
use std::sync::Arc;
use uuid::Uuid;

use super::{ResumeTarget, Role, StepKey};
use crate::checkpoint_manager::CheckpointManager;
use crate::error::CheckpointError;
use crate::logging::{LogEntry, ProvisionLog, Severity};
use crate::vault::{Vault, VaultError};

/// Checkpoint recorded by a step during the current run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCheckpoint {
  pub name: String,
  pub resume_at: StepKey,
}

/// Context for one run of the scheduler. Owned by that run and never shared
/// across processes.
pub struct ExecutionContext {
  role: Role,
  target: ResumeTarget,
  run_id: Uuid,
  log: Arc<dyn ProvisionLog>,
  checkpoints: Arc<CheckpointManager>,
  vault: Option<Arc<dyn Vault>>,
  current: RefCell<Option<(String, StepKey)>>,
  pending: RefCell<Option<PendingCheckpoint>>,
}

impl ExecutionContext {
  pub fn new(
    role: Role,
    target: ResumeTarget,
    log: Arc<dyn ProvisionLog>,
    checkpoints: Arc<CheckpointManager>,
  ) -> Self {
    Self {
      role,
      target,
      run_id: checkpoints.run_id(),
      log,
      checkpoints,
      vault: None,
      current: RefCell::new(None),
      pending: RefCell::new(None),
    }
  }

  pub fn with_vault(mut self, vault: Arc<dyn Vault>) -> Self {
    self.vault = Some(vault);
    self
  }

  pub fn role(&self) -> &Role {
    &self.role
  }

  pub fn resume_target(&self) -> &ResumeTarget {
    &self.target
  }

  pub fn run_id(&self) -> Uuid {
    self.run_id
  }

  pub fn log(&self) -> &dyn ProvisionLog {
    self.log.as_ref()
  }

  /// Credential vault, if one was configured for this run.
  pub fn vault(&self) -> Result<&dyn Vault, VaultError> {
    self.vault.as_deref().ok_or(VaultError::Unavailable)
  }

  /// Requests a checkpoint that resumes at `(section, next_priority)` after a reboot.
  ///
  /// Returns `true` when the checkpoint is durable, the auto-resume trigger is
  /// registered and the reboot has been requested; the calling action should then
  /// return [StepOutcome::CheckpointRequested](super::StepOutcome::CheckpointRequested).
  pub fn request_checkpoint(
    &self,
    name: &str,
    section: i64,
    next_priority: i64,
  ) -> Result<bool, CheckpointError> {
    let resume_at = StepKey::new(section, next_priority);
    if let Some((step, current)) = self.current.borrow().as_ref() {
      if resume_at <= *current {
        let err = CheckpointError::ResumePointNotAhead {
          name: name.to_string(),
          resume_at,
          current: *current,
        };
        self.log.record(
          LogEntry::new(Severity::Critical, err.to_string())
            .with_role(&self.role)
            .with_step(step, *current),
        );
        return Err(err);
      }
    }
    let rebooting =
      self
        .checkpoints
        .request_checkpoint(name, section, &self.target, &self.role, next_priority)?;
    if rebooting {
      *self.pending.borrow_mut() = Some(PendingCheckpoint {
        name: name.to_string(),
        resume_at,
      });
    }
    Ok(rebooting)
  }

  pub(crate) fn enter_step(&self, name: &str, key: StepKey) {
    *self.current.borrow_mut() = Some((name.to_string(), key));
  }

  pub(crate) fn leave_step(&self) {
    *self.current.borrow_mut() = None;
  }

  pub(crate) fn take_pending_checkpoint(&self) -> Option<PendingCheckpoint> {
    self.pending.borrow_mut().take()
  }
}
