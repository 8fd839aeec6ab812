//! Entry surface: decide fresh vs. resumed, build the plan, run it, and track
//! the run state machine for this process.

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::checkpoint_io::{CheckpointStore, FileCheckpointStore};
use crate::checkpoint_manager::{CheckpointManager, DEFAULT_REBOOT_DELAY_SECS};
use crate::config::{HostBindings, ProvisionConfig};
use crate::error::{ConfigError, ProvisionError, RegistrationError, ResumeError};
use crate::journal_io::{JournalRecorder, load_journal};
use crate::logging::{LogEntry, ProvisionLog, Severity};
use crate::registry::{ProvisioningModule, StepRegistry};
use crate::resume::try_resume;
use crate::role_filter::select;
use crate::scheduler::{NoopObserver, RunObserver, RunOutcome, plan, run};
use crate::types::{
  Checkpoint, ExecutionContext, ExecutionPlan, ResumeTarget, Role, RunJournal, RunState, StepKey,
};
use crate::vault::Vault;

/// Builds the role-filtered execution plan for `modules`.
pub fn build_plan<'a, I>(modules: I, role: &Role) -> Result<ExecutionPlan, RegistrationError>
where
  I: IntoIterator<Item = &'a dyn ProvisioningModule>,
{
  let registry = StepRegistry::from_modules(modules)?;
  Ok(plan(select(registry.steps(), role)))
}

/// One invocation of the orchestrator.
#[derive(Debug, Clone)]
pub struct LaunchRequest {
  /// Role passed on the command line; a pending checkpoint's role takes precedence.
  pub role: Role,
  /// Set when invoked by the auto-resume trigger.
  pub resume_invocation: bool,
  /// Program and arguments the auto-resume trigger should replay.
  pub target: ResumeTarget,
}

/// How this process's invocation ended (exit code 0).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchOutcome {
  Completed {
    executed: usize,
    skipped: usize,
    best_effort_failures: Vec<String>,
  },
  /// A checkpoint was taken and the reboot requested.
  Paused {
    checkpoint_name: String,
    resume_at: StepKey,
  },
  /// Invoked by the auto-resume trigger with no checkpoint pending; nothing ran.
  DuplicateTrigger,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
  pub role: Role,
  pub run_id: Option<Uuid>,
  pub resumed: bool,
  pub outcome: LaunchOutcome,
  pub final_state: RunState,
}

/// What `cancel` removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancelReport {
  pub checkpoint_removed: bool,
  pub trigger_removed: bool,
}

/// Drives one process through `Idle → Loading → (Fresh | Resumed) → Running → ...`.
pub struct Orchestrator {
  store: Arc<dyn CheckpointStore>,
  host: HostBindings,
  log: Arc<dyn ProvisionLog>,
  journal_path: Option<PathBuf>,
  reboot_delay_secs: u32,
  vault: Option<Arc<dyn Vault>>,
  state: RunState,
  history: Vec<RunState>,
}

impl Orchestrator {
  pub fn new(store: Arc<dyn CheckpointStore>, host: HostBindings, log: Arc<dyn ProvisionLog>) -> Self {
    Self {
      store,
      host,
      log,
      journal_path: None,
      reboot_delay_secs: DEFAULT_REBOOT_DELAY_SECS,
      vault: None,
      state: RunState::Idle,
      history: vec![RunState::Idle],
    }
  }

  /// Orchestrator over the state directory and host primitives of `config`.
  pub fn from_config(config: &ProvisionConfig, log: Arc<dyn ProvisionLog>) -> Self {
    Self::new(
      Arc::new(FileCheckpointStore::new(config.checkpoint_path())),
      config.host(),
      log,
    )
    .with_journal(config.journal_path())
    .with_reboot_delay(config.reboot_delay_secs)
  }

  pub fn with_journal(mut self, path: impl Into<PathBuf>) -> Self {
    self.journal_path = Some(path.into());
    self
  }

  pub fn with_reboot_delay(mut self, secs: u32) -> Self {
    self.reboot_delay_secs = secs;
    self
  }

  pub fn with_vault(mut self, vault: Arc<dyn Vault>) -> Self {
    self.vault = Some(vault);
    self
  }

  pub fn state(&self) -> RunState {
    self.state
  }

  /// Every state this process passed through, starting with `Idle`.
  pub fn history(&self) -> &[RunState] {
    &self.history
  }

  fn transition(&mut self, next: RunState) {
    if !self.state.can_transition_to(next) {
      warn!(from = %self.state, to = %next, "unexpected run state transition");
    }
    info!(from = %self.state, to = %next, "run state");
    self.state = next;
    self.history.push(next);
  }

  fn critical(&mut self, role: &Role, err: impl Into<ProvisionError>) -> ProvisionError {
    let err = err.into();
    self
      .log
      .record(LogEntry::new(Severity::Critical, err.to_string()).with_role(role));
    self.transition(RunState::Failed);
    err
  }

  /// Runs (or resumes) provisioning for this process.
  ///
  /// A pending checkpoint always wins: its role and resume point are used and
  /// it is consumed before any step executes. Otherwise, a resume invocation
  /// is a duplicate trigger firing and does nothing; a plain invocation starts
  /// a fresh run.
  pub fn launch<'a, I>(&mut self, request: LaunchRequest, modules: I) -> Result<RunReport, ProvisionError>
  where
    I: IntoIterator<Item = &'a dyn ProvisioningModule>,
  {
    self.transition(RunState::Loading);

    let registry = match StepRegistry::from_modules(modules) {
      Ok(r) => r,
      Err(e) => return Err(self.critical(&request.role, e)),
    };

    let resumed = match try_resume(self.store.as_ref(), self.host.scheduler.as_ref(), self.log.as_ref()) {
      Ok(r) => r,
      Err(e) => {
        // Already logged at Critical.
        self.transition(RunState::Failed);
        return Err(e.into());
      }
    };

    let (role, resume_at, run_id, target) = match resumed {
      Some(state) => {
        if !request.role.is_blank() && request.role != state.role {
          self.log.record(
            LogEntry::new(
              Severity::Warning,
              format!(
                "role {} given, but the pending checkpoint belongs to {}; resuming as {}",
                request.role, state.role, state.role
              ),
            )
            .with_role(&state.role),
          );
        }
        self.transition(RunState::Resumed);
        (state.role, Some(state.resume_at), state.run_id, state.target)
      }
      None if request.resume_invocation => {
        self.log.record(
          LogEntry::new(
            Severity::Warning,
            "auto-resume trigger fired but no checkpoint is pending; nothing to do",
          )
          .with_role(&request.role),
        );
        self.transition(RunState::Completed);
        return Ok(RunReport {
          role: request.role,
          run_id: None,
          resumed: false,
          outcome: LaunchOutcome::DuplicateTrigger,
          final_state: self.state,
        });
      }
      None if request.role.is_blank() => {
        return Err(self.critical(&request.role, ConfigError::BlankRole));
      }
      None => {
        self.transition(RunState::Fresh);
        (request.role, None, Uuid::new_v4(), request.target)
      }
    };

    let plan = plan(select(registry.steps(), &role));
    self.log.record(
      LogEntry::new(
        Severity::Info,
        format!(
          "{} of {} registered steps apply to role {}",
          plan.len(),
          registry.len(),
          role
        ),
      )
      .with_role(&role),
    );

    let checkpoints = Arc::new(
      CheckpointManager::new(
        self.store.clone(),
        self.host.scheduler.clone(),
        self.host.rebooter.clone(),
        self.log.clone(),
      )
      .with_run_id(run_id)
      .with_reboot_delay(self.reboot_delay_secs),
    );
    let mut ctx = ExecutionContext::new(role.clone(), target, self.log.clone(), checkpoints);
    if let Some(vault) = &self.vault {
      ctx = ctx.with_vault(vault.clone());
    }

    let mut recorder = self
      .journal_path
      .clone()
      .map(|path| {
        let journal = self.journal_for(&path, run_id, &role, resume_at.is_some());
        JournalRecorder::new(path, journal, self.log.clone())
      });

    self.transition(RunState::Running);
    let result = match recorder.as_mut() {
      Some(r) => run(&plan, &ctx, resume_at, r as &mut dyn RunObserver),
      None => run(&plan, &ctx, resume_at, &mut NoopObserver),
    };

    let outcome = match result {
      Ok(RunOutcome::Completed {
        executed,
        skipped,
        best_effort_failures,
      }) => {
        self.transition(RunState::Completed);
        self.log.record(
          LogEntry::new(
            Severity::Success,
            format!("provisioning completed ({} steps executed)", executed),
          )
          .with_role(&role),
        );
        LaunchOutcome::Completed {
          executed,
          skipped,
          best_effort_failures,
        }
      }
      Ok(RunOutcome::Paused {
        checkpoint_name,
        resume_at,
        ..
      }) => {
        self.transition(RunState::CheckpointPending);
        self.transition(RunState::Rebooting);
        LaunchOutcome::Paused {
          checkpoint_name,
          resume_at,
        }
      }
      Err(e) => {
        // Logged at Critical where it was raised.
        self.transition(RunState::Failed);
        if let Some(r) = recorder.as_mut() {
          r.finish(RunState::Failed);
        }
        return Err(e);
      }
    };
    if let Some(r) = recorder.as_mut() {
      r.finish(self.state);
    }

    Ok(RunReport {
      role,
      run_id: Some(run_id),
      resumed: resume_at.is_some(),
      outcome,
      final_state: self.state,
    })
  }

  /// Journal to continue: the previous generation of the same run when
  /// resuming, otherwise a new one.
  fn journal_for(&self, path: &std::path::Path, run_id: Uuid, role: &Role, resuming: bool) -> RunJournal {
    if resuming {
      match load_journal(path) {
        Ok(j) if j.run_id == run_id => return j.next_generation(),
        Ok(_) => self.log.record(
          LogEntry::new(Severity::Warning, "run journal belongs to another run; starting a new one")
            .with_role(role),
        ),
        Err(e) => self.log.record(
          LogEntry::new(
            Severity::Warning,
            format!("run journal {} unreadable ({}); starting a new one", path.display(), e),
          )
          .with_role(role),
        ),
      }
    }
    RunJournal::new(run_id, role.clone())
  }

  /// Pending checkpoint, left in place.
  pub fn pending_checkpoint(&self) -> Result<Option<Checkpoint>, ResumeError> {
    self.store.load()
  }

  /// Operator intervention: drop the pending checkpoint and the auto-resume trigger.
  pub fn cancel(&self) -> Result<CancelReport, ResumeError> {
    let had_checkpoint = matches!(self.store.load(), Ok(Some(_)) | Err(ResumeError::Corrupt { .. }));
    let trigger_removed = match self.host.scheduler.cancel() {
      Ok(()) => true,
      Err(e) => {
        self.log.record(LogEntry::new(
          Severity::Warning,
          format!("could not remove auto-resume trigger: {}", e),
        ));
        false
      }
    };
    self.store.remove().map_err(|source| ResumeError::Consume {
      path: self.store.location(),
      source,
    })?;
    if had_checkpoint {
      self.log.record(LogEntry::new(
        Severity::Warning,
        format!("pending checkpoint {} removed by operator", self.store.location().display()),
      ));
    }
    Ok(CancelReport {
      checkpoint_removed: had_checkpoint,
      trigger_removed,
    })
  }
}
