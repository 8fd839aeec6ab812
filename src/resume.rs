//! Resume launcher: consume a pending checkpoint at process start.

use tracing::{debug, instrument};
use uuid::Uuid;

use crate::checkpoint_io::CheckpointStore;
use crate::error::ResumeError;
use crate::host::ResumeScheduler;
use crate::logging::{LogEntry, ProvisionLog, Severity};
use crate::types::{ResumeTarget, Role, StepKey};

/// Where a resumed process picks up, taken from the consumed checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeState {
  pub role: Role,
  pub resume_at: StepKey,
  pub checkpoint_name: String,
  pub run_id: Uuid,
  pub target: ResumeTarget,
}

/// Looks for a pending checkpoint and consumes it.
///
/// Returns `Ok(None)` when there is none (fresh start). Otherwise, in order:
/// cancel the auto-resume trigger, delete the checkpoint, and hand back the
/// resume point. The checkpoint is gone before any step runs, so a second
/// firing of the trigger finds nothing to resume. A corrupt checkpoint, or one
/// with a blank role or name, is left in place for inspection.
#[instrument(level = "trace", skip_all)]
pub fn try_resume(
  store: &dyn CheckpointStore,
  scheduler: &dyn ResumeScheduler,
  log: &dyn ProvisionLog,
) -> Result<Option<ResumeState>, ResumeError> {
  let checkpoint = match store.load() {
    Ok(Some(cp)) => cp,
    Ok(None) => {
      debug!(path = %store.location().display(), "no pending checkpoint");
      return Ok(None);
    }
    Err(e) => {
      log.record(LogEntry::new(
        Severity::Critical,
        format!("cannot resume: {}", e),
      ));
      return Err(e);
    }
  };
  let reason = if checkpoint.role.is_blank() {
    Some("role is blank")
  } else if checkpoint.checkpoint_name.trim().is_empty() {
    Some("checkpoint name is blank")
  } else {
    None
  };
  if let Some(reason) = reason {
    let err = ResumeError::Invalid {
      path: store.location(),
      reason: reason.to_string(),
    };
    log.record(LogEntry::new(Severity::Critical, format!("cannot resume: {}", err)));
    return Err(err);
  }
  let resume_at = checkpoint.resume_point();

  if let Err(e) = scheduler.cancel() {
    // The trigger is stale either way once the checkpoint is gone.
    log.record(
      LogEntry::new(
        Severity::Warning,
        format!("could not remove auto-resume trigger: {}", e),
      )
      .with_role(&checkpoint.role)
      .with_step(&checkpoint.checkpoint_name, resume_at),
    );
  }

  if let Err(source) = store.remove() {
    let err = ResumeError::Consume {
      path: store.location(),
      source,
    };
    log.record(
      LogEntry::new(Severity::Critical, err.to_string())
        .with_role(&checkpoint.role)
        .with_step(&checkpoint.checkpoint_name, resume_at),
    );
    return Err(err);
  }

  log.record(
    LogEntry::new(
      Severity::Info,
      format!("resuming after checkpoint `{}` at {}", checkpoint.checkpoint_name, resume_at),
    )
    .with_role(&checkpoint.role)
    .with_step(&checkpoint.checkpoint_name, resume_at),
  );
  Ok(Some(ResumeState {
    target: checkpoint.target(),
    role: checkpoint.role,
    resume_at,
    checkpoint_name: checkpoint.checkpoint_name,
    run_id: checkpoint.run_id,
  }))
}
