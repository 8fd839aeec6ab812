//! Priority scheduler: builds the execution plan and runs it, strictly in order.

use tracing::{info, instrument};

use crate::error::{ProvisionError, StepError};
use crate::logging::{LogEntry, Severity};
use crate::types::{
  ExecutionContext, ExecutionPlan, FailurePolicy, RegisteredStep, StepDefinition, StepKey,
  StepOutcome, StepStatus,
};

/// Sorts `steps` by `(section, priority)`, breaking ties by registration
/// position `(module, ordinal)`. The sort is stable.
#[instrument(level = "trace", skip(steps))]
pub fn plan(steps: Vec<&RegisteredStep>) -> ExecutionPlan {
  let mut steps: Vec<RegisteredStep> = steps.into_iter().cloned().collect();
  steps.sort_by(|a, b| {
    a.definition
      .key
      .cmp(&b.definition.key)
      .then_with(|| a.module.cmp(&b.module))
      .then_with(|| a.ordinal.cmp(&b.ordinal))
  });
  ExecutionPlan::from_sorted(steps)
}

/// How one process's run ended, short of a fatal error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
  /// Every remaining step ran.
  Completed {
    executed: usize,
    skipped: usize,
    best_effort_failures: Vec<String>,
  },
  /// A step checkpointed; the machine is rebooting.
  Paused {
    checkpoint_name: String,
    resume_at: StepKey,
    executed: usize,
  },
}

/// Receives step lifecycle events (used by the run journal).
pub trait RunObserver {
  fn step_started(&mut self, step: &StepDefinition);

  fn step_finished(&mut self, step: &StepDefinition, status: StepStatus, error: Option<&str>);
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl RunObserver for NoopObserver {
  fn step_started(&mut self, _step: &StepDefinition) {}

  fn step_finished(&mut self, _step: &StepDefinition, _status: StepStatus, _error: Option<&str>) {}
}

/// Executes `plan` sequentially.
///
/// With `resume_at` set, steps positioned before it are skipped. A step whose
/// action requested a checkpoint ends the run immediately; the next step is
/// left for the resumed process. A failing fail-fast step aborts the run; a
/// failing best-effort step is logged and skipped past.
pub fn run(
  plan: &ExecutionPlan,
  ctx: &ExecutionContext,
  resume_at: Option<StepKey>,
  observer: &mut dyn RunObserver,
) -> Result<RunOutcome, ProvisionError> {
  let log = ctx.log();
  let role = ctx.role();
  let mut section: Option<i64> = None;
  let mut executed = 0;
  let mut skipped = 0;
  let mut best_effort_failures = Vec::new();

  for step in plan.iter() {
    if resume_at.is_some_and(|at| step.key < at) {
      skipped += 1;
      log.record(
        LogEntry::new(Severity::Debug, "already done before checkpoint; skipping")
          .with_role(role)
          .with_step(&step.name, step.key),
      );
      continue;
    }
    if section != Some(step.key.section) {
      if let Some(prev) = section {
        log.section_finished(prev);
      }
      log.section_started(step.key.section);
      section = Some(step.key.section);
    }

    info!(step = %step.name, key = %step.key, "executing step");
    log.record(
      LogEntry::new(Severity::Info, "starting")
        .with_role(role)
        .with_step(&step.name, step.key),
    );
    observer.step_started(step);
    ctx.enter_step(&step.name, step.key);
    let result = step.action.run(ctx);
    ctx.leave_step();
    executed += 1;

    // A recorded checkpoint means the reboot is already on its way.
    if let Some(pending) = ctx.take_pending_checkpoint() {
      if let Err(e) = &result {
        log.record(
          LogEntry::new(Severity::Error, format!("failed after requesting checkpoint: {}", e))
            .with_role(role)
            .with_step(&step.name, step.key),
        );
      }
      observer.step_finished(step, StepStatus::CheckpointRequested, None);
      log.section_finished(step.key.section);
      return Ok(RunOutcome::Paused {
        checkpoint_name: pending.name,
        resume_at: pending.resume_at,
        executed,
      });
    }

    match result {
      Ok(StepOutcome::Completed) => {
        observer.step_finished(step, StepStatus::Succeeded, None);
        log.record(
          LogEntry::new(Severity::Success, "completed")
            .with_role(role)
            .with_step(&step.name, step.key),
        );
      }
      Ok(StepOutcome::CheckpointRequested) => {
        let source = StepError::failed("reported a checkpoint request, but no checkpoint was recorded");
        return Err(fail(ctx, observer, step, source));
      }
      Err(StepError::Checkpoint(e)) => {
        // Already logged at Critical by whoever raised it.
        observer.step_finished(step, StepStatus::Failed, Some(&e.to_string()));
        log.section_finished(step.key.section);
        return Err(e.into());
      }
      Err(e) if step.failure_policy == FailurePolicy::BestEffort => {
        observer.step_finished(step, StepStatus::FailedBestEffort, Some(&e.to_string()));
        log.record(
          LogEntry::new(Severity::Warning, format!("best-effort step failed; continuing: {}", e))
            .with_role(role)
            .with_step(&step.name, step.key),
        );
        best_effort_failures.push(step.name.clone());
      }
      Err(e) => return Err(fail(ctx, observer, step, e)),
    }
  }

  if let Some(last) = section {
    log.section_finished(last);
  }
  Ok(RunOutcome::Completed {
    executed,
    skipped,
    best_effort_failures,
  })
}

fn fail(
  ctx: &ExecutionContext,
  observer: &mut dyn RunObserver,
  step: &StepDefinition,
  source: StepError,
) -> ProvisionError {
  let message = source.to_string();
  observer.step_finished(step, StepStatus::Failed, Some(&message));
  let err = ProvisionError::Execution {
    step: step.name.clone(),
    key: step.key,
    role: ctx.role().clone(),
    source,
  };
  ctx.log().record(
    LogEntry::new(Severity::Critical, err.to_string())
      .with_role(ctx.role())
      .with_step(&step.name, step.key),
  );
  ctx.log().section_finished(step.key.section);
  err
}
