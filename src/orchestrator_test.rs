use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use crate::config::HostBindings;
use crate::error::{ProvisionError, ResumeError, StepError};
use crate::host::{RecordingRebooter, RecordingScheduler, TriggerCall};
use crate::journal_io::load_journal;
use crate::logging::Severity;
use crate::orchestrator::{LaunchOutcome, LaunchRequest, Orchestrator, build_plan};
use crate::registry::{ProvisioningModule, StaticModule};
use crate::test_support::{Harness, ReadOnlyStore};
use crate::types::{ExecutionContext, RESUME_FLAG, Role, RunState, StepDeclaration, StepKey, StepOutcome};

type Trace = Rc<RefCell<Vec<String>>>;

fn step(name: &str, section: i64, priority: i64, trace: &Trace) -> StepDeclaration {
  let trace = trace.clone();
  let label = name.to_string();
  StepDeclaration::new(name)
    .section(section)
    .priority(priority)
    .action(move |_| {
      trace.borrow_mut().push(label.clone());
      Ok(StepOutcome::Completed)
    })
}

fn checkpoint_step(name: &str, section: i64, priority: i64, next: i64, trace: &Trace) -> StepDeclaration {
  let trace = trace.clone();
  let label = name.to_string();
  StepDeclaration::new(name)
    .section(section)
    .priority(priority)
    .action(move |ctx: &ExecutionContext| {
      trace.borrow_mut().push(label.clone());
      if ctx.request_checkpoint(&label, section, next)? {
        return Ok(StepOutcome::CheckpointRequested);
      }
      Ok(StepOutcome::Completed)
    })
}

fn workstation(trace: &Trace) -> StaticModule {
  StaticModule::new("workstation")
    .step(step("Configure", 1, 10, trace))
    .step(checkpoint_step("Checkpoint1", 1, 39, 70, trace))
    .step(step("InstallSoftware", 2, 70, trace))
}

fn orchestrator(h: &Harness) -> Orchestrator {
  Orchestrator::new(
    h.store.clone(),
    HostBindings {
      scheduler: h.scheduler.clone(),
      rebooter: h.rebooter.clone(),
    },
    h.log.clone(),
  )
  .with_journal(h.dir.path().join("journal.json"))
  .with_reboot_delay(0)
}

fn request(role: &str, resume: bool) -> LaunchRequest {
  LaunchRequest {
    role: Role::new(role),
    resume_invocation: resume,
    target: Harness::target(),
  }
}

fn launch(
  h: &Harness,
  module: &StaticModule,
  role: &str,
  resume: bool,
) -> (Orchestrator, Result<crate::orchestrator::RunReport, ProvisionError>) {
  let mut o = orchestrator(h);
  let modules: Vec<&dyn ProvisioningModule> = vec![module];
  let result = o.launch(request(role, resume), modules);
  (o, result)
}

#[test]
fn fresh_run_without_checkpoints_completes() {
  let h = Harness::new();
  let trace = Trace::default();
  let module = StaticModule::new("m")
    .step(step("A", 1, 10, &trace))
    .step(step("B", 2, 10, &trace));
  let (o, result) = launch(&h, &module, "MGR", false);
  let report = result.unwrap();
  assert_eq!(
    report.outcome,
    LaunchOutcome::Completed {
      executed: 2,
      skipped: 0,
      best_effort_failures: vec![],
    }
  );
  assert!(!report.resumed);
  assert_eq!(
    o.history(),
    &[
      RunState::Idle,
      RunState::Loading,
      RunState::Fresh,
      RunState::Running,
      RunState::Completed
    ]
  );
  let journal = load_journal(&h.dir.path().join("journal.json")).unwrap();
  assert_eq!(Some(journal.run_id), report.run_id);
  assert_eq!(journal.final_status.as_deref(), Some("completed"));
  assert_eq!(journal.entries.len(), 2);
  assert!(!h.log.at(Severity::Success).is_empty());
}

#[test]
fn checkpoint_then_resume_runs_every_step_once() {
  let h = Harness::new();
  let trace = Trace::default();
  let module = workstation(&trace);

  let (first, result) = launch(&h, &module, "mgr", false);
  let paused = result.unwrap();
  assert_eq!(
    paused.outcome,
    LaunchOutcome::Paused {
      checkpoint_name: "Checkpoint1".to_string(),
      resume_at: StepKey::new(1, 70),
    }
  );
  assert_eq!(first.state(), RunState::Rebooting);
  assert!(first.history().contains(&RunState::CheckpointPending));
  assert_eq!(*trace.borrow(), vec!["Configure", "Checkpoint1"]);
  assert_eq!(h.rebooter.requests().len(), 1);
  let command = h.scheduler.scheduled().unwrap();
  assert!(command.args.ends_with(&["--role".to_string(), "MGR".to_string(), RESUME_FLAG.to_string()]));

  // The trigger passes the stored role; a different one on the command line loses.
  let (second, result) = launch(&h, &module, "STAFF", true);
  let resumed = result.unwrap();
  assert!(resumed.resumed);
  assert_eq!(resumed.role, Role::new("MGR"));
  assert_eq!(resumed.run_id, paused.run_id);
  assert_eq!(
    resumed.outcome,
    LaunchOutcome::Completed {
      executed: 1,
      skipped: 2,
      best_effort_failures: vec![],
    }
  );
  assert_eq!(second.history()[2], RunState::Resumed);
  assert_eq!(*trace.borrow(), vec!["Configure", "Checkpoint1", "InstallSoftware"]);
  assert!(h.pending().is_none());
  assert!(h.log.at(Severity::Warning).iter().any(|e| e.message.contains("belongs to MGR")));

  let journal = load_journal(&h.dir.path().join("journal.json")).unwrap();
  assert_eq!(journal.generation, 2);
  assert_eq!(journal.final_status.as_deref(), Some("completed"));
  for name in ["Configure", "Checkpoint1", "InstallSoftware"] {
    assert_eq!(journal.succeeded_count(name), 1, "{}", name);
  }
}

#[test]
fn duplicate_trigger_runs_nothing() {
  let h = Harness::new();
  let trace = Trace::default();
  let module = workstation(&trace);
  launch(&h, &module, "MGR", false).1.unwrap();
  launch(&h, &module, "MGR", true).1.unwrap();
  let before = trace.borrow().len();

  let (o, result) = launch(&h, &module, "MGR", true);
  let report = result.unwrap();
  assert_eq!(report.outcome, LaunchOutcome::DuplicateTrigger);
  assert_eq!(o.state(), RunState::Completed);
  assert_eq!(trace.borrow().len(), before);
}

#[test]
fn plain_invocation_resumes_when_checkpoint_pending() {
  let h = Harness::new();
  let trace = Trace::default();
  let module = workstation(&trace);
  launch(&h, &module, "MGR", false).1.unwrap();
  let report = launch(&h, &module, "MGR", false).1.unwrap();
  assert!(report.resumed);
  assert_eq!(trace.borrow().last().map(String::as_str), Some("InstallSoftware"));
}

#[test]
fn registration_error_fails_before_touching_checkpoint() {
  let h = Harness::new();
  let trace = Trace::default();
  launch(&h, &workstation(&trace), "MGR", false).1.unwrap();
  let broken = StaticModule::new("broken").step(StepDeclaration::new("NoAction").section(1).priority(1));
  let (o, result) = launch(&h, &broken, "MGR", true);
  assert!(matches!(result, Err(ProvisionError::Registration(_))));
  assert_eq!(o.state(), RunState::Failed);
  assert!(h.pending().is_some());
  assert_eq!(h.log.at(Severity::Critical).len(), 1);
}

#[test]
fn blank_role_is_rejected_for_fresh_runs() {
  let h = Harness::new();
  let trace = Trace::default();
  let (o, result) = launch(&h, &workstation(&trace), "  ", false);
  assert!(matches!(result, Err(ProvisionError::Config(_))));
  assert_eq!(o.state(), RunState::Failed);
  assert!(trace.borrow().is_empty());
}

#[test]
fn corrupt_checkpoint_fails_the_launch() {
  let h = Harness::new();
  std::fs::write(h.dir.path().join("checkpoint.json"), "garbage").unwrap();
  let trace = Trace::default();
  let (o, result) = launch(&h, &workstation(&trace), "MGR", true);
  assert!(matches!(result, Err(ProvisionError::Resume(ResumeError::Corrupt { .. }))));
  assert_eq!(o.state(), RunState::Failed);
  assert!(trace.borrow().is_empty());
}

#[test]
fn failing_step_fails_run_and_journal() {
  let h = Harness::new();
  let module = StaticModule::new("m").step(
    StepDeclaration::new("Broken")
      .section(1)
      .priority(1)
      .action(|_| Err(StepError::failed("boom"))),
  );
  let (o, result) = launch(&h, &module, "MGR", false);
  assert!(matches!(result, Err(ProvisionError::Execution { .. })));
  assert_eq!(o.state(), RunState::Failed);
  let journal = load_journal(&h.dir.path().join("journal.json")).unwrap();
  assert_eq!(journal.final_status.as_deref(), Some("failed"));
  assert_eq!(journal.entries[0].error.as_deref(), Some("boom"));
}

#[test]
fn unwritable_checkpoint_never_reboots() {
  let h = Harness::new();
  let trace = Trace::default();
  let module = workstation(&trace);
  let mut o = Orchestrator::new(
    Arc::new(ReadOnlyStore),
    HostBindings {
      scheduler: h.scheduler.clone(),
      rebooter: h.rebooter.clone(),
    },
    h.log.clone(),
  );
  let modules: Vec<&dyn ProvisioningModule> = vec![&module];
  let result = o.launch(request("MGR", false), modules);
  assert!(matches!(result, Err(ProvisionError::CheckpointPersist(_))));
  assert!(h.rebooter.requests().is_empty());
  assert!(h.scheduler.scheduled().is_none());
  assert_eq!(o.state(), RunState::Failed);
}

#[test]
fn refused_reboot_is_a_reboot_trigger_error() {
  let h = Harness::with_host(RecordingScheduler::new(), RecordingRebooter::refusing());
  let trace = Trace::default();
  let (_, result) = launch(&h, &workstation(&trace), "MGR", false);
  assert!(matches!(result, Err(ProvisionError::RebootTrigger(_))));
}

#[test]
fn cancel_removes_checkpoint_and_trigger() {
  let h = Harness::new();
  let trace = Trace::default();
  let module = workstation(&trace);
  launch(&h, &module, "MGR", false).1.unwrap();
  let o = orchestrator(&h);
  assert!(o.pending_checkpoint().unwrap().is_some());
  let report = o.cancel().unwrap();
  assert!(report.checkpoint_removed);
  assert!(report.trigger_removed);
  assert!(o.pending_checkpoint().unwrap().is_none());
  assert_eq!(h.scheduler.calls().last(), Some(&TriggerCall::Cancel));

  let again = o.cancel().unwrap();
  assert!(!again.checkpoint_removed);
}

#[test]
fn build_plan_filters_and_orders() {
  let trace = Trace::default();
  let module = StaticModule::new("m")
    .step(step("Late", 9, 90, &trace))
    .step(step("Staff", 1, 20, &trace).tag("staff"))
    .step(step("Early", 1, 10, &trace));
  let modules: Vec<&dyn ProvisioningModule> = vec![&module];
  let plan = build_plan(modules, &Role::new("MGR")).unwrap();
  assert_eq!(plan.names(), vec!["Early", "Late"]);
}
