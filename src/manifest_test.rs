use std::path::Path;

use crate::error::{ManifestError, RegistrationError, StepError};
use crate::manifest::{CommandAction, ModuleManifest, load_manifest, shell_invocation};
use crate::registry::{ProvisioningModule, StepRegistry};
use crate::role_filter::select;
use crate::scheduler::{NoopObserver, RunOutcome, plan, run};
use crate::test_support::Harness;
use crate::types::{Role, StepAction, StepKey, StepOutcome};

fn parse(json: &str) -> ModuleManifest {
  serde_json::from_str(json).expect("manifest json")
}

fn register(manifest: &ModuleManifest) -> Result<StepRegistry, RegistrationError> {
  let modules: Vec<&dyn ProvisioningModule> = vec![manifest];
  StepRegistry::from_modules(modules)
}

#[test]
fn order_keys_accept_integers_and_integer_strings() {
  let manifest = parse(
    r#"{ "module": "system", "steps": [
      { "name": "Configure", "section": 1, "priority": "10", "command": "true" },
      { "name": "Rename", "tags": ["mgr", "staff"], "section": " 1 ", "priority": 20, "command": "true" }
    ] }"#,
  );
  let registry = register(&manifest).unwrap();
  let steps = registry.steps();
  assert_eq!(steps[0].definition.key, StepKey::new(1, 10));
  assert_eq!(steps[1].definition.key, StepKey::new(1, 20));
  assert!(steps[1].definition.applies_to(&Role::new("MGR")));
  assert!(!steps[1].definition.applies_to(&Role::new("LAB")));
}

#[test]
fn fractional_or_textual_keys_are_malformed() {
  for priority in [r#"10.5"#, r#""ten""#, r#"true"#] {
    let manifest = parse(&format!(
      r#"{{ "module": "m", "steps": [ {{ "name": "A", "section": 1, "priority": {}, "command": "true" }} ] }}"#,
      priority
    ));
    let err = register(&manifest).unwrap_err();
    assert!(
      matches!(err, RegistrationError::MalformedOrderKey { field: "priority", .. }),
      "{}: {:?}",
      priority,
      err
    );
  }
}

#[test]
fn missing_order_keys_are_registration_errors() {
  let cases = [
    (r#"{ "name": "A", "priority": 10, "command": "true" }"#, "section"),
    (r#"{ "name": "A", "section": 1, "command": "true" }"#, "priority"),
  ];
  for (step, field) in cases {
    let manifest = parse(&format!(r#"{{ "module": "m", "steps": [ {} ] }}"#, step));
    let err = register(&manifest).unwrap_err();
    match &err {
      RegistrationError::MalformedOrderKey { field: f, value, .. } => {
        assert_eq!(*f, field);
        assert_eq!(value, "<missing>");
      }
      other => panic!("{}: {:?}", field, other),
    }
  }
}

#[test]
fn missing_checkpoint_priority_is_reported() {
  let manifest = parse(
    r#"{ "module": "m", "steps": [
      { "name": "cp", "section": 1, "priority": 39, "checkpoint": { "name": "cp" } }
    ] }"#,
  );
  let err = register(&manifest).unwrap_err();
  assert!(matches!(
    err,
    RegistrationError::MalformedOrderKey { field: "checkpoint.next_priority", .. }
  ));
}

#[test]
fn malformed_checkpoint_priority_is_reported() {
  let manifest = parse(
    r#"{ "module": "m", "steps": [
      { "name": "cp", "section": 1, "priority": 39, "checkpoint": { "name": "cp", "next_priority": "later" } }
    ] }"#,
  );
  let err = register(&manifest).unwrap_err();
  assert!(matches!(
    err,
    RegistrationError::MalformedOrderKey { field: "checkpoint.next_priority", .. }
  ));
}

#[test]
fn step_without_command_or_checkpoint_has_no_action() {
  let manifest = parse(r#"{ "module": "m", "steps": [ { "name": "Nothing", "section": 1, "priority": 1 } ] }"#);
  let err = register(&manifest).unwrap_err();
  assert!(matches!(err, RegistrationError::MissingAction { ref name, .. } if name == "Nothing"));
}

#[test]
fn load_manifest_reports_read_and_parse_errors() {
  let dir = tempfile::tempdir().expect("tempdir");
  let missing = dir.path().join("missing.json");
  assert!(matches!(load_manifest(&missing), Err(ManifestError::Read { .. })));

  let broken = dir.path().join("broken.json");
  std::fs::write(&broken, r#"{ "module": "m", "steps": [ { "name": 1 } ] }"#).unwrap();
  assert!(matches!(load_manifest(&broken), Err(ManifestError::Parse { .. })));

  let ok = dir.path().join("ok.json");
  std::fs::write(&ok, r#"{ "module": "m", "steps": [] }"#).unwrap();
  let manifest = load_manifest(Path::new(&ok)).unwrap();
  assert_eq!(manifest.name(), "m");
  assert!(manifest.steps.is_empty());
}

#[test]
fn shell_is_platform_native() {
  let (shell, args) = shell_invocation("echo hi");
  if cfg!(windows) {
    assert_eq!(shell, "cmd");
    assert_eq!(args[0], "/C");
  } else {
    assert_eq!(shell, "sh");
    assert_eq!(args[0], "-c");
  }
  assert_eq!(args[1], "echo hi");
}

#[cfg(unix)]
#[test]
fn command_exit_status_decides_success() {
  let h = Harness::new();
  let ctx = h.context("MGR");
  assert_eq!(CommandAction::command("true").run(&ctx).unwrap(), StepOutcome::Completed);
  let err = CommandAction::command("exit 3").run(&ctx).unwrap_err();
  assert!(matches!(err, StepError::CommandFailed { code: Some(3), .. }));
}

#[cfg(unix)]
#[test]
fn command_sees_role_in_environment() {
  let h = Harness::new();
  let out = h.dir.path().join("role.txt");
  let ctx = h.context("staff");
  let action = CommandAction::command(format!("printf %s \"$PROVISION_ROLE\" > '{}'", out.display()));
  action.run(&ctx).unwrap();
  assert_eq!(std::fs::read_to_string(&out).unwrap(), "STAFF");
}

#[cfg(unix)]
#[test]
fn manifest_checkpoint_pauses_the_run() {
  let h = Harness::new();
  let manifest = parse(
    r#"{ "module": "workstation", "steps": [
      { "name": "Configure", "section": 1, "priority": 10, "command": "true" },
      { "name": "Checkpoint1", "section": 1, "priority": 39,
        "checkpoint": { "name": "Checkpoint1", "next_priority": 70 } },
      { "name": "InstallSoftware", "section": 2, "priority": 70, "command": "true" }
    ] }"#,
  );
  let registry = register(&manifest).unwrap();
  let plan = plan(select(registry.steps(), &Role::new("MGR")));
  let outcome = run(&plan, &h.context("MGR"), None, &mut NoopObserver).unwrap();
  assert_eq!(
    outcome,
    RunOutcome::Paused {
      checkpoint_name: "Checkpoint1".to_string(),
      resume_at: StepKey::new(1, 70),
      executed: 2,
    }
  );
  let saved = h.pending().unwrap();
  assert_eq!(saved.section, 1);
  assert_eq!(saved.next_priority, 70);
}
