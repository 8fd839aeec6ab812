use std::collections::HashMap;
use std::sync::Arc;

use crate::error::CheckpointError;
use crate::logging::Severity;
use crate::test_support::Harness;
use crate::types::{PendingCheckpoint, Role, StepKey};
use crate::vault::{Credential, Vault, VaultError};

struct MapVault {
  credentials: HashMap<Role, Credential>,
}

impl Vault for MapVault {
  fn encrypt_text(&self, plaintext: &str) -> Result<String, VaultError> {
    Ok(plaintext.chars().rev().collect())
  }

  fn decrypt_text(&self, ciphertext: &str) -> Result<String, VaultError> {
    if ciphertext.is_empty() {
      return Err(VaultError::Decryption("empty ciphertext".to_string()));
    }
    Ok(ciphertext.chars().rev().collect())
  }

  fn credential(&self, role: &Role) -> Result<Credential, VaultError> {
    self
      .credentials
      .get(role)
      .cloned()
      .ok_or_else(|| VaultError::NotFound(role.clone()))
  }
}

#[test]
fn context_exposes_role_target_and_run_id() {
  let h = Harness::new();
  let ctx = h.context(" mgr ");
  assert_eq!(ctx.role(), &Role::new("MGR"));
  assert_eq!(ctx.resume_target(), &Harness::target());
  assert!(!ctx.run_id().is_nil());
}

#[test]
fn vault_is_unavailable_unless_configured() {
  let h = Harness::new();
  let ctx = h.context("MGR");
  assert!(matches!(ctx.vault(), Err(VaultError::Unavailable)));
}

#[test]
fn configured_vault_serves_role_credentials() {
  let h = Harness::new();
  let mut credentials = HashMap::new();
  credentials.insert(
    Role::new("MGR"),
    Credential {
      username: "provisioner".to_string(),
      password: "hunter2".to_string(),
    },
  );
  let ctx = h.context("MGR").with_vault(Arc::new(MapVault { credentials }));
  let vault = ctx.vault().unwrap();
  assert_eq!(vault.credential(ctx.role()).unwrap().username, "provisioner");
  assert!(matches!(
    vault.credential(&Role::new("STAFF")),
    Err(VaultError::NotFound(_))
  ));
  let sealed = vault.encrypt_text("secret").unwrap();
  assert_eq!(vault.decrypt_text(&sealed).unwrap(), "secret");
  assert!(matches!(vault.decrypt_text(""), Err(VaultError::Decryption(_))));
}

#[test]
fn request_checkpoint_records_pending_state() {
  let h = Harness::new();
  let ctx = h.context("MGR");
  ctx.enter_step("Checkpoint1", StepKey::new(1, 39));
  assert!(ctx.request_checkpoint("Checkpoint1", 1, 70).unwrap());
  ctx.leave_step();
  assert_eq!(
    ctx.take_pending_checkpoint(),
    Some(PendingCheckpoint {
      name: "Checkpoint1".to_string(),
      resume_at: StepKey::new(1, 70),
    })
  );
  assert_eq!(ctx.take_pending_checkpoint(), None);
  let saved = h.pending().unwrap();
  assert_eq!(saved.role, Role::new("MGR"));
  assert_eq!(saved.run_id, ctx.run_id());
}

#[test]
fn resume_point_at_or_before_current_step_is_refused() {
  let h = Harness::new();
  let ctx = h.context("MGR");
  ctx.enter_step("Loop", StepKey::new(2, 40));
  let err = ctx.request_checkpoint("Loop", 1, 90).unwrap_err();
  assert!(matches!(err, CheckpointError::ResumePointNotAhead { .. }));
  assert!(ctx.take_pending_checkpoint().is_none());
  assert!(h.pending().is_none());
  assert_eq!(h.log.at(Severity::Critical).len(), 1);
}

#[test]
fn failed_checkpoint_leaves_nothing_pending() {
  let h = Harness::with_host(
    crate::host::RecordingScheduler::new(),
    crate::host::RecordingRebooter::refusing(),
  );
  let ctx = h.context("MGR");
  let err = ctx.request_checkpoint("cp", 1, 70).unwrap_err();
  assert!(matches!(err, CheckpointError::Reboot { .. }));
  assert!(ctx.take_pending_checkpoint().is_none());
}
