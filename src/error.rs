//! Error taxonomy of the provisioning engine.
//!
//! Every fatal error ends the current process with a nonzero exit after one
//! Critical log entry at the point where it originated. Only a failure of a
//! best-effort step is recovered locally.

use std::path::PathBuf;
use thiserror::Error;

use crate::host::HostError;
use crate::types::{Role, StepKey};
use crate::vault::VaultError;

/// Malformed step declaration. Fatal at startup.
#[derive(Debug, Error)]
pub enum RegistrationError {
  #[error("step `{name}` in module `{module}` has no action")]
  MissingAction { module: String, name: String },

  #[error("step `{name}` in module `{module}` has malformed {field} `{value}`")]
  MalformedOrderKey {
    module: String,
    name: String,
    field: &'static str,
    value: String,
  },

  #[error("step #{index} in module `{module}` has a blank name")]
  BlankName { module: String, index: usize },

  #[error("module name must not be blank")]
  BlankModule,
}

/// Failure of a checkpoint request. Every variant suppresses or postdates the reboot.
#[derive(Debug, Error)]
pub enum CheckpointError {
  #[error(
    "checkpoint `{name}` would resume at {resume_at}, which is not after the requesting step at {current}"
  )]
  ResumePointNotAhead {
    name: String,
    resume_at: StepKey,
    current: StepKey,
  },

  #[error(
    "auto-resume command for checkpoint `{name}` is {len} characters; the trigger accepts at most {max}"
  )]
  CommandTooLong { name: String, len: usize, max: usize },

  #[error("cannot write checkpoint `{name}` to {}: {source}", .path.display())]
  Persist {
    name: String,
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("cannot register auto-resume trigger for checkpoint `{name}`: {source}")]
  Trigger {
    name: String,
    #[source]
    source: HostError,
  },

  #[error("reboot for checkpoint `{name}` was rejected; checkpoint is written, a manual reboot resumes safely: {source}")]
  Reboot {
    name: String,
    #[source]
    source: HostError,
  },
}

/// Pending checkpoint could not be read or consumed. Fatal: the run never guesses
/// where to resume.
#[derive(Debug, Error)]
pub enum ResumeError {
  #[error("checkpoint at {} is unreadable: {source}", .path.display())]
  Unreadable {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("checkpoint at {} is corrupt: {source}", .path.display())]
  Corrupt {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("checkpoint at {} is invalid: {reason}", .path.display())]
  Invalid { path: PathBuf, reason: String },

  #[error("cannot delete consumed checkpoint at {}: {source}", .path.display())]
  Consume {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

/// Failure of a step action.
#[derive(Debug, Error)]
pub enum StepError {
  #[error("{0}")]
  Failed(String),

  #[error("command `{command}` exited with status {code:?}")]
  CommandFailed { command: String, code: Option<i32> },

  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),

  #[error(transparent)]
  Vault(#[from] VaultError),

  /// Checkpoint request failed inside the action. Always fatal.
  #[error(transparent)]
  Checkpoint(#[from] CheckpointError),
}

impl StepError {
  pub fn failed(message: impl Into<String>) -> Self {
    StepError::Failed(message.into())
  }
}

/// Invalid configuration value (flag or environment variable).
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("unknown trigger `{0}` (expected logon, boot or run-once)")]
  UnknownTrigger(String),

  #[error("invalid value `{value}` for {name}")]
  InvalidValue { name: String, value: String },

  #[error("role must not be blank")]
  BlankRole,

  #[error("no step manifests given and no checkpoint to replay them from (use --manifest)")]
  MissingManifests,
}

/// Step manifest file could not be loaded.
#[derive(Debug, Error)]
pub enum ManifestError {
  #[error("cannot read manifest {}: {source}", .path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("cannot parse manifest {}: {source}", .path.display())]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },
}

/// Top-level error of a provisioning run.
#[derive(Debug, Error)]
pub enum ProvisionError {
  #[error(transparent)]
  Registration(#[from] RegistrationError),

  #[error("step `{step}` ({key}) failed for role {role}: {source}")]
  Execution {
    step: String,
    key: StepKey,
    role: Role,
    #[source]
    source: StepError,
  },

  #[error(transparent)]
  CheckpointPersist(CheckpointError),

  #[error(transparent)]
  RebootTrigger(CheckpointError),

  #[error(transparent)]
  Resume(#[from] ResumeError),

  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error(transparent)]
  Manifest(#[from] ManifestError),
}

impl From<CheckpointError> for ProvisionError {
  fn from(err: CheckpointError) -> Self {
    match err {
      CheckpointError::Reboot { .. } => ProvisionError::RebootTrigger(err),
      _ => ProvisionError::CheckpointPersist(err),
    }
  }
}

impl ProvisionError {
  /// Process exit code for this error.
  pub fn exit_code(&self) -> i32 {
    1
  }
}
