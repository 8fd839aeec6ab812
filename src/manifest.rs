//! Declarative provisioning modules: steps described in a JSON file.
//!
//! ```json
//! {
//!   "module": "software",
//!   "steps": [
//!     { "name": "InstallOffice", "tags": ["MGR"], "section": 2, "priority": "70",
//!       "command": "setup.exe /configure office.xml" },
//!     { "name": "Checkpoint1", "section": 1, "priority": 39,
//!       "checkpoint": { "name": "Checkpoint1", "next_priority": 70 } }
//!   ]
//! }
//! ```

use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::error::{ManifestError, RegistrationError, StepError};
use crate::logging::{LogEntry, Severity};
use crate::registry::{ProvisioningModule, order_key};
use crate::types::{ExecutionContext, OrderValue, StepAction, StepDeclaration, StepOutcome};

/// One module file.
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleManifest {
  pub module: String,
  #[serde(default)]
  pub steps: Vec<StepManifest>,
}

/// One declared step.
#[derive(Debug, Clone, Deserialize)]
pub struct StepManifest {
  pub name: String,
  #[serde(default)]
  pub tags: Vec<String>,
  /// Missing keys are reported at registration, not while parsing.
  #[serde(default)]
  pub section: Option<Value>,
  #[serde(default)]
  pub priority: Option<Value>,
  #[serde(default)]
  pub command: Option<String>,
  #[serde(default)]
  pub best_effort: bool,
  #[serde(default)]
  pub checkpoint: Option<CheckpointSpec>,
}

/// Checkpoint to take once the step's command (if any) succeeded.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckpointSpec {
  pub name: String,
  /// Defaults to the step's own section.
  #[serde(default)]
  pub section: Option<Value>,
  #[serde(default)]
  pub next_priority: Option<Value>,
}

/// Reads and parses a module manifest.
#[instrument(level = "trace")]
pub fn load_manifest(path: &Path) -> Result<ModuleManifest, ManifestError> {
  let text = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
    path: path.to_path_buf(),
    source,
  })?;
  serde_json::from_str(&text).map_err(|source| ManifestError::Parse {
    path: path.to_path_buf(),
    source,
  })
}

/// Integers stay integers and strings are kept for validation; anything else
/// is carried as text and rejected at registration.
fn order_value(value: &Value) -> OrderValue {
  match value {
    Value::Number(n) => match n.as_i64() {
      Some(v) => OrderValue::Int(v),
      None => OrderValue::Text(n.to_string()),
    },
    Value::String(s) => OrderValue::Text(s.clone()),
    other => OrderValue::Text(other.to_string()),
  }
}

fn required_order_value(value: &Option<Value>) -> OrderValue {
  match value {
    Some(v) => order_value(v),
    None => OrderValue::Text("<missing>".to_string()),
  }
}

impl ProvisioningModule for ModuleManifest {
  fn name(&self) -> &str {
    &self.module
  }

  fn steps(&self) -> Result<Vec<StepDeclaration>, RegistrationError> {
    self.steps.iter().map(|s| s.declaration(&self.module)).collect()
  }
}

impl StepManifest {
  fn declaration(&self, module: &str) -> Result<StepDeclaration, RegistrationError> {
    let section = required_order_value(&self.section);
    let mut decl = StepDeclaration::new(self.name.clone())
      .section(section.clone())
      .priority(required_order_value(&self.priority));
    decl.tags = self.tags.clone();
    if self.best_effort {
      decl = decl.best_effort();
    }

    let checkpoint = match &self.checkpoint {
      Some(spec) => {
        let cp_section = match &spec.section {
          Some(v) => order_key(module, &self.name, "checkpoint.section", &order_value(v))?,
          None => order_key(module, &self.name, "section", &section)?,
        };
        let next_priority = order_key(
          module,
          &self.name,
          "checkpoint.next_priority",
          &required_order_value(&spec.next_priority),
        )?;
        Some(CheckpointAt {
          name: spec.name.clone(),
          section: cp_section,
          next_priority,
        })
      }
      None => None,
    };

    if self.command.is_none() && checkpoint.is_none() {
      // Left without an action; registration reports MissingAction.
      return Ok(decl);
    }
    Ok(decl.shared_action(Arc::new(CommandAction {
      command: self.command.clone(),
      checkpoint,
    })))
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CheckpointAt {
  name: String,
  section: i64,
  next_priority: i64,
}

/// Runs a shell command, then optionally requests a checkpoint.
#[derive(Debug, Clone)]
pub struct CommandAction {
  command: Option<String>,
  checkpoint: Option<CheckpointAt>,
}

impl CommandAction {
  pub fn command(command: impl Into<String>) -> Self {
    Self {
      command: Some(command.into()),
      checkpoint: None,
    }
  }
}

impl StepAction for CommandAction {
  fn run(&self, ctx: &ExecutionContext) -> Result<StepOutcome, StepError> {
    if let Some(command) = &self.command {
      run_shell(ctx, command)?;
    }
    if let Some(cp) = &self.checkpoint {
      if ctx.request_checkpoint(&cp.name, cp.section, cp.next_priority)? {
        return Ok(StepOutcome::CheckpointRequested);
      }
    }
    Ok(StepOutcome::Completed)
  }
}

pub(crate) fn shell_invocation(command: &str) -> (&'static str, [String; 2]) {
  if cfg!(windows) {
    ("cmd", ["/C".to_string(), command.to_string()])
  } else {
    ("sh", ["-c".to_string(), command.to_string()])
  }
}

fn run_shell(ctx: &ExecutionContext, command: &str) -> Result<(), StepError> {
  let (shell, args) = shell_invocation(command);
  info!(shell, command, "running step command");
  ctx.log().record(
    LogEntry::new(Severity::Debug, format!("running `{}`", command)).with_role(ctx.role()),
  );
  let status = Command::new(shell)
    .args(&args)
    .env("PROVISION_ROLE", ctx.role().as_str())
    .env("PROVISION_RUN_ID", ctx.run_id().to_string())
    .status()?;
  if status.success() {
    Ok(())
  } else {
    Err(StepError::CommandFailed {
      command: command.to_string(),
      code: status.code(),
    })
  }
}
