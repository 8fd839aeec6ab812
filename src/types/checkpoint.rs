//! Durable record of where a provisioning run resumes after a reboot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use super::{ResumeTarget, Role, StepKey};

/// Checkpoint written immediately before a reboot and consumed once on the next start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
  pub checkpoint_name: String,
  pub section: i64,
  pub next_priority: i64,
  pub role: Role,
  /// Program the auto-resume trigger re-invokes.
  pub resume_target: PathBuf,
  /// Arguments replayed ahead of `--role <role> --resume`.
  #[serde(default)]
  pub resume_args: Vec<String>,
  /// Short arguments the trigger registers; empty when it replays `resume_args`.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub launcher_args: Vec<String>,
  /// Logical run this checkpoint belongs to; survives reboots.
  #[serde(default = "Uuid::new_v4")]
  pub run_id: Uuid,
  pub timestamp: DateTime<Utc>,
}

impl Checkpoint {
  /// First position that runs after resuming.
  pub fn resume_point(&self) -> StepKey {
    StepKey::new(self.section, self.next_priority)
  }

  pub fn target(&self) -> ResumeTarget {
    ResumeTarget::new(self.resume_target.clone())
      .with_args(self.resume_args.clone())
      .with_launcher_args(self.launcher_args.clone())
  }
}
