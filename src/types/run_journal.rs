//! DTOs for journal.json: the per-run record of executed steps, kept across reboots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Role, StepKey, StepStatus};

/// Current journal format version.
pub const JOURNAL_VERSION: u32 = 1;

/// One executed step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
  /// Process generation (1 for the fresh start, +1 per resume).
  pub generation: u32,
  pub name: String,
  pub section: i64,
  pub priority: i64,
  pub status: StepStatus,
  pub started_at: DateTime<Utc>,
  pub finished_at: Option<DateTime<Utc>>,
  /// Failure message for failed steps.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

impl JournalEntry {
  pub fn key(&self) -> StepKey {
    StepKey::new(self.section, self.priority)
  }
}

/// Root structure for journal.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunJournal {
  pub version: u32,
  pub run_id: Uuid,
  pub role: Role,
  pub started_at: DateTime<Utc>,
  /// Set when the current process stops (completed, failed or paused for reboot).
  pub finished_at: Option<DateTime<Utc>>,
  /// Final state of the last process (e.g. "completed", "rebooting", "failed").
  pub final_status: Option<String>,
  pub generation: u32,
  pub entries: Vec<JournalEntry>,
}

impl RunJournal {
  pub fn new(run_id: Uuid, role: Role) -> Self {
    Self {
      version: JOURNAL_VERSION,
      run_id,
      role,
      started_at: Utc::now(),
      finished_at: None,
      final_status: None,
      generation: 1,
      entries: Vec::new(),
    }
  }

  /// Continues this journal in a new process after a reboot.
  pub fn next_generation(mut self) -> Self {
    self.generation += 1;
    self.finished_at = None;
    self.final_status = None;
    self
  }

  /// Number of entries for `name` that reached a final success status.
  pub fn succeeded_count(&self, name: &str) -> usize {
    self
      .entries
      .iter()
      .filter(|e| {
        e.name == name
          && matches!(e.status, StepStatus::Succeeded | StepStatus::CheckpointRequested)
      })
      .count()
  }
}
