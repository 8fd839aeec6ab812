//! Load and rewrite journal.json, the per-run step record kept across reboots.

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::checkpoint_io::write_json_atomic;
use crate::logging::{LogEntry, ProvisionLog, Severity};
use crate::scheduler::RunObserver;
use crate::types::{JournalEntry, RunJournal, RunState, StepDefinition, StepStatus};

/// Default filename for the journal under the state directory.
pub const JOURNAL_FILENAME: &str = "journal.json";

/// Loads a journal from `path`. Returns error if file is missing or invalid JSON.
pub fn load_journal(path: &Path) -> Result<RunJournal, std::io::Error> {
  let bytes = std::fs::read(path)?;
  serde_json::from_slice(&bytes)
    .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

/// Writes `journal` to `path` atomically, creating the parent directory if needed.
pub fn write_journal(path: &Path, journal: &RunJournal) -> Result<(), std::io::Error> {
  write_json_atomic(path, journal)
}

/// [RunObserver] that rewrites the journal after every step transition.
///
/// The journal is informational: a failed write is logged at Warning and the
/// run carries on.
pub struct JournalRecorder {
  path: PathBuf,
  journal: RunJournal,
  log: Arc<dyn ProvisionLog>,
}

impl JournalRecorder {
  pub fn new(path: impl Into<PathBuf>, journal: RunJournal, log: Arc<dyn ProvisionLog>) -> Self {
    Self {
      path: path.into(),
      journal,
      log,
    }
  }

  pub fn journal(&self) -> &RunJournal {
    &self.journal
  }

  /// Stamps the final state of this process and writes the journal one last time.
  pub fn finish(&mut self, state: RunState) {
    self.journal.finished_at = Some(Utc::now());
    self.journal.final_status = Some(state.to_string());
    self.flush();
  }

  pub fn into_journal(self) -> RunJournal {
    self.journal
  }

  fn flush(&self) {
    if let Err(e) = write_journal(&self.path, &self.journal) {
      self.log.record(
        LogEntry::new(
          Severity::Warning,
          format!("could not write run journal {}: {}", self.path.display(), e),
        )
        .with_role(&self.journal.role),
      );
    }
  }
}

impl RunObserver for JournalRecorder {
  fn step_started(&mut self, step: &StepDefinition) {
    self.journal.entries.push(JournalEntry {
      generation: self.journal.generation,
      name: step.name.clone(),
      section: step.key.section,
      priority: step.key.priority,
      status: StepStatus::Running,
      started_at: Utc::now(),
      finished_at: None,
      error: None,
    });
    self.flush();
  }

  fn step_finished(&mut self, step: &StepDefinition, status: StepStatus, error: Option<&str>) {
    let generation = self.journal.generation;
    let entry = self
      .journal
      .entries
      .iter_mut()
      .rev()
      .find(|e| e.generation == generation && e.name == step.name && e.key() == step.key);
    if let Some(entry) = entry {
      entry.status = status;
      entry.finished_at = Some(Utc::now());
      entry.error = error.map(str::to_string);
    }
    self.flush();
  }
}
