//! Logging collaborator: leveled, step-scoped messages and section markers.
//!
//! [TracingLog] forwards everything to `tracing`; [MemoryLog] keeps entries in
//! memory so tests can assert on what an operator would have seen.

use std::fmt;
use std::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::types::{Role, StepKey};

/// Operator-facing severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
  Debug,
  Info,
  Success,
  Warning,
  Error,
  Critical,
}

impl fmt::Display for Severity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      Severity::Debug => "debug",
      Severity::Info => "info",
      Severity::Success => "success",
      Severity::Warning => "warning",
      Severity::Error => "error",
      Severity::Critical => "critical",
    };
    f.write_str(s)
  }
}

/// One log message with optional role and step context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
  pub severity: Severity,
  pub message: String,
  pub role: Option<Role>,
  pub step: Option<String>,
  pub key: Option<StepKey>,
}

impl LogEntry {
  pub fn new(severity: Severity, message: impl Into<String>) -> Self {
    Self {
      severity,
      message: message.into(),
      role: None,
      step: None,
      key: None,
    }
  }

  pub fn with_role(mut self, role: &Role) -> Self {
    self.role = Some(role.clone());
    self
  }

  pub fn with_step(mut self, step: &str, key: StepKey) -> Self {
    self.step = Some(step.to_string());
    self.key = Some(key);
    self
  }
}

/// Sink for operator-facing log output.
pub trait ProvisionLog {
  fn record(&self, entry: LogEntry);

  /// Marks the start of a section's steps in this process.
  fn section_started(&self, section: i64);

  /// Marks the end of a section's steps in this process.
  fn section_finished(&self, section: i64);
}

/// Production sink: emits `tracing` events.
///
/// Success maps to INFO with `outcome = "success"`; Critical maps to ERROR with
/// `severity = "critical"`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLog;

impl ProvisionLog for TracingLog {
  fn record(&self, entry: LogEntry) {
    let role = entry.role.as_ref().map(Role::as_str).unwrap_or("");
    let step = entry.step.as_deref().unwrap_or("");
    let section = entry.key.map(|k| k.section);
    let priority = entry.key.map(|k| k.priority);
    let msg = entry.message.as_str();
    match entry.severity {
      Severity::Debug => debug!(role, step, ?section, ?priority, "{}", msg),
      Severity::Info => info!(role, step, ?section, ?priority, "{}", msg),
      Severity::Success => {
        info!(outcome = "success", role, step, ?section, ?priority, "{}", msg)
      }
      Severity::Warning => warn!(role, step, ?section, ?priority, "{}", msg),
      Severity::Error => error!(role, step, ?section, ?priority, "{}", msg),
      Severity::Critical => {
        error!(severity = "critical", role, step, ?section, ?priority, "{}", msg)
      }
    }
  }

  fn section_started(&self, section: i64) {
    info!(section, "section start");
  }

  fn section_finished(&self, section: i64) {
    info!(section, "section stop");
  }
}

/// Something a [MemoryLog] saw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEvent {
  Entry(LogEntry),
  SectionStarted(i64),
  SectionFinished(i64),
}

/// In-memory sink for tests and embedding callers.
#[derive(Debug, Default)]
pub struct MemoryLog {
  events: Mutex<Vec<LogEvent>>,
}

impl MemoryLog {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn events(&self) -> Vec<LogEvent> {
    self.lock().clone()
  }

  pub fn entries(&self) -> Vec<LogEntry> {
    self
      .lock()
      .iter()
      .filter_map(|e| match e {
        LogEvent::Entry(entry) => Some(entry.clone()),
        _ => None,
      })
      .collect()
  }

  pub fn at(&self, severity: Severity) -> Vec<LogEntry> {
    self
      .entries()
      .into_iter()
      .filter(|e| e.severity == severity)
      .collect()
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, Vec<LogEvent>> {
    // A panicking test thread poisons the lock; the log itself is still usable.
    self.events.lock().unwrap_or_else(|p| p.into_inner())
  }
}

impl ProvisionLog for MemoryLog {
  fn record(&self, entry: LogEntry) {
    self.lock().push(LogEvent::Entry(entry));
  }

  fn section_started(&self, section: i64) {
    self.lock().push(LogEvent::SectionStarted(section));
  }

  fn section_finished(&self, section: i64) {
    self.lock().push(LogEvent::SectionFinished(section));
  }
}
