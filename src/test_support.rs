//! Shared fixtures for unit tests: a temp state dir, recording host, memory log.

use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

use crate::checkpoint_io::{CheckpointStore, FileCheckpointStore};
use crate::checkpoint_manager::CheckpointManager;
use crate::error::ResumeError;
use crate::host::{RecordingRebooter, RecordingScheduler};
use crate::logging::MemoryLog;
use crate::types::{Checkpoint, ExecutionContext, ResumeTarget, Role};

pub(crate) struct Harness {
  pub dir: TempDir,
  pub store: Arc<FileCheckpointStore>,
  pub scheduler: Arc<RecordingScheduler>,
  pub rebooter: Arc<RecordingRebooter>,
  pub log: Arc<MemoryLog>,
}

impl Harness {
  pub fn new() -> Self {
    Self::with_host(RecordingScheduler::new(), RecordingRebooter::new())
  }

  pub fn with_host(scheduler: RecordingScheduler, rebooter: RecordingRebooter) -> Self {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(FileCheckpointStore::in_dir(dir.path()));
    Self {
      dir,
      store,
      scheduler: Arc::new(scheduler),
      rebooter: Arc::new(rebooter),
      log: Arc::new(MemoryLog::new()),
    }
  }

  pub fn target() -> ResumeTarget {
    ResumeTarget::new(PathBuf::from("provision.exe"))
      .with_args(vec!["run".to_string(), "--manifest".to_string(), "base.json".to_string()])
  }

  pub fn manager(&self) -> Arc<CheckpointManager> {
    Arc::new(CheckpointManager::new(
      self.store.clone(),
      self.scheduler.clone(),
      self.rebooter.clone(),
      self.log.clone(),
    ))
  }

  pub fn manager_with_store(&self, store: Arc<dyn CheckpointStore>) -> Arc<CheckpointManager> {
    Arc::new(CheckpointManager::new(
      store,
      self.scheduler.clone(),
      self.rebooter.clone(),
      self.log.clone(),
    ))
  }

  pub fn context(&self, role: &str) -> ExecutionContext {
    ExecutionContext::new(Role::new(role), Self::target(), self.log.clone(), self.manager())
  }

  pub fn pending(&self) -> Option<Checkpoint> {
    self.store.load().expect("load checkpoint")
  }
}

/// Store whose writes always fail.
pub(crate) struct ReadOnlyStore;

impl CheckpointStore for ReadOnlyStore {
  fn load(&self) -> Result<Option<Checkpoint>, ResumeError> {
    Ok(None)
  }

  fn save(&self, _cp: &Checkpoint) -> std::io::Result<()> {
    Err(std::io::Error::new(
      std::io::ErrorKind::PermissionDenied,
      "read-only volume",
    ))
  }

  fn remove(&self) -> std::io::Result<()> {
    Err(std::io::Error::new(
      std::io::ErrorKind::PermissionDenied,
      "read-only volume",
    ))
  }

  fn location(&self) -> PathBuf {
    PathBuf::from("R:/state/checkpoint.json")
  }
}
