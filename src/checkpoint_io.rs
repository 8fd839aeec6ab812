//! Checkpoint save/load/remove in the state directory (JSON).

use serde::Serialize;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::instrument;

use crate::error::ResumeError;
use crate::types::Checkpoint;

/// Default filename for the checkpoint under the state directory.
pub const CHECKPOINT_FILENAME: &str = "checkpoint.json";

/// Durable home of the single live checkpoint.
pub trait CheckpointStore {
  /// `Ok(None)` when no checkpoint is pending.
  fn load(&self) -> Result<Option<Checkpoint>, ResumeError>;

  /// Writes `cp`, replacing any prior checkpoint.
  fn save(&self, cp: &Checkpoint) -> std::io::Result<()>;

  /// Deletes the checkpoint; a missing checkpoint is not an error.
  fn remove(&self) -> std::io::Result<()>;

  /// Where the checkpoint lives, for messages.
  fn location(&self) -> PathBuf;
}

/// [CheckpointStore] backed by one JSON file.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
  path: PathBuf,
}

impl FileCheckpointStore {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  /// Store at `<state_dir>/checkpoint.json`.
  pub fn in_dir(state_dir: &Path) -> Self {
    Self::new(state_dir.join(CHECKPOINT_FILENAME))
  }
}

impl CheckpointStore for FileCheckpointStore {
  fn load(&self) -> Result<Option<Checkpoint>, ResumeError> {
    read_checkpoint(&self.path)
  }

  fn save(&self, cp: &Checkpoint) -> std::io::Result<()> {
    save_checkpoint(&self.path, cp)
  }

  fn remove(&self) -> std::io::Result<()> {
    remove_checkpoint(&self.path)
  }

  fn location(&self) -> PathBuf {
    self.path.clone()
  }
}

/// Saves a checkpoint to `path` as JSON, atomically.
#[instrument(level = "trace", skip(path, cp))]
pub fn save_checkpoint(path: &Path, cp: &Checkpoint) -> std::io::Result<()> {
  write_json_atomic(path, cp)
}

/// Loads the checkpoint at `path`. A missing file is `Ok(None)`; a file that
/// exists but cannot be read or parsed is a [ResumeError].
#[instrument(level = "trace", skip(path))]
pub fn read_checkpoint(path: &Path) -> Result<Option<Checkpoint>, ResumeError> {
  let bytes = match fs::read(path) {
    Ok(b) => b,
    Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
    Err(source) => {
      return Err(ResumeError::Unreadable {
        path: path.to_path_buf(),
        source,
      });
    }
  };
  serde_json::from_slice(&bytes)
    .map(Some)
    .map_err(|source| ResumeError::Corrupt {
      path: path.to_path_buf(),
      source,
    })
}

/// Deletes the checkpoint at `path`, if any.
#[instrument(level = "trace", skip(path))]
pub fn remove_checkpoint(path: &Path) -> std::io::Result<()> {
  match fs::remove_file(path) {
    Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
    other => other,
  }
}

/// Writes `value` as pretty JSON to a sibling temp file, syncs it and renames
/// it over `path`, so readers see the old or the new content, never a torn write.
pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> std::io::Result<()> {
  let json = serde_json::to_vec_pretty(value)
    .map_err(|e| std::io::Error::new(ErrorKind::InvalidData, e))?;
  if let Some(parent) = path.parent() {
    if !parent.as_os_str().is_empty() {
      fs::create_dir_all(parent)?;
    }
  }
  let mut tmp = path.as_os_str().to_owned();
  tmp.push(".tmp");
  let tmp = PathBuf::from(tmp);
  {
    let mut file = File::create(&tmp)?;
    file.write_all(&json)?;
    file.sync_all()?;
  }
  fs::rename(&tmp, path)
}
