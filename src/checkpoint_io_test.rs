//! Tests for checkpoint save/load/remove.

use chrono::Utc;
use std::path::PathBuf;
use uuid::Uuid;

use crate::checkpoint_io::{
  CHECKPOINT_FILENAME, CheckpointStore, FileCheckpointStore, read_checkpoint, remove_checkpoint,
  save_checkpoint,
};
use crate::error::ResumeError;
use crate::types::{Checkpoint, Role};

fn checkpoint(name: &str, next_priority: i64) -> Checkpoint {
  Checkpoint {
    checkpoint_name: name.to_string(),
    section: 1,
    next_priority,
    role: Role::new("MGR"),
    resume_target: PathBuf::from("provision.exe"),
    resume_args: vec!["run".to_string()],
    launcher_args: Vec::new(),
    run_id: Uuid::new_v4(),
    timestamp: Utc::now(),
  }
}

#[test]
fn save_then_load_returns_the_record() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join(CHECKPOINT_FILENAME);
  let cp = checkpoint("Checkpoint1", 70);
  save_checkpoint(&path, &cp).unwrap();
  assert!(path.exists());
  assert_eq!(read_checkpoint(&path).unwrap(), Some(cp));
}

#[test]
fn save_creates_missing_state_dir_and_leaves_no_temp_file() {
  let dir = tempfile::tempdir().unwrap();
  let state = dir.path().join("nested").join("state");
  let store = FileCheckpointStore::in_dir(&state);
  store.save(&checkpoint("cp", 5)).unwrap();
  let names: Vec<String> = std::fs::read_dir(&state)
    .unwrap()
    .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
    .collect();
  assert_eq!(names, vec![CHECKPOINT_FILENAME.to_string()]);
}

#[test]
fn save_overwrites_prior_checkpoint() {
  let dir = tempfile::tempdir().unwrap();
  let store = FileCheckpointStore::in_dir(dir.path());
  store.save(&checkpoint("first", 40)).unwrap();
  store.save(&checkpoint("second", 80)).unwrap();
  let loaded = store.load().unwrap().unwrap();
  assert_eq!(loaded.checkpoint_name, "second");
  assert_eq!(loaded.next_priority, 80);
}

#[test]
fn load_missing_file_is_none() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("nonexistent.json");
  assert!(read_checkpoint(&path).unwrap().is_none());
}

#[test]
fn load_corrupt_file_is_resume_error() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join(CHECKPOINT_FILENAME);
  std::fs::write(&path, b"{\"checkpoint_name\": \"cp\", \"section\": ").unwrap();
  let err = read_checkpoint(&path).unwrap_err();
  assert!(matches!(err, ResumeError::Corrupt { .. }));
  assert!(path.exists(), "corrupt checkpoint is kept for manual recovery");
}

#[test]
fn load_directory_is_unreadable() {
  let dir = tempfile::tempdir().unwrap();
  let err = read_checkpoint(dir.path()).unwrap_err();
  assert!(matches!(err, ResumeError::Unreadable { .. }));
}

#[test]
fn remove_is_idempotent() {
  let dir = tempfile::tempdir().unwrap();
  let store = FileCheckpointStore::in_dir(dir.path());
  store.save(&checkpoint("cp", 5)).unwrap();
  store.remove().unwrap();
  assert!(store.load().unwrap().is_none());
  store.remove().unwrap();
  remove_checkpoint(&store.location()).unwrap();
}
