//! Ordering key of a step: coarse section, then fine-grained priority.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of a step in the global order.
///
/// Derived `Ord` compares `section` first, then `priority`. No numeric band is
/// reserved; any pair of integers is a valid position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StepKey {
  pub section: i64,
  pub priority: i64,
}

impl StepKey {
  pub fn new(section: i64, priority: i64) -> Self {
    Self { section, priority }
  }
}

impl fmt::Display for StepKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "section {} priority {}", self.section, self.priority)
  }
}
