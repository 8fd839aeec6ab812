//! Machine role (e.g. `MGR`, `STAFF`).

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Classification of the target machine.
///
/// Stored trimmed and upper-cased so that role tags written as `mgr` and `MGR`
/// select the same steps.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Role(String);

impl Role {
  pub fn new(name: impl AsRef<str>) -> Self {
    Self(name.as_ref().trim().to_ascii_uppercase())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  pub fn is_blank(&self) -> bool {
    self.0.is_empty()
  }
}

impl fmt::Display for Role {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for Role {
  fn from(s: &str) -> Self {
    Role::new(s)
  }
}

impl From<String> for Role {
  fn from(s: String) -> Self {
    Role::new(s)
  }
}

impl<'de> Deserialize<'de> for Role {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    String::deserialize(deserializer).map(Role::new)
  }
}
