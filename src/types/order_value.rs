//! Raw section/priority value as declared by a module, before validation.

use serde::Deserialize;
use std::fmt;

/// A section or priority as written in a declaration: an integer, or text that
/// should hold one (`"70"`). Validated into `i64` at registration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum OrderValue {
  Int(i64),
  Text(String),
}

impl OrderValue {
  /// Returns the integer this value denotes, or `None` when it is not a
  /// well-formed integer.
  pub fn to_i64(&self) -> Option<i64> {
    match self {
      OrderValue::Int(v) => Some(*v),
      OrderValue::Text(s) => s.trim().parse().ok(),
    }
  }
}

impl fmt::Display for OrderValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      OrderValue::Int(v) => write!(f, "{}", v),
      OrderValue::Text(s) => write!(f, "{}", s),
    }
  }
}

impl From<i32> for OrderValue {
  fn from(v: i32) -> Self {
    OrderValue::Int(v.into())
  }
}

impl From<i64> for OrderValue {
  fn from(v: i64) -> Self {
    OrderValue::Int(v)
  }
}

impl From<&str> for OrderValue {
  fn from(s: &str) -> Self {
    OrderValue::Text(s.to_string())
  }
}

impl From<String> for OrderValue {
  fn from(s: String) -> Self {
    OrderValue::Text(s)
  }
}
