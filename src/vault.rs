//! Credential vault collaborator, consumed by steps that need secrets
//! (for example to set up auto-logon before a reboot).

use std::fmt;
use thiserror::Error;

use crate::types::Role;

/// Credential scoped to a role.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
  pub username: String,
  pub password: String,
}

impl fmt::Debug for Credential {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Credential")
      .field("username", &self.username)
      .field("password", &"<redacted>")
      .finish()
  }
}

/// Vault failure. Decryption problems are their own kind.
#[derive(Debug, Error)]
pub enum VaultError {
  #[error("decryption failed: {0}")]
  Decryption(String),

  #[error("no credential stored for role {0}")]
  NotFound(Role),

  #[error("no vault configured for this run")]
  Unavailable,

  #[error("vault backend error: {0}")]
  Backend(String),
}

/// Encrypted credential storage.
pub trait Vault {
  fn encrypt_text(&self, plaintext: &str) -> Result<String, VaultError>;

  fn decrypt_text(&self, ciphertext: &str) -> Result<String, VaultError>;

  fn credential(&self, role: &Role) -> Result<Credential, VaultError>;
}
