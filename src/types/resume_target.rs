//! Program (and arguments) re-invoked by the auto-resume trigger.

use std::path::PathBuf;

use super::Role;

/// Flag appended to every auto-resume invocation.
pub const RESUME_FLAG: &str = "--resume";

/// Where the orchestrator is re-entered after a reboot, minus the role.
///
/// `args` is the full invocation, stored in the checkpoint and replayed by the
/// resumed process. `launcher_args`, when set, is the short form the host
/// trigger registers instead; it must lead back to the checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeTarget {
  pub program: PathBuf,
  pub args: Vec<String>,
  pub launcher_args: Vec<String>,
}

impl ResumeTarget {
  pub fn new(program: impl Into<PathBuf>) -> Self {
    Self {
      program: program.into(),
      args: Vec::new(),
      launcher_args: Vec::new(),
    }
  }

  pub fn with_args(mut self, args: Vec<String>) -> Self {
    self.args = args;
    self
  }

  pub fn with_launcher_args(mut self, args: Vec<String>) -> Self {
    self.launcher_args = args;
    self
  }

  /// Invocation the trigger registers for `role`: launcher args (or the full
  /// args when there are none), then `--role <role> --resume`.
  pub fn command_for(&self, role: &Role) -> ResumeCommand {
    let mut args = if self.launcher_args.is_empty() {
      self.args.clone()
    } else {
      self.launcher_args.clone()
    };
    args.push("--role".to_string());
    args.push(role.as_str().to_string());
    args.push(RESUME_FLAG.to_string());
    ResumeCommand {
      program: self.program.clone(),
      args,
    }
  }
}

/// Concrete command line registered with the host's auto-run primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeCommand {
  pub program: PathBuf,
  pub args: Vec<String>,
}

impl ResumeCommand {
  /// Single-string command line, quoting the program and any argument that is
  /// empty or contains whitespace or quotes.
  pub fn command_line(&self) -> String {
    let mut parts = vec![quote(&self.program.to_string_lossy())];
    parts.extend(self.args.iter().map(|a| quote(a)));
    parts.join(" ")
  }
}

/// Quotes for the Windows argv parser: backslashes are literal unless they
/// precede a quote, so those runs (and a trailing run) are doubled.
fn quote(arg: &str) -> String {
  if !arg.is_empty() && !arg.chars().any(|c| c.is_whitespace() || c == '"') {
    return arg.to_string();
  }
  let mut out = String::with_capacity(arg.len() + 2);
  out.push('"');
  let mut backslashes = 0;
  for c in arg.chars() {
    match c {
      '\\' => {
        backslashes += 1;
        continue;
      }
      '"' => {
        out.extend(std::iter::repeat_n('\\', backslashes * 2 + 1));
        out.push('"');
      }
      _ => {
        out.extend(std::iter::repeat_n('\\', backslashes));
        out.push(c);
      }
    }
    backslashes = 0;
  }
  out.extend(std::iter::repeat_n('\\', backslashes * 2));
  out.push('"');
  out
}
