//! Runtime configuration: state location, auto-resume trigger and reboot settings.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use crate::checkpoint_io::CHECKPOINT_FILENAME;
use crate::checkpoint_manager::DEFAULT_REBOOT_DELAY_SECS;
use crate::error::ConfigError;
use crate::host::{
  CommandRunner, RebootPlatform, Rebooter, RecordingRebooter, RecordingScheduler, ResumeScheduler,
  RunOnceTrigger, ScheduledTaskTrigger, ShutdownRebooter, SystemRunner, TaskTrigger,
};
use crate::journal_io::JOURNAL_FILENAME;

/// Name of the scheduled task / RunOnce value that re-invokes the orchestrator.
pub const DEFAULT_TASK_NAME: &str = "ProvisionResume";

/// State directory used when `ProgramData` is not set.
pub const FALLBACK_STATE_DIR: &str = ".provision";

pub const ENV_STATE_DIR: &str = "PROVISION_STATE_DIR";
pub const ENV_TASK_NAME: &str = "PROVISION_TASK_NAME";
pub const ENV_TRIGGER: &str = "PROVISION_TRIGGER";
pub const ENV_REBOOT_DELAY: &str = "PROVISION_REBOOT_DELAY";
pub const ENV_SIMULATE_HOST: &str = "PROVISION_SIMULATE_HOST";

/// Host primitive used to re-invoke the orchestrator after a reboot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriggerKind {
  /// Scheduled task on next logon.
  #[default]
  Logon,
  /// Scheduled task on next boot, as SYSTEM.
  Boot,
  /// `RunOnce` registry value.
  RunOnce,
}

impl FromStr for TriggerKind {
  type Err = ConfigError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "logon" => Ok(TriggerKind::Logon),
      "boot" => Ok(TriggerKind::Boot),
      "run-once" | "runonce" => Ok(TriggerKind::RunOnce),
      _ => Err(ConfigError::UnknownTrigger(s.to_string())),
    }
  }
}

impl fmt::Display for TriggerKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      TriggerKind::Logon => "logon",
      TriggerKind::Boot => "boot",
      TriggerKind::RunOnce => "run-once",
    };
    f.write_str(s)
  }
}

/// Effective settings for one process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionConfig {
  pub state_dir: PathBuf,
  pub task_name: String,
  pub trigger: TriggerKind,
  pub reboot_delay_secs: u32,
  /// Record trigger and reboot requests instead of touching the OS.
  pub simulate_host: bool,
}

impl Default for ProvisionConfig {
  fn default() -> Self {
    Self {
      state_dir: default_state_dir(),
      task_name: DEFAULT_TASK_NAME.to_string(),
      trigger: TriggerKind::default(),
      reboot_delay_secs: DEFAULT_REBOOT_DELAY_SECS,
      simulate_host: false,
    }
  }
}

/// `%ProgramData%\Provisioning` when `ProgramData` is set, else `.provision`.
pub fn default_state_dir() -> PathBuf {
  state_dir_under(std::env::var_os("ProgramData").as_deref().map(Path::new))
}

pub(crate) fn state_dir_under(program_data: Option<&Path>) -> PathBuf {
  match program_data {
    Some(dir) if !dir.as_os_str().is_empty() => dir.join("Provisioning"),
    _ => PathBuf::from(FALLBACK_STATE_DIR),
  }
}

impl ProvisionConfig {
  pub fn checkpoint_path(&self) -> PathBuf {
    self.state_dir.join(CHECKPOINT_FILENAME)
  }

  pub fn journal_path(&self) -> PathBuf {
    self.state_dir.join(JOURNAL_FILENAME)
  }

  /// Environment overrides from the process environment.
  pub fn from_env(self) -> Result<Self, ConfigError> {
    self.apply_env_overrides(|name| std::env::var(name).ok())
  }

  /// Applies `PROVISION_*` overrides looked up through `lookup`. Set values win
  /// over what is already configured; empty values are ignored.
  pub fn apply_env_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
  where
    F: Fn(&str) -> Option<String>,
  {
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
    if let Some(dir) = get(ENV_STATE_DIR) {
      self.state_dir = PathBuf::from(dir);
    }
    if let Some(name) = get(ENV_TASK_NAME) {
      self.task_name = name.trim().to_string();
    }
    if let Some(trigger) = get(ENV_TRIGGER) {
      self.trigger = trigger.parse()?;
    }
    if let Some(delay) = get(ENV_REBOOT_DELAY) {
      self.reboot_delay_secs = delay.trim().parse().map_err(|_| ConfigError::InvalidValue {
        name: ENV_REBOOT_DELAY.to_string(),
        value: delay.clone(),
      })?;
    }
    if let Some(flag) = get(ENV_SIMULATE_HOST) {
      self.simulate_host = parse_flag(ENV_SIMULATE_HOST, &flag)?;
    }
    Ok(self)
  }

  /// Trigger and reboot implementations for this configuration.
  pub fn host(&self) -> HostBindings {
    if self.simulate_host {
      return HostBindings {
        scheduler: Arc::new(RecordingScheduler::new()),
        rebooter: Arc::new(RecordingRebooter::new()),
      };
    }
    let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner);
    let scheduler: Arc<dyn ResumeScheduler> = match self.trigger {
      TriggerKind::Logon => Arc::new(ScheduledTaskTrigger::new(
        &self.task_name,
        TaskTrigger::Logon,
        runner.clone(),
      )),
      TriggerKind::Boot => Arc::new(ScheduledTaskTrigger::new(
        &self.task_name,
        TaskTrigger::Boot,
        runner.clone(),
      )),
      TriggerKind::RunOnce => Arc::new(RunOnceTrigger::new(&self.task_name, runner.clone())),
    };
    HostBindings {
      scheduler,
      rebooter: Arc::new(ShutdownRebooter::new(RebootPlatform::native(), runner)),
    }
  }
}

/// OS-facing collaborators chosen by [ProvisionConfig::host].
#[derive(Clone)]
pub struct HostBindings {
  pub scheduler: Arc<dyn ResumeScheduler>,
  pub rebooter: Arc<dyn Rebooter>,
}

fn parse_flag(name: &str, value: &str) -> Result<bool, ConfigError> {
  match value.trim().to_ascii_lowercase().as_str() {
    "1" | "true" | "yes" | "on" => Ok(true),
    "0" | "false" | "no" | "off" => Ok(false),
    _ => Err(ConfigError::InvalidValue {
      name: name.to_string(),
      value: value.to_string(),
    }),
  }
}
