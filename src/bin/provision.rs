//! CLI: run, inspect or cancel reboot-safe workstation provisioning.
//!
//! Usage: `provision run --role <ROLE> --manifest <FILE>...`
//! Example: provision run --role MGR --manifest system.json --manifest software.json
//!
//! The checkpoint (checkpoint.json) and run journal (journal.json) live in the
//! state directory. After a checkpoint reboot the auto-resume trigger re-invokes
//! `provision run --state-dir <DIR> --role <ROLE> --resume`; the manifests and
//! settings are replayed from the checkpoint's recorded arguments.
//!
//! Set RUST_LOG=provision_orchestrator=trace for TRACE-level events.

use clap::{Args, Parser, Subcommand};
use std::iter;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use provision_orchestrator::checkpoint_io::read_checkpoint;
use provision_orchestrator::error::{ConfigError, ManifestError, ProvisionError, RegistrationError, ResumeError};
use provision_orchestrator::journal_io::load_journal;
use provision_orchestrator::logging::{LogEntry, ProvisionLog, Severity};
use provision_orchestrator::types::{ResumeTarget, RunJournal};
use provision_orchestrator::{
  LaunchOutcome, LaunchRequest, ModuleManifest, Orchestrator, ProvisionConfig, ProvisioningModule,
  Role, TracingLog, build_plan, load_manifest,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Reboot-safe, role-scoped workstation provisioning.
#[derive(Parser, Debug)]
#[command(name = "provision", version)]
#[command(
  after_help = r#"Environment variables (override the matching flags when set):
  PROVISION_STATE_DIR      Directory for checkpoint.json and journal.json
  PROVISION_TASK_NAME      Scheduled task / RunOnce value name
  PROVISION_TRIGGER        logon, boot or run-once
  PROVISION_REBOOT_DELAY   Seconds before the checkpoint reboot
  PROVISION_SIMULATE_HOST  1/true to record trigger and reboot instead of performing them

Examples:
  provision run --role MGR --manifest system.json --manifest software.json
  provision plan --role STAFF --manifest system.json
  provision status"#
)]
struct Cli {
  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Run provisioning, resuming from a pending checkpoint if there is one.
  Run {
    #[command(flatten)]
    steps: StepArgs,

    /// Invoked by the auto-resume trigger; does nothing if no checkpoint is pending.
    #[arg(long)]
    resume: bool,

    #[command(flatten)]
    state: StateArgs,
  },
  /// Print the execution plan for a role.
  Plan {
    #[command(flatten)]
    steps: StepArgs,
  },
  /// Show the pending checkpoint and the run journal.
  Status {
    #[command(flatten)]
    state: StateArgs,
  },
  /// Remove the pending checkpoint and the auto-resume trigger.
  Cancel {
    #[command(flatten)]
    state: StateArgs,
  },
}

#[derive(Args, Debug)]
struct StepArgs {
  /// Machine role (case-insensitive).
  #[arg(long, value_name = "ROLE", default_value = "")]
  role: String,

  /// Step manifest (JSON); repeat for several modules. `run` may omit it when
  /// a pending checkpoint recorded the manifests.
  #[arg(long = "manifest", value_name = "FILE")]
  manifests: Vec<PathBuf>,
}

#[derive(Args, Debug, Default)]
struct StateArgs {
  /// Directory for checkpoint.json and journal.json. Default: %ProgramData%\Provisioning or .provision
  #[arg(long, value_name = "DIR")]
  state_dir: Option<PathBuf>,

  /// Auto-resume trigger: logon, boot or run-once.
  #[arg(long, value_name = "KIND")]
  trigger: Option<String>,

  /// Scheduled task / RunOnce value name.
  #[arg(long, value_name = "NAME")]
  task_name: Option<String>,

  /// Seconds between the checkpoint and the reboot.
  #[arg(long, value_name = "SECS")]
  reboot_delay: Option<u32>,

  /// Record trigger and reboot requests instead of performing them.
  #[arg(long)]
  simulate_host: bool,
}

impl StateArgs {
  /// Flags first, then `PROVISION_*` overrides.
  fn config(&self) -> Result<ProvisionConfig, ConfigError> {
    let mut cfg = ProvisionConfig::default();
    if let Some(dir) = &self.state_dir {
      cfg.state_dir = dir.clone();
    }
    if let Some(trigger) = &self.trigger {
      cfg.trigger = trigger.parse()?;
    }
    if let Some(name) = &self.task_name {
      cfg.task_name = name.clone();
    }
    if let Some(delay) = self.reboot_delay {
      cfg.reboot_delay_secs = delay;
    }
    cfg.simulate_host = self.simulate_host;
    cfg.from_env()
  }
}

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();
  let code = match execute(cli.command) {
    Ok(()) => 0,
    Err(Failure { error, logged }) => {
      if !logged {
        TracingLog.record(LogEntry::new(Severity::Critical, error.to_string()));
      }
      eprintln!("Error: {}", error);
      error.exit_code()
    }
  };
  process::exit(code);
}

/// Fatal error of a command; `logged` when the orchestrator already recorded
/// it at Critical.
struct Failure {
  error: ProvisionError,
  logged: bool,
}

impl Failure {
  fn logged(error: ProvisionError) -> Self {
    Self { error, logged: true }
  }
}

impl From<ProvisionError> for Failure {
  fn from(error: ProvisionError) -> Self {
    Self { error, logged: false }
  }
}

impl From<ConfigError> for Failure {
  fn from(e: ConfigError) -> Self {
    ProvisionError::from(e).into()
  }
}

impl From<ManifestError> for Failure {
  fn from(e: ManifestError) -> Self {
    ProvisionError::from(e).into()
  }
}

impl From<ResumeError> for Failure {
  fn from(e: ResumeError) -> Self {
    ProvisionError::from(e).into()
  }
}

impl From<RegistrationError> for Failure {
  fn from(e: RegistrationError) -> Self {
    ProvisionError::from(e).into()
  }
}

fn execute(command: Command) -> Result<(), Failure> {
  match command {
    Command::Run {
      steps,
      resume,
      state,
    } => run(steps, resume, state),
    Command::Plan { steps } => plan(steps),
    Command::Status { state } => status(state),
    Command::Cancel { state } => cancel(state),
  }
}

fn load_modules(paths: &[PathBuf]) -> Result<Vec<ModuleManifest>, ManifestError> {
  let mut modules = Vec::with_capacity(paths.len());
  for path in paths {
    modules.push(load_manifest(path)?);
  }
  Ok(modules)
}

fn absolute(path: &Path) -> PathBuf {
  std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Arguments recorded in the checkpoint: the manifests and effective
/// settings of this run. The trigger itself only carries `run --state-dir`
/// (plus `--role <ROLE> --resume`) and the rest is replayed from the
/// checkpoint.
fn resume_target(steps: &StepArgs, cfg: &ProvisionConfig) -> ResumeTarget {
  let program = std::env::current_exe().unwrap_or_else(|_| PathBuf::from("provision"));
  let mut args = vec!["run".to_string()];
  for manifest in &steps.manifests {
    args.push("--manifest".to_string());
    args.push(absolute(manifest).display().to_string());
  }
  args.extend([
    "--state-dir".to_string(),
    absolute(&cfg.state_dir).display().to_string(),
    "--trigger".to_string(),
    cfg.trigger.to_string(),
    "--task-name".to_string(),
    cfg.task_name.clone(),
    "--reboot-delay".to_string(),
    cfg.reboot_delay_secs.to_string(),
  ]);
  if cfg.simulate_host {
    args.push("--simulate-host".to_string());
  }
  let launcher = vec![
    "run".to_string(),
    "--state-dir".to_string(),
    absolute(&cfg.state_dir).display().to_string(),
  ];
  ResumeTarget::new(program).with_args(args).with_launcher_args(launcher)
}

/// Manifests and settings for a `run` invoked without `--manifest`: replayed
/// from the pending checkpoint's recorded arguments. `None` when there is no
/// readable checkpoint; the orchestrator then reports the duplicate trigger
/// or the corrupt checkpoint itself.
fn replay_from_checkpoint(cfg: &ProvisionConfig) -> Result<Option<(StepArgs, StateArgs)>, ConfigError> {
  let checkpoint = match read_checkpoint(&cfg.checkpoint_path()) {
    Ok(Some(cp)) => cp,
    Ok(None) | Err(_) => return Ok(None),
  };
  let invalid = || ConfigError::InvalidValue {
    name: "resume_args".to_string(),
    value: checkpoint.resume_args.join(" "),
  };
  let replayed = Cli::try_parse_from(iter::once("provision".to_string()).chain(checkpoint.resume_args.iter().cloned()))
    .map_err(|_| invalid())?;
  match replayed.command {
    Command::Run { steps, state, .. } if !steps.manifests.is_empty() => Ok(Some((steps, state))),
    _ => Err(invalid()),
  }
}

fn run(steps: StepArgs, resume: bool, state: StateArgs) -> Result<(), Failure> {
  let mut steps = steps;
  let mut cfg = state.config()?;
  if steps.manifests.is_empty() {
    match replay_from_checkpoint(&cfg)? {
      Some((replayed, replayed_state)) => {
        info!(manifests = replayed.manifests.len(), "replaying manifests from checkpoint");
        steps.manifests = replayed.manifests;
        cfg = replayed_state.config()?;
      }
      None if resume => {}
      None => return Err(ConfigError::MissingManifests.into()),
    }
  }
  info!(
    state_dir = %cfg.state_dir.display(),
    trigger = %cfg.trigger,
    simulate_host = cfg.simulate_host,
    resume,
    "options (env or flags)"
  );
  let modules = load_modules(&steps.manifests)?;
  let request = LaunchRequest {
    role: Role::new(&steps.role),
    resume_invocation: resume,
    target: resume_target(&steps, &cfg),
  };

  let mut orchestrator = Orchestrator::from_config(&cfg, Arc::new(TracingLog));
  let report = orchestrator
    .launch(request, modules.iter().map(|m| m as &dyn ProvisioningModule))
    .map_err(Failure::logged)?;

  match report.outcome {
    LaunchOutcome::Completed {
      executed,
      skipped,
      best_effort_failures,
    } => {
      println!("Provisioning completed.");
      println!("  Role: {}", report.role);
      println!("  Executed: {}", executed);
      println!("  Skipped (before checkpoint): {}", skipped);
      if !best_effort_failures.is_empty() {
        println!("  Best-effort failures: {}", best_effort_failures.join(", "));
      }
    }
    LaunchOutcome::Paused {
      checkpoint_name,
      resume_at,
    } => {
      println!("Checkpoint `{}` recorded; rebooting.", checkpoint_name);
      println!("  Role: {}", report.role);
      println!("  Resumes at: {}", resume_at);
    }
    LaunchOutcome::DuplicateTrigger => {
      println!("No pending checkpoint; nothing to resume.");
    }
  }
  Ok(())
}

fn plan(steps: StepArgs) -> Result<(), Failure> {
  let role = Role::new(&steps.role);
  if role.is_blank() {
    return Err(ConfigError::BlankRole.into());
  }
  if steps.manifests.is_empty() {
    return Err(ConfigError::MissingManifests.into());
  }
  let modules = load_modules(&steps.manifests)?;
  let plan = build_plan(modules.iter().map(|m| m as &dyn ProvisioningModule), &role)?;
  println!("Execution plan for role {} ({} steps):", role, plan.len());
  for step in plan.steps() {
    println!(
      "  {:>4} {:>4}  {} [{}]",
      step.definition.key.section, step.definition.key.priority, step.definition.name, step.module
    );
  }
  Ok(())
}

fn status(state: StateArgs) -> Result<(), Failure> {
  let cfg = state.config()?;
  let orchestrator = Orchestrator::from_config(&cfg, Arc::new(TracingLog));
  match orchestrator.pending_checkpoint()? {
    Some(cp) => {
      println!("Pending checkpoint: {}", cp.checkpoint_name);
      println!("  Role: {}", cp.role);
      println!("  Resumes at: {}", cp.resume_point());
      println!("  Recorded: {}", cp.timestamp.to_rfc3339());
      println!("  Run: {}", cp.run_id);
    }
    None => println!("No pending checkpoint."),
  }
  match load_journal(&cfg.journal_path()) {
    Ok(journal) => print_journal(&journal),
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => println!("No run journal."),
    Err(e) => println!("Run journal unreadable: {}", e),
  }
  Ok(())
}

fn print_journal(journal: &RunJournal) {
  println!("Run {} (role {}, generation {})", journal.run_id, journal.role, journal.generation);
  if let Some(status) = &journal.final_status {
    println!("  Last status: {}", status);
  }
  for entry in &journal.entries {
    println!(
      "  [{}] {} {}  {}",
      entry.generation,
      entry.key(),
      entry.name,
      entry.status
    );
  }
}

fn cancel(state: StateArgs) -> Result<(), Failure> {
  let cfg = state.config()?;
  let orchestrator = Orchestrator::from_config(&cfg, Arc::new(TracingLog));
  let report = orchestrator.cancel()?;
  if report.checkpoint_removed {
    println!("Pending checkpoint removed.");
  } else {
    println!("No pending checkpoint.");
  }
  if !report.trigger_removed {
    println!("Auto-resume trigger could not be removed; see log.");
  }
  Ok(())
}
