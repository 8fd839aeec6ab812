//! # provision-orchestrator
//!
//! Reboot-safe, role-scoped step orchestration for unattended workstation
//! provisioning.
//!
//! ## Architecture
//!
//! Provisioning modules contribute step declarations to a [registry::StepRegistry].
//! The registry is narrowed to the machine's role ([role_filter]) and ordered by
//! `(section, priority)` ([scheduler::plan]); the scheduler runs the plan one
//! step at a time. A step may ask the [checkpoint_manager::CheckpointManager] to
//! persist where the run stands, arm an auto-resume trigger and reboot. On the
//! next start the [resume] launcher consumes that checkpoint and the run
//! continues from the recorded position. [orchestrator::Orchestrator] ties these
//! together behind one entry point.

pub mod checkpoint_io;
#[cfg(test)]
mod checkpoint_io_test;
pub mod checkpoint_manager;
pub mod config;
pub mod error;
pub mod host;
pub mod journal_io;
pub mod logging;
pub mod manifest;
#[cfg(test)]
mod manifest_test;
pub mod orchestrator;
#[cfg(test)]
mod orchestrator_test;
pub mod registry;
pub mod resume;
pub mod role_filter;
pub mod scheduler;
#[cfg(test)]
mod test_support;
pub mod types;
pub mod vault;

pub use config::{ProvisionConfig, TriggerKind};
pub use error::ProvisionError;
pub use logging::{MemoryLog, ProvisionLog, Severity, TracingLog};
pub use manifest::{ModuleManifest, load_manifest};
pub use orchestrator::{LaunchOutcome, LaunchRequest, Orchestrator, RunReport, build_plan};
pub use registry::{ProvisioningModule, StaticModule, StepRegistry};
pub use types::{Role, StepDeclaration, StepKey, StepOutcome};
