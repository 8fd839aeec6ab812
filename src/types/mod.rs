//! Data model of the provisioning engine: steps, plans, checkpoints and run records.

mod checkpoint;
mod execution_context;
#[cfg(test)]
mod execution_context_test;
mod execution_plan;
mod order_value;
mod resume_target;
mod role;
mod run_journal;
mod run_state;
mod step_definition;
mod step_key;
mod step_outcome;
mod step_status;

pub use checkpoint::Checkpoint;
pub use execution_context::{ExecutionContext, PendingCheckpoint};
pub use execution_plan::ExecutionPlan;
pub use order_value::OrderValue;
pub use resume_target::{RESUME_FLAG, ResumeCommand, ResumeTarget};
pub use role::Role;
pub use run_journal::{JOURNAL_VERSION, JournalEntry, RunJournal};
pub use run_state::RunState;
pub use step_definition::{
  FailurePolicy, RegisteredStep, StepAction, StepDeclaration, StepDefinition,
};
pub use step_key::StepKey;
pub use step_outcome::StepOutcome;
pub use step_status::StepStatus;
