//! Step declarations (as contributed by modules) and validated step definitions.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use super::{ExecutionContext, OrderValue, Role, StepKey, StepOutcome};
use crate::error::StepError;

/// Deferred unit of provisioning work.
///
/// Every input is reachable through the [ExecutionContext]; actions do not
/// capture the active role or other run state from their surroundings.
pub trait StepAction {
  fn run(&self, ctx: &ExecutionContext) -> Result<StepOutcome, StepError>;
}

impl<F> StepAction for F
where
  F: Fn(&ExecutionContext) -> Result<StepOutcome, StepError>,
{
  fn run(&self, ctx: &ExecutionContext) -> Result<StepOutcome, StepError> {
    self(ctx)
  }
}

/// What happens to the run when a step's action fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
  /// Log at Critical and abort the run.
  #[default]
  FailFast,
  /// Log at Warning and continue with the next step.
  BestEffort,
}

/// Unvalidated step as declared by a provisioning module.
#[derive(Clone)]
pub struct StepDeclaration {
  pub name: String,
  pub tags: Vec<String>,
  pub section: OrderValue,
  pub priority: OrderValue,
  pub failure_policy: FailurePolicy,
  pub action: Option<Arc<dyn StepAction>>,
}

impl StepDeclaration {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      tags: Vec::new(),
      section: OrderValue::Int(0),
      priority: OrderValue::Int(0),
      failure_policy: FailurePolicy::FailFast,
      action: None,
    }
  }

  pub fn section(mut self, section: impl Into<OrderValue>) -> Self {
    self.section = section.into();
    self
  }

  pub fn priority(mut self, priority: impl Into<OrderValue>) -> Self {
    self.priority = priority.into();
    self
  }

  pub fn tag(mut self, role: impl Into<String>) -> Self {
    self.tags.push(role.into());
    self
  }

  pub fn best_effort(mut self) -> Self {
    self.failure_policy = FailurePolicy::BestEffort;
    self
  }

  pub fn action<F>(mut self, action: F) -> Self
  where
    F: Fn(&ExecutionContext) -> Result<StepOutcome, StepError> + 'static,
  {
    self.action = Some(Arc::new(action));
    self
  }

  pub fn shared_action(mut self, action: Arc<dyn StepAction>) -> Self {
    self.action = Some(action);
    self
  }
}

impl fmt::Debug for StepDeclaration {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("StepDeclaration")
      .field("name", &self.name)
      .field("tags", &self.tags)
      .field("section", &self.section)
      .field("priority", &self.priority)
      .field("failure_policy", &self.failure_policy)
      .field("has_action", &self.action.is_some())
      .finish()
  }
}

/// Validated step, ready to be filtered and planned.
#[derive(Clone)]
pub struct StepDefinition {
  pub name: String,
  /// Roles this step applies to; empty means every role.
  pub tags: BTreeSet<Role>,
  pub key: StepKey,
  pub failure_policy: FailurePolicy,
  pub action: Arc<dyn StepAction>,
}

impl StepDefinition {
  pub fn applies_to(&self, role: &Role) -> bool {
    self.tags.is_empty() || self.tags.contains(role)
  }
}

impl fmt::Debug for StepDefinition {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("StepDefinition")
      .field("name", &self.name)
      .field("tags", &self.tags)
      .field("key", &self.key)
      .field("failure_policy", &self.failure_policy)
      .finish_non_exhaustive()
  }
}

/// Step as held by the registry: the definition plus its canonical
/// registration position, `(module, ordinal)`, used only to break ties.
#[derive(Debug, Clone)]
pub struct RegisteredStep {
  pub definition: StepDefinition,
  pub module: String,
  /// Declaration index within `module`.
  pub ordinal: usize,
}
