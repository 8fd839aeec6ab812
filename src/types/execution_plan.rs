//! Ordered sequence of steps for one process run.

use super::{RegisteredStep, StepDefinition, StepKey};

/// Steps sorted by `(section, priority, module, ordinal)`.
///
/// Rebuilt on every process start, resumes included; never persisted.
#[derive(Debug, Clone, Default)]
pub struct ExecutionPlan {
  steps: Vec<RegisteredStep>,
}

impl ExecutionPlan {
  /// Wraps steps that are already in execution order.
  pub(crate) fn from_sorted(steps: Vec<RegisteredStep>) -> Self {
    Self { steps }
  }

  pub fn len(&self) -> usize {
    self.steps.len()
  }

  pub fn is_empty(&self) -> bool {
    self.steps.is_empty()
  }

  pub fn steps(&self) -> &[RegisteredStep] {
    &self.steps
  }

  pub fn iter(&self) -> impl Iterator<Item = &StepDefinition> {
    self.steps.iter().map(|s| &s.definition)
  }

  pub fn names(&self) -> Vec<&str> {
    self.iter().map(|s| s.name.as_str()).collect()
  }

  /// Steps that execute when resuming at `resume_at` (all of them when `None`).
  pub fn remaining(&self, resume_at: Option<StepKey>) -> impl Iterator<Item = &StepDefinition> {
    self
      .iter()
      .filter(move |s| resume_at.is_none_or(|at| s.key >= at))
  }
}
