//! Step registry: merges the step declarations of every loaded provisioning module.
//!
//! The registry validates and records; it never filters or sorts.

use std::collections::{BTreeSet, HashMap};
use tracing::{debug, instrument};

use crate::error::RegistrationError;
use crate::types::{OrderValue, RegisteredStep, Role, StepDeclaration, StepDefinition, StepKey};

/// A feature-specific source of steps (system settings, software, cleanup, ...).
pub trait ProvisioningModule {
  fn name(&self) -> &str;

  /// Declarations in declaration order.
  fn steps(&self) -> Result<Vec<StepDeclaration>, RegistrationError>;
}

/// In-code module: a name and a list of declarations.
#[derive(Debug, Clone)]
pub struct StaticModule {
  name: String,
  steps: Vec<StepDeclaration>,
}

impl StaticModule {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      steps: Vec::new(),
    }
  }

  pub fn step(mut self, step: StepDeclaration) -> Self {
    self.steps.push(step);
    self
  }
}

impl ProvisioningModule for StaticModule {
  fn name(&self) -> &str {
    &self.name
  }

  fn steps(&self) -> Result<Vec<StepDeclaration>, RegistrationError> {
    Ok(self.steps.clone())
  }
}

/// Validated steps of all modules, built once during initialization.
#[derive(Debug, Default)]
pub struct StepRegistry {
  steps: Vec<RegisteredStep>,
  next_ordinal: HashMap<String, usize>,
}

impl StepRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Builds a registry from `modules`, in the given load order.
  pub fn from_modules<'a, I>(modules: I) -> Result<Self, RegistrationError>
  where
    I: IntoIterator<Item = &'a dyn ProvisioningModule>,
  {
    let mut registry = Self::new();
    for module in modules {
      registry.register_module(module)?;
    }
    Ok(registry)
  }

  /// Registers every step of `module`; returns how many were added.
  pub fn register_module(&mut self, module: &dyn ProvisioningModule) -> Result<usize, RegistrationError> {
    let steps = module.steps()?;
    let count = steps.len();
    for step in steps {
      self.register(module.name(), step)?;
    }
    debug!(module = module.name(), count, "module registered");
    Ok(count)
  }

  /// Validates `step` and appends it to `module`'s declarations.
  #[instrument(level = "trace", skip(self, step), fields(step = %step.name))]
  pub fn register(&mut self, module: &str, step: StepDeclaration) -> Result<(), RegistrationError> {
    if module.trim().is_empty() {
      return Err(RegistrationError::BlankModule);
    }
    let ordinal = self.next_ordinal.get(module).copied().unwrap_or(0);
    let definition = validate(module, ordinal, step)?;
    self.next_ordinal.insert(module.to_string(), ordinal + 1);
    self.steps.push(RegisteredStep {
      definition,
      module: module.to_string(),
      ordinal,
    });
    Ok(())
  }

  /// Registered steps in registration order.
  pub fn steps(&self) -> &[RegisteredStep] {
    &self.steps
  }

  pub fn len(&self) -> usize {
    self.steps.len()
  }

  pub fn is_empty(&self) -> bool {
    self.steps.is_empty()
  }
}

fn validate(module: &str, index: usize, step: StepDeclaration) -> Result<StepDefinition, RegistrationError> {
  let name = step.name.trim().to_string();
  if name.is_empty() {
    return Err(RegistrationError::BlankName {
      module: module.to_string(),
      index,
    });
  }
  let section = order_key(module, &name, "section", &step.section)?;
  let priority = order_key(module, &name, "priority", &step.priority)?;
  let action = step.action.ok_or_else(|| RegistrationError::MissingAction {
    module: module.to_string(),
    name: name.clone(),
  })?;
  let tags: BTreeSet<Role> = step
    .tags
    .iter()
    .map(Role::new)
    .filter(|r| !r.is_blank())
    .collect();
  Ok(StepDefinition {
    name,
    tags,
    key: StepKey::new(section, priority),
    failure_policy: step.failure_policy,
    action,
  })
}

pub(crate) fn order_key(
  module: &str,
  name: &str,
  field: &'static str,
  value: &OrderValue,
) -> Result<i64, RegistrationError> {
  value
    .to_i64()
    .ok_or_else(|| RegistrationError::MalformedOrderKey {
      module: module.to_string(),
      name: name.to_string(),
      field,
      value: value.to_string(),
    })
}
