//! Role filter: narrows registered steps to those that apply to the machine's role.

use tracing::instrument;

use crate::types::{RegisteredStep, Role};

/// Keeps steps whose tags are empty or contain `role`, preserving order.
///
/// Unknown roles are legal and match only untagged steps.
#[instrument(level = "trace", skip(steps), fields(role = %role))]
pub fn select<'a>(steps: &'a [RegisteredStep], role: &Role) -> Vec<&'a RegisteredStep> {
  steps
    .iter()
    .filter(|s| s.definition.applies_to(role))
    .collect()
}
