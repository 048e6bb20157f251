//! The manifest shape the core consumes (§6: "supplied as an opaque
//! pre-parsed structure"). Parsing a manifest file is thin glue that lives
//! in `loom-cli::manifest`; this module only states the record shape so the
//! core, the CLI, and tests can all agree on it without `loom-core` reading
//! TOML itself.
//!
//! Grounded on `chem_core::repo::types::FlowDefinition` for the idea of an
//! immutable, pre-built definition object the engine consumes, generalised
//! from a single linear step sequence to the step/column declarations this
//! engine schedules.

use serde::{Deserialize, Serialize};

use crate::domain::{NewColumn, NewStep};
use crate::error::CoreError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub steps: Vec<NewStep>,
    #[serde(default)]
    pub columns: Vec<NewColumn>,
}

impl Manifest {
    /// Validates that every `Step.inputs` and `Column.dependencies` entry
    /// refers to a name actually declared in this manifest. The scheduler
    /// itself tolerates dangling names (it would simply never schedule
    /// anything for them), but a manifest that references a step/column
    /// that was never declared is almost always an operator typo worth
    /// failing fast on.
    pub fn validate(&self) -> Result<(), CoreError> {
        let step_names: std::collections::HashSet<&str> = self.steps.iter().map(|s| s.name.as_str()).collect();
        let column_names: std::collections::HashSet<&str> = self.columns.iter().map(|c| c.name.as_str()).collect();

        for step in &self.steps {
            for input in &step.inputs {
                if !step_names.contains(input.as_str()) {
                    return Err(CoreError::UnknownStepInput { name: step.name.clone(), input: input.clone() });
                }
            }
        }

        for column in &self.columns {
            for dependency in &column.dependencies {
                if !column_names.contains(dependency.as_str()) {
                    return Err(CoreError::UnknownColumnDependency { name: column.name.clone(),
                                                                    dependency: dependency.clone() });
                }
            }
        }

        Ok(())
    }

    /// Steps declared with no inputs — the seed steps run at startup (§4.7).
    pub fn seed_steps(&self) -> impl Iterator<Item = &NewStep> {
        self.steps.iter().filter(|s| s.inputs.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(name: &str, inputs: &[&str]) -> NewStep {
        NewStep { name: name.into(),
                 script: "true".into(),
                 parallel: None,
                 inputs: inputs.iter().map(|s| s.to_string()).collect() }
    }

    #[test]
    fn validate_accepts_known_inputs() {
        let m = Manifest { steps: vec![step("seed", &[]), step("upper", &["seed"])],
                           columns: vec![] };
        assert!(m.validate().is_ok());
    }

    #[test]
    fn validate_rejects_unknown_input() {
        let m = Manifest { steps: vec![step("upper", &["missing"])],
                           columns: vec![] };
        assert!(matches!(m.validate(), Err(CoreError::UnknownStepInput { .. })));
    }

    #[test]
    fn seed_steps_filters_by_empty_inputs() {
        let m = Manifest { steps: vec![step("seed", &[]), step("upper", &["seed"])],
                           columns: vec![] };
        let seeds: Vec<_> = m.seed_steps().map(|s| s.name.as_str()).collect();
        assert_eq!(seeds, vec!["seed"]);
    }
}
