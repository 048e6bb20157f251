use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::RowId;

/// A producer rule: runs `script` against zero or one input resources,
/// emits zero or more output resources (§3).
///
/// `inputs` is an ordered list of step-name references; empty means a seed
/// step. Uniqueness is `(name, version)`; a new row is appended with
/// `version = max_version(name) + 1` whenever `(script, inputs)` changes,
/// and is a no-op (`parallel` update only) when they match an existing row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub id: RowId,
    pub name: String,
    pub script: String,
    pub parallel: Option<u32>,
    pub inputs: Vec<String>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
}

impl Step {
    pub fn is_seed(&self) -> bool {
        self.inputs.is_empty()
    }
}

/// A step as declared by the manifest, before it has been reconciled
/// against the catalog (no id/version yet — see `loom_core::manifest`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewStep {
    pub name: String,
    pub script: String,
    pub parallel: Option<u32>,
    #[serde(default)]
    pub inputs: Vec<String>,
}
