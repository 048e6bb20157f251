use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::RowId;

/// A per-resource derivation rule: runs `script` against one resource (plus
/// its declared dependency column values) and emits exactly one value
/// (§3). `resource_name` restricts the column to resources produced under
/// that name; `dependencies` lists other column names that must already
/// hold a value on a resource before this column is schedulable.
///
/// Uniqueness is `(name, resource_name, version)`, with the same
/// version-bump rule as `Step`, keyed on `(name, resource_name, script,
/// dependencies)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    pub id: RowId,
    pub name: String,
    pub resource_name: String,
    pub script: String,
    pub parallel: Option<u32>,
    pub dependencies: Vec<String>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
}

/// A column as declared by the manifest, before catalog reconciliation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewColumn {
    pub name: String,
    #[serde(rename = "resource")]
    pub resource_name: String,
    pub script: String,
    pub parallel: Option<u32>,
    #[serde(default)]
    pub dependencies: Vec<String>,
}
