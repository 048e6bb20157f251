use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::RowId;

/// A named content artifact (§3). Uniqueness is `(name, object_hash)`: the
/// same bytes under the same name always resolve to the same row.
///
/// `created_by_task_id` is the task whose execution emitted these bytes;
/// `None` for resources seeded outside of any task (§9: only resources with
/// a creating task are eligible step inputs — a deliberately preserved
/// quirk, not a bug, see DESIGN.md).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub id: RowId,
    pub name: String,
    pub object_hash: String,
    pub created_at: DateTime<Utc>,
    pub created_by_task_id: Option<RowId>,
}
