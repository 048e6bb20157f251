use chrono::{DateTime, Utc};

use super::RowId;

/// A value attached to a resource by a column (§3). Uniqueness is
/// `(column_id, resource_id)`, with upsert-replace semantics on
/// `object_hash` — re-running a column against the same resource overwrites
/// the prior value rather than erroring.
#[derive(Debug, Clone)]
pub struct ColumnValue {
    pub id: RowId,
    pub column_id: RowId,
    pub resource_id: RowId,
    pub object_hash: String,
    pub created_at: DateTime<Utc>,
}
