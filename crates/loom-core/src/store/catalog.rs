//! `Catalog` (C2): the relational scheduling surface (§4.2). Every write is
//! set-based (`INSERT ... SELECT ... WHERE NOT EXISTS`-shaped) so two
//! drivers racing the same manifest never double-schedule a task; every
//! read that can return more than a handful of rows comes back as a
//! `RowCursor` instead of a `Vec`.
//!
//! Grounded on `chem_core::repo::FlowRepository`'s trait-per-backend shape,
//! generalised from one flow-run's event log to the step/column scheduling
//! tables this engine actually needs.

use crate::domain::{Column, ColumnTask, ColumnValue, NewColumn, NewStep, Resource, Step, Task};

use super::{RowCursor, StoreError};

pub trait Catalog: Send + Sync {
    /// Reconciles a manifest-declared step against the catalog: inserts a
    /// new `(name, version)` row when `(script, inputs)` changed since the
    /// last version (or this is the first time `name` is seen), otherwise
    /// updates `parallel` in place and returns the existing row unchanged
    /// otherwise (§4.2, §9 version-bump rule).
    fn create_step(&self, step: &NewStep) -> Result<Step, StoreError>;

    /// Same reconciliation rule as `create_step`, keyed on
    /// `(name, resource_name, script, dependencies)`.
    fn create_column(&self, column: &NewColumn) -> Result<Column, StoreError>;

    /// Insert-on-conflict-do-nothing, then select: returns the new resource
    /// row, or the existing one if `(name, object_hash)` already exists.
    /// Idempotent — callers may retry freely. Does not itself schedule
    /// dependent tasks; that fan-out is the driver's `ScheduleTasksForStep`
    /// call over each manifest step in the next pass (§4.3, §4.7).
    fn create_resource_with_task(&self, name: &str, object_hash: &str, created_by_task_id: Option<i64>)
                                  -> Result<Resource, StoreError>;

    /// Ensures exactly one `Task(step_id, input_resource_id=None)` row
    /// exists for a seed step, creating it if absent, and returns it
    /// unchanged otherwise (§4.7 `ExecuteStep` seed-step special case). Not
    /// a scheduling decision in the §4.3 sense — a seed step has no
    /// predecessor to join through, so this is the one place a `Task` row
    /// is created directly rather than via `INSERT ... SELECT`.
    fn ensure_seed_task(&self, step_id: i64) -> Result<Task, StoreError>;

    /// `INSERT INTO tasks SELECT ... WHERE NOT EXISTS` for every resource
    /// eligible to be this step's input that doesn't already have a task row
    /// (§4.3). Returns the number of rows inserted.
    fn schedule_tasks_for_step(&self, step_id: i64) -> Result<u64, StoreError>;

    /// Column analogue of `schedule_tasks_for_step`, gated on every
    /// dependency column already holding a value for the candidate resource
    /// (§4.3).
    fn schedule_column_tasks_for_column(&self, column_id: i64) -> Result<u64, StoreError>;

    fn unprocessed_tasks(&self, step_id: i64) -> Result<RowCursor<Task>, StoreError>;

    fn unprocessed_column_tasks(&self, column_id: i64) -> Result<RowCursor<ColumnTask>, StoreError>;

    /// Marks a task processed (terminal, §7 — failures do not retry
    /// automatically).
    fn update_task_status(&self, task_id: i64, error: Option<&str>) -> Result<(), StoreError>;

    fn update_column_task_status(&self, column_task_id: i64, error: Option<&str>) -> Result<(), StoreError>;

    /// Records a column's output value, replacing any prior value for the
    /// same `(column_id, resource_id)` (§3 upsert-replace semantics).
    fn put_column_value(&self, column_id: i64, resource_id: i64, object_hash: &str) -> Result<ColumnValue, StoreError>;

    fn count_resources(&self) -> Result<i64, StoreError>;

    fn count_tasks_for_step(&self, step_id: i64) -> Result<i64, StoreError>;

    fn count_unprocessed_tasks_for_step(&self, step_id: i64) -> Result<i64, StoreError>;

    /// Steps with no declared inputs — the seed steps a driver bootstraps
    /// against a synthetic empty resource on startup (§4.7).
    fn steps_with_zero_inputs(&self) -> Result<Vec<Step>, StoreError>;

    fn step_by_name(&self, name: &str) -> Result<Option<Step>, StoreError>;

    fn column_by_name(&self, name: &str, resource_name: &str) -> Result<Option<Column>, StoreError>;

    fn resource(&self, resource_id: i64) -> Result<Resource, StoreError>;

    fn resources_by_name(&self, name: &str) -> Result<RowCursor<Resource>, StoreError>;

    /// Distinct resource names in the catalog, ordered lexically (export's
    /// `--tar` mode groups entries by name; §6).
    fn all_resource_names(&self) -> Result<Vec<String>, StoreError>;

    /// Every resource across every name, most recently created first
    /// (export's unfiltered `--csv` mode; §6).
    fn all_resources(&self) -> Result<RowCursor<Resource>, StoreError>;

    fn resource_by_hash(&self, object_hash: &str) -> Result<Option<Resource>, StoreError>;

    fn column_value(&self, column_id: i64, resource_id: i64) -> Result<Option<ColumnValue>, StoreError>;

    fn all_steps(&self) -> Result<Vec<Step>, StoreError>;

    fn all_columns(&self) -> Result<Vec<Column>, StoreError>;

    /// The newest version of every distinct `(name, resource_name)` column,
    /// ordered by name (export's `--csv` header/lookup needs exactly one
    /// column per logical column, not one per version; §6).
    fn latest_columns(&self) -> Result<Vec<Column>, StoreError>;

    /// Forces a WAL checkpoint so every prior write survives a hard kill of
    /// the process (§4.2, §7). A no-op for backends without a WAL.
    fn force_save_wal(&self) -> Result<(), StoreError>;
}
