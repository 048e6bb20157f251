//! Diesel `Queryable`/`Insertable` row shapes and their conversion to/from
//! `loom_core::domain` types. Kept separate from `schema.rs` (generated-style
//! table declarations) and `catalog.rs` (query logic), mirroring how the
//! teacher split row structs out of its query module.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use loom_core::domain::{Column, ColumnTask, ColumnValue, NewColumn, NewStep, Resource, RowId, Step, Task};
use loom_core::hash::{canonical_name_list, parse_name_list};
use loom_core::StoreError;

use crate::schema::{column_tasks, column_values, columns, resources, steps, tasks};

fn parse_ts(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
                                   .map_err(|e| StoreError::Backend(format!("bad timestamp {s:?}: {e}")))
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

#[derive(Queryable, Debug)]
pub struct StepRow {
    pub id: i64,
    pub name: String,
    pub script: String,
    pub parallel: Option<i32>,
    pub inputs: String,
    pub version: i64,
    pub created_at: String,
}

impl StepRow {
    pub fn into_domain(self) -> Result<Step, StoreError> {
        Ok(Step { id: self.id,
                  name: self.name,
                  script: self.script,
                  parallel: self.parallel.map(|p| p as u32),
                  inputs: parse_name_list(&self.inputs),
                  version: self.version,
                  created_at: parse_ts(&self.created_at)? })
    }
}

#[derive(Insertable)]
#[diesel(table_name = steps)]
pub struct NewStepRow {
    pub name: String,
    pub script: String,
    pub parallel: Option<i32>,
    pub inputs: String,
    pub version: i64,
    pub created_at: String,
}

impl NewStepRow {
    pub fn first_version(new_step: &NewStep) -> Self {
        Self { name: new_step.name.clone(),
               script: new_step.script.clone(),
               parallel: new_step.parallel.map(|p| p as i32),
               inputs: canonical_name_list(&new_step.inputs),
               version: 1,
               created_at: now_rfc3339() }
    }

    pub fn next_version(new_step: &NewStep, version: i64) -> Self {
        Self { version, ..Self::first_version(new_step) }
    }
}

#[derive(Queryable, Debug)]
pub struct ColumnRow {
    pub id: i64,
    pub name: String,
    pub resource_name: String,
    pub script: String,
    pub parallel: Option<i32>,
    pub dependencies: String,
    pub version: i64,
    pub created_at: String,
}

impl ColumnRow {
    pub fn into_domain(self) -> Result<Column, StoreError> {
        Ok(Column { id: self.id,
                     name: self.name,
                     resource_name: self.resource_name,
                     script: self.script,
                     parallel: self.parallel.map(|p| p as u32),
                     dependencies: parse_name_list(&self.dependencies),
                     version: self.version,
                     created_at: parse_ts(&self.created_at)? })
    }
}

#[derive(Insertable)]
#[diesel(table_name = columns)]
pub struct NewColumnRow {
    pub name: String,
    pub resource_name: String,
    pub script: String,
    pub parallel: Option<i32>,
    pub dependencies: String,
    pub version: i64,
    pub created_at: String,
}

impl NewColumnRow {
    pub fn first_version(new_column: &NewColumn) -> Self {
        Self { name: new_column.name.clone(),
               resource_name: new_column.resource_name.clone(),
               script: new_column.script.clone(),
               parallel: new_column.parallel.map(|p| p as i32),
               dependencies: canonical_name_list(&new_column.dependencies),
               version: 1,
               created_at: now_rfc3339() }
    }

    pub fn next_version(new_column: &NewColumn, version: i64) -> Self {
        Self { version, ..Self::first_version(new_column) }
    }
}

#[derive(Queryable, Debug)]
pub struct ResourceRow {
    pub id: i64,
    pub name: String,
    pub object_hash: String,
    pub created_at: String,
    pub created_by_task_id: Option<i64>,
}

impl ResourceRow {
    pub fn into_domain(self) -> Result<Resource, StoreError> {
        Ok(Resource { id: self.id,
                       name: self.name,
                       object_hash: self.object_hash,
                       created_at: parse_ts(&self.created_at)?,
                       created_by_task_id: self.created_by_task_id })
    }
}

#[derive(Insertable)]
#[diesel(table_name = resources)]
pub struct NewResourceRow {
    pub name: String,
    pub object_hash: String,
    pub created_at: String,
    pub created_by_task_id: Option<i64>,
}

#[derive(Queryable, Debug)]
pub struct TaskRow {
    pub id: i64,
    pub step_id: i64,
    pub input_resource_id: Option<i64>,
    pub processed: bool,
    pub error: Option<String>,
}

#[derive(Insertable)]
#[diesel(table_name = tasks)]
pub struct NewTaskRow {
    pub step_id: i64,
    pub input_resource_id: Option<i64>,
}

impl TaskRow {
    pub fn into_domain(self) -> Task {
        Task { id: self.id,
               step_id: self.step_id,
               input_resource_id: self.input_resource_id,
               processed: self.processed,
               error: self.error }
    }
}

#[derive(Queryable, Debug)]
pub struct ColumnTaskRow {
    pub id: i64,
    pub column_id: i64,
    pub resource_id: i64,
    pub processed: bool,
    pub error: Option<String>,
}

impl ColumnTaskRow {
    pub fn into_domain(self) -> ColumnTask {
        ColumnTask { id: self.id,
                     column_id: self.column_id,
                     resource_id: self.resource_id,
                     processed: self.processed,
                     error: self.error }
    }
}

#[derive(Insertable)]
#[diesel(table_name = column_tasks)]
pub struct NewColumnTaskRow {
    pub column_id: i64,
    pub resource_id: i64,
    pub processed: bool,
}

#[derive(Queryable, Debug)]
pub struct ColumnValueRow {
    pub id: i64,
    pub column_id: i64,
    pub resource_id: i64,
    pub object_hash: String,
    pub created_at: String,
}

impl ColumnValueRow {
    pub fn into_domain(self) -> Result<ColumnValue, StoreError> {
        Ok(ColumnValue { id: self.id,
                          column_id: self.column_id,
                          resource_id: self.resource_id,
                          object_hash: self.object_hash,
                          created_at: parse_ts(&self.created_at)? })
    }
}

#[derive(Insertable)]
#[diesel(table_name = column_values)]
pub struct NewColumnValueRow {
    pub column_id: i64,
    pub resource_id: i64,
    pub object_hash: String,
    pub created_at: String,
}

impl NewColumnValueRow {
    pub fn new(column_id: RowId, resource_id: RowId, object_hash: &str) -> Self {
        Self { column_id, resource_id, object_hash: object_hash.to_string(), created_at: now_rfc3339() }
    }
}
