//! `Catalog` (C2) / scheduler (C3) implementation over `SqliteConnection`
//! (§4.2, §4.3).
//!
//! Scheduling is expressed as `INSERT INTO ... SELECT ... WHERE NOT EXISTS`
//! statements issued via `diesel::sql_query`, one per predecessor
//! step/dependency column rather than a single dynamic-arity statement —
//! Diesel's query builder has no ergonomic way to bind a variable-length
//! `IN (...)` list, so this reuses the teacher's own raw-SQL escape hatch
//! (`chem_persistence::pg::NewEventRow`'s hand-rolled `RETURNING` handling)
//! at a slightly finer grain. No task or resource row is ever inspected in
//! Rust to decide eligibility; the `WHERE NOT EXISTS` guard is what decides.

use diesel::prelude::*;
use diesel::sql_types::{BigInt, Text};
use diesel::sqlite::SqliteConnection;
use loom_core::domain::{Column, ColumnTask, ColumnValue, NewColumn, NewStep, Resource, Step, Task};
use loom_core::retry::{retry_on_busy, RetryPolicy};
use loom_core::store::{Catalog, RowCursor};
use loom_core::StoreError;

use crate::error::{map_diesel_err, TxError};
use crate::pool::{force_save_wal, ConnectionProvider};
use crate::rows::{ColumnRow, ColumnTaskRow, ColumnValueRow, NewColumnRow, NewColumnTaskRow, NewColumnValueRow,
                   NewResourceRow, NewStepRow, NewTaskRow, ResourceRow, StepRow, TaskRow};
use crate::schema::{column_tasks, column_values, columns, resources, steps, tasks};

pub struct SqliteCatalog<P: ConnectionProvider> {
    provider: P,
}

impl<P: ConnectionProvider> SqliteCatalog<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    fn with_conn<T>(&self, f: impl FnMut(&mut SqliteConnection) -> Result<T, StoreError>) -> Result<T, StoreError> {
        retry_on_busy(RetryPolicy::CATALOG_BUSY, f_with_fresh_conn(&self.provider, f))
    }
}

/// Wraps `f` so each retry attempt re-checks out a (possibly different)
/// pooled connection, matching how `retry_on_busy` is used elsewhere in the
/// workspace (the op itself owns connection acquisition).
fn f_with_fresh_conn<'a, P: ConnectionProvider, T>(
    provider: &'a P,
    mut f: impl FnMut(&mut SqliteConnection) -> Result<T, StoreError> + 'a)
    -> impl FnMut() -> Result<T, StoreError> + 'a {
    move || {
        let mut conn = provider.connection()?;
        f(&mut conn)
    }
}

impl<P: ConnectionProvider> Catalog for SqliteCatalog<P> {
    fn create_step(&self, new_step: &NewStep) -> Result<Step, StoreError> {
        self.with_conn(|conn| {
            conn.transaction(|conn| -> Result<Step, TxError> {
                    let existing: Vec<StepRow> = steps::table.filter(steps::name.eq(&new_step.name))
                                                              .order(steps::version.desc())
                                                              .limit(1)
                                                              .load(conn)?;

                    if let Some(latest) = existing.into_iter().next() {
                        let latest_inputs = loom_core::hash::parse_name_list(&latest.inputs);
                        if latest.script == new_step.script && latest_inputs == new_step.inputs {
                            if latest.parallel.map(|p| p as u32) != new_step.parallel {
                                diesel::update(steps::table.filter(steps::id.eq(latest.id)))
                                    .set(steps::parallel.eq(new_step.parallel.map(|p| p as i32)))
                                    .execute(conn)?;
                            }
                            let row: StepRow = steps::table.find(latest.id).first(conn)?;
                            return Ok(row.into_domain()?);
                        }
                        let row = NewStepRow::next_version(new_step, latest.version + 1);
                        let id: i64 = insert_step(conn, row)?;
                        Ok(steps::table.find(id).first::<StepRow>(conn)?.into_domain()?)
                    } else {
                        let row = NewStepRow::first_version(new_step);
                        let id = insert_step(conn, row)?;
                        Ok(steps::table.find(id).first::<StepRow>(conn)?.into_domain()?)
                    }
                })
                .map_err(|TxError(e)| e)
        })
    }

    fn create_column(&self, new_column: &NewColumn) -> Result<Column, StoreError> {
        self.with_conn(|conn| {
            conn.transaction(|conn| -> Result<Column, TxError> {
                    let existing: Vec<ColumnRow> =
                        columns::table.filter(columns::name.eq(&new_column.name)
                                                            .and(columns::resource_name.eq(&new_column.resource_name)))
                                      .order(columns::version.desc())
                                      .limit(1)
                                      .load(conn)?;

                    if let Some(latest) = existing.into_iter().next() {
                        let latest_deps = loom_core::hash::parse_name_list(&latest.dependencies);
                        if latest.script == new_column.script && latest_deps == new_column.dependencies {
                            if latest.parallel.map(|p| p as u32) != new_column.parallel {
                                diesel::update(columns::table.filter(columns::id.eq(latest.id)))
                                    .set(columns::parallel.eq(new_column.parallel.map(|p| p as i32)))
                                    .execute(conn)?;
                            }
                            let row: ColumnRow = columns::table.find(latest.id).first(conn)?;
                            return Ok(row.into_domain()?);
                        }
                        let row = NewColumnRow::next_version(new_column, latest.version + 1);
                        let id = insert_column(conn, row)?;
                        Ok(columns::table.find(id).first::<ColumnRow>(conn)?.into_domain()?)
                    } else {
                        let row = NewColumnRow::first_version(new_column);
                        let id = insert_column(conn, row)?;
                        Ok(columns::table.find(id).first::<ColumnRow>(conn)?.into_domain()?)
                    }
                })
                .map_err(|TxError(e)| e)
        })
    }

    fn create_resource_with_task(&self, name: &str, object_hash: &str, created_by_task_id: Option<i64>)
                                  -> Result<Resource, StoreError> {
        self.with_conn(|conn| {
            conn.transaction(|conn| -> Result<Resource, TxError> {
                    let existing: Option<ResourceRow> =
                        resources::table.filter(resources::name.eq(name).and(resources::object_hash.eq(object_hash)))
                                        .first(conn)
                                        .optional()?;
                    if let Some(row) = existing {
                        return Ok(row.into_domain()?);
                    }

                    let row = NewResourceRow { name: name.to_string(),
                                                object_hash: object_hash.to_string(),
                                                created_at: chrono::Utc::now().to_rfc3339(),
                                                created_by_task_id };
                    diesel::insert_into(resources::table).values(&row).execute(conn)?;
                    let id: i64 = diesel::sql_query("SELECT last_insert_rowid() as id").get_result::<LastRowId>(conn)?
                                                                                        .id;
                    Ok(resources::table.find(id).first::<ResourceRow>(conn)?.into_domain()?)
                })
                .map_err(|TxError(e)| e)
        })
    }

    fn ensure_seed_task(&self, step_id: i64) -> Result<Task, StoreError> {
        self.with_conn(|conn| {
            conn.transaction(|conn| -> Result<Task, TxError> {
                    let existing: Option<TaskRow> =
                        tasks::table.filter(tasks::step_id.eq(step_id).and(tasks::input_resource_id.is_null()))
                                    .first(conn)
                                    .optional()?;
                    if let Some(row) = existing {
                        return Ok(row.into_domain());
                    }
                    diesel::insert_into(tasks::table).values(&NewTaskRow { step_id, input_resource_id: None })
                                                      .execute(conn)?;
                    let id: i64 = diesel::sql_query("SELECT last_insert_rowid() as id").get_result::<LastRowId>(conn)?
                                                                                        .id;
                    Ok(tasks::table.find(id).first::<TaskRow>(conn)?.into_domain())
                })
                .map_err(|TxError(e)| e)
        })
    }

    fn schedule_tasks_for_step(&self, step_id: i64) -> Result<u64, StoreError> {
        self.with_conn(|conn| {
            let step: StepRow = steps::table.find(step_id).first(conn).map_err(map_diesel_err)?;
            let mut inserted = 0u64;

            if step.inputs.is_empty() {
                inserted += diesel::sql_query(
                    "INSERT INTO tasks (step_id, input_resource_id, processed)
                     SELECT ?1, NULL, 0
                     WHERE NOT EXISTS (
                         SELECT 1 FROM tasks WHERE step_id = ?1 AND input_resource_id IS NULL
                     )",
                ).bind::<BigInt, _>(step_id)
                 .execute(conn)
                 .map_err(map_diesel_err)? as u64;
                return Ok(inserted);
            }

            for predecessor in loom_core::hash::parse_name_list(&step.inputs) {
                inserted += diesel::sql_query(
                    "INSERT INTO tasks (step_id, input_resource_id, processed)
                     SELECT ?1, r.id, 0
                     FROM resources r
                     JOIN tasks pt ON r.created_by_task_id = pt.id
                     JOIN steps ps ON pt.step_id = ps.id
                     WHERE ps.name = ?2
                     AND NOT EXISTS (
                         SELECT 1 FROM tasks t WHERE t.step_id = ?1 AND t.input_resource_id = r.id
                     )",
                ).bind::<BigInt, _>(step_id)
                 .bind::<Text, _>(predecessor)
                 .execute(conn)
                 .map_err(map_diesel_err)? as u64;
            }
            Ok(inserted)
        })
    }

    fn schedule_column_tasks_for_column(&self, column_id: i64) -> Result<u64, StoreError> {
        self.with_conn(|conn| {
            let column: ColumnRow = columns::table.find(column_id).first(conn).map_err(map_diesel_err)?;
            let dependencies = loom_core::hash::parse_name_list(&column.dependencies);

            let mut candidate_ids: Vec<i64> =
                diesel::sql_query(
                    "SELECT r.id as id FROM resources r
                     WHERE r.name = ?1
                     AND NOT EXISTS (
                         SELECT 1 FROM column_tasks ct WHERE ct.column_id = ?2 AND ct.resource_id = r.id
                     )",
                ).bind::<Text, _>(&column.resource_name)
                 .bind::<BigInt, _>(column_id)
                 .load::<ResourceId>(conn)
                 .map_err(map_diesel_err)?
                 .into_iter()
                 .map(|r| r.id)
                 .collect();

            for dependency in &dependencies {
                if candidate_ids.is_empty() {
                    break;
                }
                let satisfied: std::collections::HashSet<i64> =
                    diesel::sql_query(
                        "SELECT cv.resource_id as id FROM column_values cv
                         JOIN columns c ON cv.column_id = c.id
                         WHERE c.name = ?1 AND c.resource_name = ?2",
                    ).bind::<Text, _>(dependency)
                     .bind::<Text, _>(&column.resource_name)
                     .load::<ResourceId>(conn)
                     .map_err(map_diesel_err)?
                     .into_iter()
                     .map(|r| r.id)
                     .collect();
                candidate_ids.retain(|id| satisfied.contains(id));
            }

            if candidate_ids.is_empty() {
                return Ok(0);
            }

            let new_rows: Vec<NewColumnTaskRow> =
                candidate_ids.into_iter()
                             .map(|resource_id| NewColumnTaskRow { column_id, resource_id, processed: false })
                             .collect();
            let count = new_rows.len() as u64;
            diesel::insert_into(column_tasks::table).values(&new_rows)
                                                     .execute(conn)
                                                     .map_err(map_diesel_err)?;
            Ok(count)
        })
    }

    fn unprocessed_tasks(&self, step_id: i64) -> Result<RowCursor<Task>, StoreError> {
        self.with_conn(|conn| {
                let rows: Vec<TaskRow> = tasks::table.filter(tasks::step_id.eq(step_id).and(tasks::processed.eq(false)))
                                                      .load(conn)
                                                      .map_err(map_diesel_err)?;
                Ok(rows)
            })
            .map(|rows| RowCursor::new(rows.into_iter().map(|r| Ok(r.into_domain()))))
    }

    fn unprocessed_column_tasks(&self, column_id: i64) -> Result<RowCursor<ColumnTask>, StoreError> {
        self.with_conn(|conn| {
                let rows: Vec<ColumnTaskRow> =
                    column_tasks::table.filter(column_tasks::column_id.eq(column_id)
                                                                       .and(column_tasks::processed.eq(false)))
                                       .load(conn)
                                       .map_err(map_diesel_err)?;
                Ok(rows)
            })
            .map(|rows| RowCursor::new(rows.into_iter().map(|r| Ok(r.into_domain()))))
    }

    fn update_task_status(&self, task_id: i64, error: Option<&str>) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            diesel::update(tasks::table.find(task_id)).set((tasks::processed.eq(true), tasks::error.eq(error)))
                                                        .execute(conn)
                                                        .map_err(map_diesel_err)?;
            Ok(())
        })
    }

    fn update_column_task_status(&self, column_task_id: i64, error: Option<&str>) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            diesel::update(column_tasks::table.find(column_task_id))
                .set((column_tasks::processed.eq(true), column_tasks::error.eq(error)))
                .execute(conn)
                .map_err(map_diesel_err)?;
            Ok(())
        })
    }

    fn put_column_value(&self, column_id: i64, resource_id: i64, object_hash: &str)
                         -> Result<ColumnValue, StoreError> {
        self.with_conn(|conn| {
            conn.transaction(|conn| -> Result<ColumnValue, TxError> {
                    diesel::sql_query(
                        "DELETE FROM column_values WHERE column_id = ?1 AND resource_id = ?2",
                    ).bind::<BigInt, _>(column_id)
                     .bind::<BigInt, _>(resource_id)
                     .execute(conn)?;

                    let row = NewColumnValueRow::new(column_id, resource_id, object_hash);
                    diesel::insert_into(column_values::table).values(&row).execute(conn)?;

                    Ok(column_values::table.filter(column_values::column_id.eq(column_id)
                                                                           .and(column_values::resource_id.eq(resource_id)))
                                           .first::<ColumnValueRow>(conn)?
                                           .into_domain()?)
                })
                .map_err(|TxError(e)| e)
        })
    }

    fn count_resources(&self) -> Result<i64, StoreError> {
        self.with_conn(|conn| resources::table.count().get_result(conn).map_err(map_diesel_err))
    }

    fn count_tasks_for_step(&self, step_id: i64) -> Result<i64, StoreError> {
        self.with_conn(|conn| {
            tasks::table.filter(tasks::step_id.eq(step_id)).count().get_result(conn).map_err(map_diesel_err)
        })
    }

    fn count_unprocessed_tasks_for_step(&self, step_id: i64) -> Result<i64, StoreError> {
        self.with_conn(|conn| {
            tasks::table.filter(tasks::step_id.eq(step_id).and(tasks::processed.eq(false)))
                        .count()
                        .get_result(conn)
                        .map_err(map_diesel_err)
        })
    }

    fn steps_with_zero_inputs(&self) -> Result<Vec<Step>, StoreError> {
        self.with_conn(|conn| {
            let rows: Vec<StepRow> = steps::table.filter(steps::inputs.eq("")).load(conn).map_err(map_diesel_err)?;
            rows.into_iter().map(StepRow::into_domain).collect()
        })
    }

    fn step_by_name(&self, name: &str) -> Result<Option<Step>, StoreError> {
        self.with_conn(|conn| {
            let row: Option<StepRow> = steps::table.filter(steps::name.eq(name))
                                                    .order(steps::version.desc())
                                                    .first(conn)
                                                    .optional()
                                                    .map_err(map_diesel_err)?;
            row.map(StepRow::into_domain).transpose()
        })
    }

    fn column_by_name(&self, name: &str, resource_name: &str) -> Result<Option<Column>, StoreError> {
        self.with_conn(|conn| {
            let row: Option<ColumnRow> =
                columns::table.filter(columns::name.eq(name).and(columns::resource_name.eq(resource_name)))
                              .order(columns::version.desc())
                              .first(conn)
                              .optional()
                              .map_err(map_diesel_err)?;
            row.map(ColumnRow::into_domain).transpose()
        })
    }

    fn resource(&self, resource_id: i64) -> Result<Resource, StoreError> {
        self.with_conn(|conn| {
            resources::table.find(resource_id)
                            .first::<ResourceRow>(conn)
                            .map_err(map_diesel_err)?
                            .into_domain()
        })
    }

    fn resources_by_name(&self, name: &str) -> Result<RowCursor<Resource>, StoreError> {
        self.with_conn(|conn| {
                let rows: Vec<ResourceRow> =
                    resources::table.filter(resources::name.eq(name)).load(conn).map_err(map_diesel_err)?;
                Ok(rows)
            })
            .map(|rows| RowCursor::new(rows.into_iter().map(ResourceRow::into_domain)))
    }

    fn all_resource_names(&self) -> Result<Vec<String>, StoreError> {
        self.with_conn(|conn| {
            resources::table.select(resources::name)
                             .distinct()
                             .order(resources::name.asc())
                             .load(conn)
                             .map_err(map_diesel_err)
        })
    }

    fn all_resources(&self) -> Result<RowCursor<Resource>, StoreError> {
        self.with_conn(|conn| {
                let rows: Vec<ResourceRow> =
                    resources::table.order(resources::created_at.desc()).load(conn).map_err(map_diesel_err)?;
                Ok(rows)
            })
            .map(|rows| RowCursor::new(rows.into_iter().map(ResourceRow::into_domain)))
    }

    fn resource_by_hash(&self, object_hash: &str) -> Result<Option<Resource>, StoreError> {
        self.with_conn(|conn| {
            let row: Option<ResourceRow> = resources::table.filter(resources::object_hash.eq(object_hash))
                                                            .first(conn)
                                                            .optional()
                                                            .map_err(map_diesel_err)?;
            row.map(ResourceRow::into_domain).transpose()
        })
    }

    fn column_value(&self, column_id: i64, resource_id: i64) -> Result<Option<ColumnValue>, StoreError> {
        self.with_conn(|conn| {
            let row: Option<ColumnValueRow> =
                column_values::table.filter(column_values::column_id.eq(column_id)
                                                                     .and(column_values::resource_id.eq(resource_id)))
                                    .first(conn)
                                    .optional()
                                    .map_err(map_diesel_err)?;
            row.map(ColumnValueRow::into_domain).transpose()
        })
    }

    fn all_steps(&self) -> Result<Vec<Step>, StoreError> {
        self.with_conn(|conn| {
            let rows: Vec<StepRow> = steps::table.load(conn).map_err(map_diesel_err)?;
            rows.into_iter().map(StepRow::into_domain).collect()
        })
    }

    fn all_columns(&self) -> Result<Vec<Column>, StoreError> {
        self.with_conn(|conn| {
            let rows: Vec<ColumnRow> = columns::table.load(conn).map_err(map_diesel_err)?;
            rows.into_iter().map(ColumnRow::into_domain).collect()
        })
    }

    fn latest_columns(&self) -> Result<Vec<Column>, StoreError> {
        self.with_conn(|conn| {
            let rows: Vec<ColumnRow> = columns::table.order((columns::name.asc(),
                                                              columns::resource_name.asc(),
                                                              columns::version.desc()))
                                                      .load(conn)
                                                      .map_err(map_diesel_err)?;
            let mut seen = std::collections::HashSet::new();
            let mut latest = Vec::new();
            for row in rows {
                let column = row.into_domain()?;
                if seen.insert((column.name.clone(), column.resource_name.clone())) {
                    latest.push(column);
                }
            }
            Ok(latest)
        })
    }

    fn force_save_wal(&self) -> Result<(), StoreError> {
        self.with_conn(|conn| force_save_wal(conn))
    }
}

fn insert_step(conn: &mut SqliteConnection, row: NewStepRow) -> Result<i64, StoreError> {
    diesel::insert_into(steps::table).values(&row).execute(conn).map_err(map_diesel_err)?;
    Ok(diesel::sql_query("SELECT last_insert_rowid() as id").get_result::<LastRowId>(conn)
                                                             .map_err(map_diesel_err)?
                                                             .id)
}

fn insert_column(conn: &mut SqliteConnection, row: NewColumnRow) -> Result<i64, StoreError> {
    diesel::insert_into(columns::table).values(&row).execute(conn).map_err(map_diesel_err)?;
    Ok(diesel::sql_query("SELECT last_insert_rowid() as id").get_result::<LastRowId>(conn)
                                                             .map_err(map_diesel_err)?
                                                             .id)
}

#[derive(QueryableByName)]
struct LastRowId {
    #[diesel(sql_type = BigInt)]
    id: i64,
}

#[derive(QueryableByName)]
struct ResourceId {
    #[diesel(sql_type = BigInt)]
    id: i64,
}
