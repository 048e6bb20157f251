//! Pipeline driver (C7, §4.7): applies a manifest against the catalog, seeds
//! the pipeline if it is empty, then runs steps and columns to a fixed
//! point.
//!
//! Grounded on `original_source/pipeline/pipeline.go` for the seed/step/
//! column ordering, and on `chem_core::engine::core`'s `run_to_completion`
//! loop idiom (`loop { match next() { ... } }`) for the fixed-point shape,
//! generalised here from one flow to a repeated pass over every manifest
//! step then every manifest column until a pass schedules nothing (§9 Open
//! Question 2).

use std::sync::Arc;

use tokio::sync::Semaphore;

use loom_capture::CommitBarrier;
use loom_core::domain::{Column, Step};
use loom_core::manifest::Manifest;
use loom_core::store::{BlobStore, Catalog};

use loom_exec::executor::degree_of_parallelism;
use loom_exec::Executor;

use crate::error::DriverError;

pub struct PipelineDriver<C: Catalog, B: BlobStore> {
    catalog: Arc<C>,
    executor: Arc<Executor<C, B>>,
    barrier: Arc<CommitBarrier>,
    global_parallelism: usize,
}

impl<C: Catalog, B: BlobStore> PipelineDriver<C, B> {
    pub fn new(catalog: Arc<C>, executor: Arc<Executor<C, B>>, barrier: Arc<CommitBarrier>,
               global_parallelism: usize)
               -> Self {
        Self { catalog, executor, barrier, global_parallelism: global_parallelism.max(1) }
    }

    /// Reconciles `manifest` against the catalog (creating or version-
    /// bumping every declared step/column), seeds the pipeline if no
    /// resource has ever been created, then drives steps and columns to a
    /// fixed point. Returns once a full pass executes zero tasks.
    ///
    /// `step_filter`/`column_filter` restrict which *declared* steps/columns
    /// the fixed-point loop actually executes (§6 `run --step`/`--column`);
    /// every declared step/column is still reconciled into the catalog
    /// regardless, so a filtered-out predecessor's row still exists for a
    /// later unfiltered run to pick up. An empty filter means "run
    /// everything."
    pub async fn run(&self, manifest: &Manifest, step_filter: &[String], column_filter: &[String])
                      -> Result<(), DriverError> {
        manifest.validate()?;

        let mut steps = Vec::with_capacity(manifest.steps.len());
        for new_step in &manifest.steps {
            steps.push(self.catalog.create_step(new_step)?);
        }
        let mut columns = Vec::with_capacity(manifest.columns.len());
        for new_column in &manifest.columns {
            columns.push(self.catalog.create_column(new_column)?);
        }

        if self.catalog.count_resources()? == 0 {
            self.seed(&steps).await?;
            if self.catalog.count_resources()? == 0 {
                return Err(DriverError::NoResourcesSeeded);
            }
        }

        let run_steps: Vec<&Step> =
            steps.iter().filter(|s| step_filter.is_empty() || step_filter.iter().any(|n| n == &s.name)).collect();
        let run_columns: Vec<&Column> = columns.iter()
                                                .filter(|c| {
                                                    column_filter.is_empty()
                                                    || column_filter.iter().any(|n| n == &c.name)
                                                })
                                                .collect();

        loop {
            let mut scheduled = 0usize;
            for step in &run_steps {
                scheduled += self.execute_step(step).await?;
            }
            for column in &run_columns {
                scheduled += self.execute_column(column).await?;
            }
            if scheduled == 0 {
                return Ok(());
            }
        }
    }

    async fn seed(&self, steps: &[Step]) -> Result<(), DriverError> {
        for step in steps.iter().filter(|s| s.is_seed()) {
            self.execute_step(step).await?;
        }
        Ok(())
    }

    /// Runs every outstanding `Task` for `step` (§4.7 `ExecuteStep`), then
    /// blocks until every file the executor handed the Consumer for this
    /// step is actually visible in the catalog (`wait_for_fs_writes` +
    /// `wait_for_resource_commit`) — without this, a later step in the same
    /// pass could run its own scheduling query before its predecessor's
    /// resources exist, and the fixed-point loop could conclude there is no
    /// more work while a commit is still in flight.
    /// Returns the number of tasks executed, so the fixed-point loop above
    /// knows whether this pass made progress.
    async fn execute_step(&self, step: &Step) -> Result<usize, DriverError> {
        if step.is_seed() {
            let task = self.catalog.ensure_seed_task(step.id)?;
            if task.processed {
                return Ok(0);
            }
            match self.executor.execute_step_task(step, task.id, None).await {
                Ok(_emitted) => self.catalog.update_task_status(task.id, None)?,
                Err(e) => self.catalog.update_task_status(task.id, Some(&e.to_string()))?,
            }
            self.barrier.subscriber().wait_for_resource_commit().await;
            return Ok(1);
        }

        self.catalog.schedule_tasks_for_step(step.id)?;
        self.catalog.force_save_wal()?;

        let tasks = self.catalog
                        .unprocessed_tasks(step.id)?
                        .collect::<Result<Vec<_>, _>>()?;
        if tasks.is_empty() {
            return Ok(0);
        }

        let permits = Arc::new(Semaphore::new(degree_of_parallelism(self.global_parallelism, step.parallel)));
        let mut handles = Vec::with_capacity(tasks.len());
        for task in tasks {
            let permits = permits.clone();
            let step = step.clone();
            let executor = self.executor.clone();
            let catalog = self.catalog.clone();
            handles.push(tokio::spawn(async move {
                let _permit = permits.acquire_owned().await.expect("step semaphore closed");
                match executor.execute_step_task(&step, task.id, task.input_resource_id).await {
                    Ok(_emitted) => catalog.update_task_status(task.id, None),
                    Err(e) => catalog.update_task_status(task.id, Some(&e.to_string())),
                }
            }));
        }
        let n = handles.len();
        for handle in handles {
            handle.await.expect("step task panicked")?;
        }
        self.barrier.subscriber().wait_for_resource_commit().await;
        Ok(n)
    }

    /// Runs every outstanding `ColumnTask` for `column` (§4.7
    /// `ExecuteColumn`). No Capture FS/Consumer/commit-barrier interaction:
    /// column scripts write their result straight back through the
    /// executor, not through the mount (§4.4 column variant).
    async fn execute_column(&self, column: &Column) -> Result<usize, DriverError> {
        self.catalog.schedule_column_tasks_for_column(column.id)?;
        self.catalog.force_save_wal()?;

        let tasks = self.catalog
                        .unprocessed_column_tasks(column.id)?
                        .collect::<Result<Vec<_>, _>>()?;
        if tasks.is_empty() {
            return Ok(0);
        }

        let permits = Arc::new(Semaphore::new(degree_of_parallelism(self.global_parallelism, column.parallel)));
        let mut handles = Vec::with_capacity(tasks.len());
        for task in tasks {
            let permits = permits.clone();
            let column = column.clone();
            let executor = self.executor.clone();
            let catalog = self.catalog.clone();
            handles.push(tokio::spawn(async move {
                let _permit = permits.acquire_owned().await.expect("column semaphore closed");
                match executor.execute_column_task(&column, task.id, task.resource_id).await {
                    Ok(()) => catalog.update_column_task_status(task.id, None),
                    Err(e) => catalog.update_column_task_status(task.id, Some(&e.to_string())),
                }
            }));
        }
        let n = handles.len();
        for handle in handles {
            handle.await.expect("column task panicked")?;
        }
        Ok(n)
    }
}
