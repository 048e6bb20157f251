//! `loom status` (§6). Grounded on `original_source/cmd/status/status.go`,
//! down to the emoji-and-rule-of-equals banner (the teacher's own
//! `chem-cli` binary prints the same style of banner for its demo flow).

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use loom_core::store::Catalog;
use loom_sqlite::pool::PoolProvider;
use loom_sqlite::{build_pool, SqliteCatalog, StoreConfig};

pub fn execute(db: &Path) -> Result<()> {
    let config = StoreConfig::new(db);
    let pool = build_pool(&config)?;
    let catalog = Arc::new(SqliteCatalog::new(PoolProvider { pool }));

    let steps = catalog.all_steps()?;
    let mut total_tasks = 0i64;
    let mut unprocessed_tasks = 0i64;
    for step in &steps {
        total_tasks += catalog.count_tasks_for_step(step.id)?;
        unprocessed_tasks += catalog.count_unprocessed_tasks_for_step(step.id)?;
    }
    let processed_tasks = total_tasks - unprocessed_tasks;
    let resources = catalog.count_resources()?;

    println!("\n📊 Pipeline Status");
    println!("==================\n");
    println!("Steps:          {} total", steps.len());
    println!("Tasks:          {total_tasks} total, {processed_tasks} processed, {unprocessed_tasks} remaining");
    println!("Resources:      {resources} total");
    println!("Complete:       {}", unprocessed_tasks == 0);
    println!();
    Ok(())
}
