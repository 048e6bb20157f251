//! `loom run` (§6, §4.7). Grounded on `original_source/cmd/run/run.go`:
//! check disk space, open the store, build the executor/consumer/driver
//! triad, load the manifest, drive to a fixed point. Signal handling has
//! no counterpart in `original_source` (it installs none); grounded
//! directly on `tokio::signal` per §9's prescribed shutdown order.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tokio::sync::mpsc;

use loom_capture::{CaptureMount, CaptureWatcher, CommitBarrier};
use loom_core::store::Catalog;
use loom_driver::PipelineDriver;
use loom_exec::{run_consumer_pool, Executor};
use loom_sqlite::pool::PoolProvider;
use loom_sqlite::{build_pool, SqliteBlobStore, SqliteCatalog, StoreConfig};

use crate::manifest;

/// Logs a warning rather than failing the run: a low-disk-space condition
/// is worth flagging before the pipeline starts writing, but disk exhaustion
/// will surface as an I/O error at the point of failure either way.
const LOW_DISK_SPACE_BYTES: u64 = 100 * 1024 * 1024;

fn check_disk_space(root: &Path) {
    std::fs::create_dir_all(root).ok();
    match fs2::available_space(root) {
        Ok(available) if available < LOW_DISK_SPACE_BYTES => {
            log::warn!("only {} bytes free at {}", available, root.display());
        }
        Ok(_) => {}
        Err(e) => log::warn!("could not check disk space at {}: {e}", root.display()),
    }
}

pub async fn execute(db: &Path, manifest_path: &Path, parallel: usize, step_filter: Vec<String>,
                      column_filter: Vec<String>)
                      -> Result<()> {
    check_disk_space(db);

    let manifest = manifest::load(manifest_path)?;
    log::info!("loaded {} step(s), {} column(s) from {}", manifest.steps.len(), manifest.columns.len(),
               manifest_path.display());

    let config = StoreConfig::new(db);
    let pool = build_pool(&config)?;
    let catalog = Arc::new(SqliteCatalog::new(PoolProvider { pool: pool.clone() }));
    let blobs = Arc::new(SqliteBlobStore::open(PoolProvider { pool: pool.clone() }, config.objects_root())?);

    let mount = Arc::new(CaptureMount::new()?);
    let watcher = Arc::new(CaptureWatcher::spawn(mount.root()));
    let barrier = Arc::new(CommitBarrier::new());
    let (events_tx, events_rx) = mpsc::channel(256);

    let consumer_workers = parallel.max(1);
    let consumer =
        tokio::spawn(run_consumer_pool(catalog.clone(), blobs.clone(), barrier.clone(), events_rx, consumer_workers));

    let executor =
        Arc::new(Executor::new(catalog.clone(), blobs.clone(), mount, watcher, events_tx, barrier.clone(), parallel));
    let driver = PipelineDriver::new(catalog.clone(), executor.clone(), barrier, parallel);

    let start = Instant::now();

    tokio::select! {
        result = driver.run(&manifest, &step_filter, &column_filter) => {
            // Drop the driver (and its last `Executor` handle) before
            // awaiting the consumer so its event sender closes and the
            // drain loop below ends.
            drop(driver);
            consumer.await.ok();
            result?;
            println!("✅ pipeline complete in {:.2?}", start.elapsed());
            println!("   resources: {}", catalog.count_resources()?);
        }
        _ = shutdown_signal() => {
            // §9 "Signal handling": kill in-flight children's process
            // groups rather than waiting on them, then drain and close.
            log::warn!("interrupted, shutting down");
            executor.kill_running_children();
            drop(driver);
            consumer.await.ok();
            std::process::exit(130);
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install sigterm handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
