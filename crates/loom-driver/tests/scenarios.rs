//! End-to-end behaviour over a real SQLite catalog/blob store and the
//! Capture FS consumer pipeline: one test per externally observable
//! contract in `spec.md` §8 not already covered by `run_fixed_point.rs`
//! (minimal seed, idempotent re-run, step version bump, a column with a
//! dependency, and a failing script).

use std::sync::Arc;

use tokio::sync::mpsc;

use loom_capture::{CaptureMount, CaptureWatcher, CommitBarrier};
use loom_core::domain::{NewColumn, NewStep};
use loom_core::manifest::Manifest;
use loom_core::store::{BlobStore, Catalog};
use loom_driver::PipelineDriver;
use loom_exec::{run_consumer_pool, Executor};
use loom_sqlite::pool::PoolProvider;
use loom_sqlite::{build_pool, SqliteBlobStore, SqliteCatalog, StoreConfig};

struct Harness {
    catalog: Arc<SqliteCatalog<PoolProvider>>,
    blobs: Arc<SqliteBlobStore<PoolProvider>>,
    driver: PipelineDriver<SqliteCatalog<PoolProvider>, SqliteBlobStore<PoolProvider>>,
    consumer: tokio::task::JoinHandle<()>,
}

fn seed_step(name: &str, script: &str) -> NewStep {
    NewStep { name: name.into(), script: script.into(), parallel: None, inputs: vec![] }
}

fn dependent_step(name: &str, script: &str, input: &str) -> NewStep {
    NewStep { name: name.into(), script: script.into(), parallel: None, inputs: vec![input.into()] }
}

fn build() -> Harness {
    let root = tempfile::tempdir().unwrap();
    // Leak the tempdir so the SQLite file and objects directory outlive this
    // function; each test owns exactly one of these and runs to completion
    // before the process exits.
    let root = Box::leak(Box::new(root));
    let config = StoreConfig::new(root.path());
    let pool = build_pool(&config).unwrap();

    let catalog = Arc::new(SqliteCatalog::new(PoolProvider { pool: pool.clone() }));
    let blobs = Arc::new(SqliteBlobStore::open(PoolProvider { pool }, config.objects_root()).unwrap());

    let mount = Arc::new(CaptureMount::new().unwrap());
    let watcher = Arc::new(CaptureWatcher::spawn(mount.root()));
    let barrier = Arc::new(CommitBarrier::new());
    let (events_tx, events_rx) = mpsc::channel(64);

    let consumer = tokio::spawn(run_consumer_pool(catalog.clone(), blobs.clone(), barrier.clone(), events_rx, 2));
    let executor = Arc::new(Executor::new(catalog.clone(), blobs.clone(), mount, watcher, events_tx, barrier.clone(),
                                          4));
    let driver = PipelineDriver::new(catalog.clone(), executor, barrier, 4);

    Harness { catalog, blobs, driver, consumer }
}

#[tokio::test]
async fn minimal_seed_produces_one_processed_task_and_one_resource() {
    let h = build();
    let manifest = Manifest { steps: vec![seed_step("seed", "printf hello > \"$OUTPUT_DIR/greeting_x\"")],
                              columns: vec![] };

    h.driver.run(&manifest, &[], &[]).await.expect("pipeline run");
    drop(h.driver);
    h.consumer.await.unwrap();

    assert_eq!(h.catalog.count_resources().unwrap(), 1);
    let step = h.catalog.step_by_name("seed").unwrap().expect("seed step registered");
    assert_eq!(h.catalog.count_tasks_for_step(step.id).unwrap(), 1);
    assert_eq!(h.catalog.count_unprocessed_tasks_for_step(step.id).unwrap(), 0);

    let greeting = h.catalog.resources_by_name("greeting").unwrap().next().unwrap().unwrap();
    assert_eq!(h.blobs.get(&greeting.object_hash).unwrap(), b"hello");
    assert!(greeting.created_by_task_id.is_some());
}

#[tokio::test]
async fn rerunning_an_unchanged_manifest_creates_nothing_new() {
    let h = build();
    let manifest = Manifest { steps: vec![seed_step("seed", "printf hello > \"$OUTPUT_DIR/greeting_x\""),
                                          dependent_step("upper",
                                                        "tr a-z A-Z < \"$INPUT_FILE\" > \"$OUTPUT_DIR/upper_y\"",
                                                        "seed")],
                              columns: vec![] };

    h.driver.run(&manifest, &[], &[]).await.expect("first run");
    let resources_after_first = h.catalog.count_resources().unwrap();
    let seed = h.catalog.step_by_name("seed").unwrap().unwrap();
    let upper = h.catalog.step_by_name("upper").unwrap().unwrap();
    let tasks_after_first = h.catalog.count_tasks_for_step(seed.id).unwrap() + h.catalog
                                                                                  .count_tasks_for_step(upper.id)
                                                                                  .unwrap();

    h.driver.run(&manifest, &[], &[]).await.expect("second run");
    drop(h.driver);
    h.consumer.await.unwrap();

    assert_eq!(h.catalog.count_resources().unwrap(), resources_after_first);
    let tasks_after_second = h.catalog.count_tasks_for_step(seed.id).unwrap() + h.catalog
                                                                                   .count_tasks_for_step(upper.id)
                                                                                   .unwrap();
    assert_eq!(tasks_after_second, tasks_after_first);
}

#[tokio::test]
async fn changing_a_steps_script_bumps_its_version_and_schedules_a_new_task() {
    let h = build();
    let manifest_v1 =
        Manifest { steps: vec![seed_step("seed", "printf hello > \"$OUTPUT_DIR/greeting_x\""),
                               dependent_step("upper", "tr a-z A-Z < \"$INPUT_FILE\" > \"$OUTPUT_DIR/upper_y\"",
                                             "seed")],
                   columns: vec![] };
    h.driver.run(&manifest_v1, &[], &[]).await.expect("first run");
    let resources_after_v1 = h.catalog.count_resources().unwrap();
    let upper_v1 = h.catalog.step_by_name("upper").unwrap().unwrap();
    assert_eq!(upper_v1.version, 1);

    let manifest_v2 = Manifest {
        steps: vec![seed_step("seed", "printf hello > \"$OUTPUT_DIR/greeting_x\""),
                   dependent_step("upper",
                                 "tr a-z A-Z < \"$INPUT_FILE\" > \"$OUTPUT_DIR/upper_y\"; printf '!' >> \
                                  \"$OUTPUT_DIR/upper_y\"",
                                 "seed")],
        columns: vec![],
    };
    h.driver.run(&manifest_v2, &[], &[]).await.expect("second run");
    drop(h.driver);
    h.consumer.await.unwrap();

    let upper_v2 = h.catalog.step_by_name("upper").unwrap().unwrap();
    assert_eq!(upper_v2.version, 2);
    assert_ne!(upper_v1.id, upper_v2.id);
    // The v2 script appends a byte the v1 script never wrote, so its output
    // differs from v1's and a second `upper` resource is produced.
    assert_eq!(h.catalog.count_resources().unwrap(), resources_after_v1 + 1);
    assert_eq!(h.catalog.count_unprocessed_tasks_for_step(upper_v2.id).unwrap(), 0);
}

#[tokio::test]
async fn a_column_with_a_satisfied_dependency_schedules_nothing_twice() {
    let h = build();
    let manifest = Manifest {
        steps: vec![seed_step("seed", "printf hello > \"$OUTPUT_DIR/greeting_x\"")],
        columns: vec![
            NewColumn { name: "len".into(), resource_name: "greeting".into(), script: "wc -c < \"$INPUT_DIR/data\" \
                                                                                         > \"$OUTPUT_DIR/len\""
                            .into(),
                       parallel: None,
                       dependencies: vec![] },
            NewColumn { name: "doubled".into(),
                       resource_name: "greeting".into(),
                       script: "cat \"$INPUT_DIR/len\" \"$INPUT_DIR/len\" > \"$OUTPUT_DIR/doubled\"".into(),
                       parallel: None,
                       dependencies: vec!["len".into()] },
        ],
    };

    h.driver.run(&manifest, &[], &[]).await.expect("pipeline run");
    drop(h.driver);
    h.consumer.await.unwrap();

    let greeting = h.catalog.resources_by_name("greeting").unwrap().next().unwrap().unwrap();
    let len_column = h.catalog.column_by_name("len", "greeting").unwrap().expect("len column registered");
    let doubled_column = h.catalog.column_by_name("doubled", "greeting").unwrap().expect("doubled column registered");

    assert!(h.catalog.column_value(len_column.id, greeting.id).unwrap().is_some());
    assert!(h.catalog.column_value(doubled_column.id, greeting.id).unwrap().is_some());

    // Re-scheduling after both values already exist should find nothing new.
    assert_eq!(h.catalog.schedule_column_tasks_for_column(len_column.id).unwrap(), 0);
    assert_eq!(h.catalog.schedule_column_tasks_for_column(doubled_column.id).unwrap(), 0);
}

#[tokio::test]
async fn a_failing_step_produces_no_resource_and_blocks_its_dependents() {
    let h = build();
    let manifest = Manifest { steps: vec![seed_step("seed", "exit 1"),
                                          dependent_step("upper",
                                                        "tr a-z A-Z < \"$INPUT_FILE\" > \"$OUTPUT_DIR/upper_y\"",
                                                        "seed")],
                              columns: vec![] };

    // Seeding itself never fails this run call: a script failure is
    // recorded on the task, not surfaced as a fatal `DriverError` (§7).
    // With no resource ever produced, `NoResourcesSeeded` is the outcome.
    let result = h.driver.run(&manifest, &[], &[]).await;
    drop(h.driver);
    h.consumer.await.unwrap();

    assert!(result.is_err());
    assert_eq!(h.catalog.count_resources().unwrap(), 0);
    let upper = h.catalog.step_by_name("upper").unwrap().unwrap();
    assert_eq!(h.catalog.count_tasks_for_step(upper.id).unwrap(), 0);
}
