//! Round-trips a real manifest file through `manifest::load` (catching TOML
//! key-naming regressions like a `resource_name` field expecting a literal
//! `resource_name` key instead of the documented `resource` key) and
//! exercises `export --csv` against a column with more than one version.

use std::io::Write;

use loom_core::domain::NewColumn;
use loom_core::domain::NewStep;
use loom_core::store::{BlobStore, Catalog};
use loom_sqlite::pool::PoolProvider;
use loom_sqlite::{build_pool, SqliteBlobStore, SqliteCatalog, StoreConfig};

use loom_cli::cli::ExportArgs;
use loom_cli::{commands, manifest};

#[test]
fn manifest_load_parses_the_resource_key_and_applies_field_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let manifest_path = dir.path().join("manifest.toml");
    let mut file = std::fs::File::create(&manifest_path).unwrap();
    write!(file,
           r#"
[[step]]
name = "seed"
script = "printf hello > \"$OUTPUT_DIR/greeting_x\""

[[step]]
name = "upper"
script = "tr a-z A-Z < \"$INPUT_FILE\" > \"$OUTPUT_DIR/upper_y\""
inputs = ["seed"]

[[column]]
name = "len"
resource = "greeting"
script = "wc -c < \"$INPUT_DIR/data\" > \"$OUTPUT_DIR/len\""
"#)
        .unwrap();
    drop(file);

    let parsed = manifest::load(&manifest_path).expect("manifest.toml should parse");

    assert_eq!(parsed.steps.len(), 2);
    assert!(parsed.steps[0].inputs.is_empty());
    assert_eq!(parsed.steps[1].inputs, vec!["seed".to_string()]);

    assert_eq!(parsed.columns.len(), 1);
    assert_eq!(parsed.columns[0].resource_name, "greeting");
    assert!(parsed.columns[0].dependencies.is_empty());
}

#[test]
fn csv_export_emits_one_header_column_per_logical_column_at_its_latest_version() {
    let root = tempfile::tempdir().unwrap();
    let config = StoreConfig::new(root.path());
    let pool = build_pool(&config).unwrap();

    let catalog = SqliteCatalog::new(PoolProvider { pool: pool.clone() });
    let blobs = SqliteBlobStore::open(PoolProvider { pool }, config.objects_root()).unwrap();

    let seed = catalog.create_step(&NewStep { name: "seed".into(),
                                              script: "true".into(),
                                              parallel: None,
                                              inputs: vec![] })
                       .unwrap();
    let seed_task = catalog.ensure_seed_task(seed.id).unwrap();

    let greeting_hash = loom_core::hash::sha256_hex(b"hello");
    blobs.put(&greeting_hash, b"hello").unwrap();
    let resource = catalog.create_resource_with_task("greeting", &greeting_hash, Some(seed_task.id)).unwrap();

    catalog.create_column(&NewColumn { name: "len".into(),
                                       resource_name: "greeting".into(),
                                       script: "wc -c".into(),
                                       parallel: None,
                                       dependencies: vec![] })
           .unwrap();
    let len_v2 = catalog.create_column(&NewColumn { name: "len".into(),
                                                    resource_name: "greeting".into(),
                                                    script: "wc -c -m".into(),
                                                    parallel: None,
                                                    dependencies: vec![] })
                         .unwrap();

    let value_hash = loom_core::hash::sha256_hex(b"5");
    blobs.put(&value_hash, b"5").unwrap();
    catalog.put_column_value(len_v2.id, resource.id, &value_hash).unwrap();

    let csv_path = root.path().join("out.csv");
    let args = ExportArgs { name: None, hash: None, tar: None, compressed: true,
                           csv: Some(csv_path.to_string_lossy().into_owned()) };
    commands::export::execute(root.path(), &args).expect("csv export");

    let contents = std::fs::read_to_string(&csv_path).unwrap();
    let mut lines = contents.lines();
    let header = lines.next().unwrap();
    let header_fields: Vec<&str> = header.split(',').collect();
    assert_eq!(header_fields, vec!["id", "name", "object_hash", "created_at", "len"]);

    let row = lines.next().unwrap();
    let row_fields: Vec<&str> = row.split(',').collect();
    assert_eq!(row_fields[4], "5");
}
