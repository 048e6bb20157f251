//! Connection/pool configuration, loaded from an explicit `--db` root plus
//! optional environment overrides.

use std::env;
use std::path::{Path, PathBuf};

use dotenvy::dotenv;
use once_cell::sync::Lazy;

static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenv();
});

pub fn init_dotenv() {
    Lazy::force(&DOTENV_LOADED);
}

/// Resolves the store's on-disk layout from a single root directory: the
/// catalog lives at `<root>/sqlite/db`, blobs at `<root>/objects_db/` (§6,
/// §4.1/§4.2).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub root: PathBuf,
    pub max_connections: u32,
}

impl StoreConfig {
    /// `max_connections` defaults to the host's available parallelism
    /// (falling back to 4), mirroring the executor's own default degree of
    /// parallelism (§4.4) so the pool is never the bottleneck.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        init_dotenv();
        let default_parallelism =
            std::thread::available_parallelism().map(|n| n.get() as u32).unwrap_or(4);
        let max_connections = env::var("LOOM_DB_MAX_CONNECTIONS").ok()
                                                                  .and_then(|v| v.parse().ok())
                                                                  .unwrap_or(default_parallelism);
        Self { root: root.into(), max_connections }
    }

    pub fn sqlite_path(&self) -> PathBuf {
        self.root.join("sqlite").join("db")
    }

    pub fn objects_root(&self) -> PathBuf {
        self.root.join("objects_db")
    }

    pub fn database_url(&self) -> String {
        self.sqlite_path().to_string_lossy().into_owned()
    }
}

pub fn ensure_parent_dirs(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}
