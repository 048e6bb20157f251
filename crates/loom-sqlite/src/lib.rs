//! loom-sqlite: the only storage backend in this workspace. Implements
//! `loom_core::{Catalog, BlobStore}` over a single SQLite database file plus
//! an append-only value log, following
//! `chem_persistence::pg::{PgPool, ConnectionProvider, PoolProvider}` with
//! the backend swapped from Postgres to SQLite (§4.1, §4.2).

pub mod blob;
pub mod catalog;
pub mod config;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod rows;
pub mod schema;

pub use blob::SqliteBlobStore;
pub use catalog::SqliteCatalog;
pub use config::{init_dotenv, StoreConfig};
pub use pool::{build_pool, ConnectionProvider, PoolProvider, SqlitePool};
