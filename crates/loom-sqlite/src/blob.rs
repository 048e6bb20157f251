//! `BlobStore` (C1): an append-only value log (`<db>/objects_db/log.bin`)
//! indexed by a SQLite table `blobs(hash, offset, length)` (§4.1). Grounded
//! on the spec's own "may be stored in an append-only value log" note and on
//! `chem_persistence`'s `workflow_step_artifacts` table, which performs the
//! same job of indexing content by hash, generalised from JSONB payloads to
//! raw bytes at an arbitrary file offset.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
#[cfg(unix)]
use std::os::unix::fs::FileExt;
use std::path::PathBuf;
use std::sync::Mutex;

use diesel::prelude::*;
use loom_core::store::BlobStore;
use loom_core::StoreError;

use crate::error::map_diesel_err;
use crate::pool::ConnectionProvider;
use crate::schema::blobs;

#[derive(Queryable)]
struct BlobRow {
    #[allow(dead_code)]
    hash: String,
    offset: i64,
    length: i64,
}

#[derive(Insertable)]
#[diesel(table_name = blobs)]
struct NewBlobRow<'a> {
    hash: &'a str,
    offset: i64,
    length: i64,
}

/// The log file handle is wrapped in a `Mutex` so concurrent `put`/`get`
/// calls serialise on the one thing SQLite's own locking can't help with:
/// the shared append offset.
pub struct SqliteBlobStore<P: ConnectionProvider> {
    provider: P,
    log: Mutex<File>,
    log_path: PathBuf,
}

impl<P: ConnectionProvider> SqliteBlobStore<P> {
    pub fn open(provider: P, objects_root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let objects_root = objects_root.into();
        std::fs::create_dir_all(&objects_root)?;
        let log_path = objects_root.join("log.bin");
        let log = OpenOptions::new().create(true).append(true).read(true).open(&log_path)?;
        Ok(Self { provider, log: Mutex::new(log), log_path })
    }

    fn append(&self, bytes: &[u8]) -> Result<(i64, i64), StoreError> {
        use std::io::{Seek, SeekFrom, Write};
        let mut log = self.log.lock().expect("blob log mutex poisoned");
        let offset = log.seek(SeekFrom::End(0))?;
        log.write_all(bytes)?;
        log.sync_data()?;
        Ok((offset as i64, bytes.len() as i64))
    }

    #[cfg(unix)]
    fn read_at(&self, offset: i64, length: i64) -> Result<Vec<u8>, StoreError> {
        let log = self.log.lock().expect("blob log mutex poisoned");
        let mut buf = vec![0u8; length as usize];
        log.read_exact_at(&mut buf, offset as u64)?;
        Ok(buf)
    }

    #[cfg(not(unix))]
    fn read_at(&self, offset: i64, length: i64) -> Result<Vec<u8>, StoreError> {
        use std::io::{Read, Seek, SeekFrom};
        let mut log = self.log.lock().expect("blob log mutex poisoned");
        log.seek(SeekFrom::Start(offset as u64))?;
        let mut buf = vec![0u8; length as usize];
        log.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn index_entry(&self, hash: &str) -> Result<Option<BlobRow>, StoreError> {
        let mut conn = self.provider.connection()?;
        blobs::table.find(hash).first(&mut conn).optional().map_err(map_diesel_err)
    }

    pub fn log_path(&self) -> &std::path::Path {
        &self.log_path
    }
}

impl<P: ConnectionProvider> BlobStore for SqliteBlobStore<P> {
    fn put(&self, hash: &str, bytes: &[u8]) -> Result<(), StoreError> {
        if self.exists(hash)? {
            return Ok(());
        }
        let (offset, length) = self.append(bytes)?;
        let mut conn = self.provider.connection()?;
        diesel::insert_into(blobs::table).values(&NewBlobRow { hash, offset, length })
                                          .execute(&mut conn)
                                          .map_err(map_diesel_err)?;
        Ok(())
    }

    fn put_batch(&self, items: &[(String, Vec<u8>)]) -> Result<(), StoreError> {
        let mut rows = Vec::with_capacity(items.len());
        for (hash, bytes) in items {
            if self.exists(hash)? {
                continue;
            }
            let (offset, length) = self.append(bytes)?;
            rows.push((hash.clone(), offset, length));
        }
        if rows.is_empty() {
            return Ok(());
        }
        let mut conn = self.provider.connection()?;
        conn.transaction::<_, diesel::result::Error, _>(|conn| {
                for (hash, offset, length) in &rows {
                    diesel::insert_into(blobs::table).values(&NewBlobRow { hash, offset: *offset, length: *length })
                                                      .execute(conn)?;
                }
                Ok(())
            })
            .map_err(map_diesel_err)
    }

    fn get(&self, hash: &str) -> Result<Vec<u8>, StoreError> {
        let entry = self.index_entry(hash)?.ok_or_else(|| StoreError::NotFound(hash.to_string()))?;
        self.read_at(entry.offset, entry.length)
    }

    fn get_batch(&self, hashes: &[String]) -> Result<HashMap<String, Vec<u8>>, StoreError> {
        let mut out = HashMap::with_capacity(hashes.len());
        for hash in hashes {
            out.insert(hash.clone(), self.get(hash)?);
        }
        Ok(out)
    }

    fn exists(&self, hash: &str) -> Result<bool, StoreError> {
        Ok(self.index_entry(hash)?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{build_pool, PoolProvider};
    use crate::StoreConfig;

    fn open_store(dir: &std::path::Path) -> SqliteBlobStore<PoolProvider> {
        let config = StoreConfig::new(dir);
        let pool = build_pool(&config).unwrap();
        SqliteBlobStore::open(PoolProvider { pool }, config.objects_root()).unwrap()
    }

    #[test]
    fn round_trip_and_dedup() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path());
        store.put("h1", b"hello world").unwrap();
        store.put("h1", b"ignored on second write").unwrap();
        assert_eq!(store.get("h1").unwrap(), b"hello world");

        let log_len = std::fs::metadata(store.log_path()).unwrap().len();
        assert_eq!(log_len, b"hello world".len() as u64);
    }

    #[test]
    fn missing_hash_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path());
        assert!(matches!(store.get("missing"), Err(StoreError::NotFound(_))));
    }
}
