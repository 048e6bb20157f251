use thiserror::Error;

use crate::retry::Transient;

/// Storage-agnostic error returned by `BlobStore` and `Catalog`.
/// `loom-sqlite` maps Diesel/r2d2 errors onto this via `#[from]` at its own
/// boundary rather than leaking Diesel types into `loom-core`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no blob for hash {0}")]
    NotFound(String),

    #[error("row {0} not found")]
    RowNotFound(i64),

    #[error("store busy: {0}")]
    Busy(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("backend error: {0}")]
    Backend(String),
}

impl Transient for StoreError {
    fn is_transient(&self) -> bool {
        matches!(self, StoreError::Busy(_))
    }
}
