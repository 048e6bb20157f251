//! Maps Diesel/r2d2 errors onto `loom_core::StoreError` (§9 "errors are
//! mapped, not stringified, at each crate boundary").

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use loom_core::StoreError;

/// Best-effort classification of "database is locked"-style failures. The
/// SQLite backend does not give Diesel a dedicated `DatabaseErrorKind` for
/// `SQLITE_BUSY`/`SQLITE_LOCKED`, so this falls back to matching on the
/// driver's own message text, the same way `chem_persistence::pg::is_retryable`
/// matched Postgres's transient messages.
pub fn map_diesel_err(err: DieselError) -> StoreError {
    match err {
        DieselError::NotFound => StoreError::RowNotFound(-1),
        DieselError::DatabaseError(DatabaseErrorKind::SerializationFailure, info) => {
            StoreError::Busy(info.message().to_string())
        }
        DieselError::DatabaseError(kind, info) => {
            let msg = info.message().to_lowercase();
            if msg.contains("database is locked") || msg.contains("database table is locked")
               || matches!(kind, DatabaseErrorKind::Unknown) && msg.contains("locked")
            {
                log::debug!("classifying diesel error as transient busy: {}", info.message());
                StoreError::Busy(info.message().to_string())
            } else {
                StoreError::Backend(format!("{kind:?}: {}", info.message()))
            }
        }
        other => StoreError::Backend(other.to_string()),
    }
}

pub fn map_pool_err(err: r2d2::Error) -> StoreError {
    StoreError::Busy(format!("pool exhausted: {err}"))
}

/// Local wrapper so a `conn.transaction(...)` closure can use `?` on both
/// `diesel::result::Error` and `StoreError` — Diesel requires the closure's
/// error type to impl `From<diesel::result::Error>`, and the orphan rule
/// forbids implementing that directly for `loom_core::StoreError` from this
/// crate.
pub struct TxError(pub StoreError);

impl From<DieselError> for TxError {
    fn from(err: DieselError) -> Self {
        TxError(map_diesel_err(err))
    }
}

impl From<StoreError> for TxError {
    fn from(err: StoreError) -> Self {
        TxError(err)
    }
}
