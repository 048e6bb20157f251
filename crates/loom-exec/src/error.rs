//! Execution-layer errors (§4.4, §4.6), kept distinct from
//! `loom_core::StoreError` so a catalog failure and a script failure are
//! never confused at the call site.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("store: {0}")]
    Store(#[from] loom_core::StoreError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("script exited with status {0}")]
    ScriptFailed(String),

    #[error("missing dependency column value: {0}")]
    MissingDependency(String),

    #[error("missing expected output file: {0}")]
    MissingOutput(String),
}
