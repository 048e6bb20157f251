//! Shared error type for the storage-agnostic core.
//!
//! Lower layers (`loom-sqlite`, `loom-exec`, `loom-driver`) define their own
//! `thiserror` enums and wrap this one with `#[from]` rather than stringify
//! it, mirroring `chem_core::errors::CoreEngineError`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("step '{name}' references unknown input step '{input}'")]
    UnknownStepInput { name: String, input: String },

    #[error("column '{name}' references unknown dependency column '{dependency}'")]
    UnknownColumnDependency { name: String, dependency: String },

    #[error("malformed manifest: {0}")]
    InvalidManifest(String),

    #[error("internal: {0}")]
    Internal(String),
}
