use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("store: {0}")]
    Store(#[from] loom_core::StoreError),

    #[error("manifest: {0}")]
    Manifest(#[from] loom_core::error::CoreError),

    #[error("manifest references step '{0}' not found in the catalog")]
    MissingStep(String),

    #[error("manifest references column '{0}' on resource '{1}' not found in the catalog")]
    MissingColumn(String, String),

    #[error("no resources were seeded")]
    NoResourcesSeeded,
}
