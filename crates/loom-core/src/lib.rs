//! loom-core: storage-agnostic data model and contracts for the pipeline
//! engine.
//!
//! Purpose:
//! - Define the catalog's data model (`domain`) and the two storage traits
//!   every backend implements: `store::BlobStore` (C1) and `store::Catalog`
//!   (C2).
//! - Provide the cross-cutting utilities every other crate in the workspace
//!   shares: content hashing (`hash`), busy-retry policy (`retry`), the
//!   manifest shape (`manifest`), and the core error type (`error`).
//!
//! `loom-core` has no opinion on *how* a backend stores rows or bytes; see
//! `loom-sqlite` for the only implementation in this workspace.

pub mod domain;
pub mod error;
pub mod hash;
pub mod manifest;
pub mod retry;
pub mod store;

pub use domain::{Column, ColumnTask, ColumnValue, NewColumn, NewStep, Resource, RowId, Step, Task};
pub use error::CoreError;
pub use manifest::Manifest;
pub use retry::{retry_on_busy, retry_on_busy_async, RetryPolicy, Transient};
pub use store::{BlobStore, Catalog, InMemoryBlobStore, RowCursor, StoreError};
