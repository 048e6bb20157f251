//! Storage traits (C1, C2): `BlobStore` and `Catalog`, plus the shared
//! `StoreError` and `RowCursor` lazy-sequence type (§9 "Lazy sequences over
//! channels").

mod blob;
mod catalog;
mod cursor;
mod error;

pub use blob::{BlobStore, InMemoryBlobStore};
pub use catalog::Catalog;
pub use cursor::RowCursor;
pub use error::StoreError;
