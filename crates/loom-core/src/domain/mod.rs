//! Storage-agnostic data model (§3): the six catalog entities plus the
//! identifiers they're keyed by. These are plain structs with no Diesel
//! dependency — `loom-sqlite` maps them onto table rows; `loom-core` only
//! needs them to state the `Catalog`/`BlobStore` trait contracts and to let
//! `loom-driver`/`loom-exec` talk about tasks and resources without
//! depending on a storage backend.

mod step;
mod column;
mod resource;
mod task;
mod column_value;
mod column_task;

pub use column::{Column, NewColumn};
pub use column_task::ColumnTask;
pub use column_value::ColumnValue;
pub use resource::Resource;
pub use step::{NewStep, Step};
pub use task::Task;

/// Row id newtype shared by every entity; all catalog primary keys are
/// 64-bit auto-increment integers (`spec.md` never calls for UUIDs in the
/// catalog — those are reserved, in the teacher's idiom, for flow/run
/// correlation ids elsewhere).
pub type RowId = i64;
