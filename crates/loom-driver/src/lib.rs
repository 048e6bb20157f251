//! loom-driver: the pipeline driver (C7) that applies a manifest to the
//! catalog and runs steps/columns to a fixed point (§4.7).

pub mod driver;
pub mod error;

pub use driver::PipelineDriver;
pub use error::DriverError;
