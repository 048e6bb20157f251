//! loom-exec: out-of-process script execution (C4, §4.4) and the Consumer
//! that turns the resulting files into catalog `Resource` rows (C6, §4.6).
//!
//! Generalised from `chem_adapters`'s in-process `TypedStep` execution to
//! scripts run as child processes under `tokio::process::Command`, per the
//! grounding notes in `executor.rs`/`consumer.rs`.

pub mod consumer;
pub mod error;
pub mod executor;

pub use consumer::run_consumer_pool;
pub use error::ExecError;
pub use executor::Executor;
