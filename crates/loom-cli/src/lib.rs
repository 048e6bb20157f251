//! Command surface and command implementations for the `loom` binary,
//! exposed as a library so integration tests can drive `manifest::load` and
//! `commands::*` directly rather than spawning a child process.

pub mod cli;
pub mod commands;
pub mod manifest;
