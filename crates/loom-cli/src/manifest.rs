//! Reads a manifest TOML file into the opaque structure the driver consumes
//! (§6 "Manifest (supplied as an opaque pre-parsed structure)").
//!
//! Grounded on `vhqtvn-revela`'s `toml` dependency; `NewStep`/`NewColumn`
//! already derive `serde::Deserialize` in `loom-core`, so this is a thin
//! read-then-parse, the same shape as `original_source/manifest/manifest.go`'s
//! `toml.Unmarshal` call.

use std::path::Path;

use anyhow::{Context, Result};
use loom_core::manifest::Manifest;

pub fn load(path: &Path) -> Result<Manifest> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading manifest {}", path.display()))?;
    let manifest: Manifest =
        toml::from_str(&text).with_context(|| format!("parsing manifest {}", path.display()))?;
    manifest.validate().with_context(|| format!("validating manifest {}", path.display()))?;
    Ok(manifest)
}
