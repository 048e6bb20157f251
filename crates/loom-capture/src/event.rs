//! The unit the Capture FS hands to the Consumer (§4.5, §4.6): a logical
//! path plus a reader over the file's final bytes. The reader is a plain
//! `Vec<u8>` rather than an open `File` handle — by the time a `FileEvent`
//! is constructed the owning task has already exited and the file is
//! closed, so there is nothing left to hold a handle open for, and handing
//! the Consumer already-read bytes keeps it from needing its own I/O error
//! handling path.

use std::path::PathBuf;

use loom_core::domain::RowId;

/// One fully-written file under `<mount>/task_<id>/`.
#[derive(Debug, Clone)]
pub struct FileEvent {
    /// The task whose `task_<id>/` directory this file was written under.
    pub task_id: RowId,
    /// Path relative to the mount root, e.g. `task_42/molecule_raw`.
    pub relative_path: String,
    pub bytes: Vec<u8>,
}

impl FileEvent {
    /// Splits `<resource_name>[_<suffix>]` out of the filename component
    /// (§4.6 step 1): the resource name is everything before the first `_`,
    /// the rest is operator-chosen disambiguation and is discarded.
    pub fn resource_name(&self) -> &str {
        let filename = self.relative_path.rsplit('/').next().unwrap_or(&self.relative_path);
        filename.split('_').next().unwrap_or(filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_name_strips_disambiguating_suffix() {
        let ev = FileEvent { task_id: 1, relative_path: "task_1/molecule_variant2".into(), bytes: vec![] };
        assert_eq!(ev.resource_name(), "molecule");
    }

    #[test]
    fn resource_name_with_no_suffix_is_unchanged() {
        let ev = FileEvent { task_id: 1, relative_path: "task_1/molecule".into(), bytes: vec![] };
        assert_eq!(ev.resource_name(), "molecule");
    }
}
