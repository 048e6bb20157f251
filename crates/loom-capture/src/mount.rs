//! Capture FS mountpoint (§4.5).
//!
//! No real FUSE binding backs this — `fuser` is absent from every
//! `Cargo.toml` in the retrieval pack, and mounting a real FUSE filesystem
//! needs privileged kernel support this engine cannot assume in arbitrary
//! CI/dev environments (see DESIGN.md Open Question 1). `CaptureMount`
//! stands in a real temporary directory instead; `watcher` layers the
//! required one-event-per-file semantics over it in userspace.

use std::io;
use std::path::{Path, PathBuf};

/// Owns the lifetime of the mountpoint directory. Dropping it removes the
/// directory tree, the userspace analogue of "unmount" (§4.5).
pub struct CaptureMount {
    dir: tempfile::TempDir,
}

impl CaptureMount {
    /// Creates a fresh, private mountpoint. Failure to mount is fatal at
    /// startup (§4.5) — callers should propagate this with `?` all the way
    /// to process exit.
    pub fn new() -> io::Result<Self> {
        let dir = tempfile::tempdir()?;
        Ok(Self { dir })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Creates `<mount>/task_<id>/` and returns its path (§4.4 step 2).
    pub fn task_dir(&self, task_id: i64) -> io::Result<PathBuf> {
        let path = self.dir.path().join(format!("task_{task_id}"));
        std::fs::create_dir_all(&path)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_dir_is_created_under_the_mount_root() {
        let mount = CaptureMount::new().unwrap();
        let dir = mount.task_dir(7).unwrap();
        assert!(dir.starts_with(mount.root()));
        assert!(dir.is_dir());
        assert_eq!(dir.file_name().unwrap(), "task_7");
    }
}
