//! Userspace final-close detection (§4.5 Design decision, DESIGN.md Open
//! Question 1).
//!
//! The authoritative signal that a file is done being written is "the
//! owning child process exited" (already observed by `loom-exec::executor`,
//! §4.4 step 4). `reconcile` walks `task_<id>/` once after that signal and
//! emits one `FileEvent` per entry not already in `seen`, keyed by
//! `(relative path, size, mtime)` so a reconcile pass is idempotent if ever
//! called twice for the same task. `notify` events observed while the child
//! is still running are not required for correctness — they only let a
//! caller start reading a file's bytes eagerly, as an optimisation, which
//! this implementation does not need to exploit to satisfy the "exactly
//! once, before the barrier returns" contract.

use std::collections::HashSet;
use std::io;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;

use notify::{RecommendedWatcher, RecursiveMode, Watcher as _};

use crate::event::FileEvent;

type SeenKey = (String, u64, i64);

fn mtime_nanos(meta: &std::fs::Metadata) -> i64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(SystemTime::UNIX_EPOCH).ok())
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}

/// Watches the mount root for informational purposes and performs the
/// authoritative post-exit reconciliation pass.
pub struct CaptureWatcher {
    // Kept alive only to keep the OS-level watch registered; its events are
    // logged, not relied on for correctness.
    _inner: Option<RecommendedWatcher>,
    seen: Mutex<HashSet<SeenKey>>,
}

impl CaptureWatcher {
    /// Starts watching `root` recursively. A failure to install the watcher
    /// is logged and otherwise ignored: reconciliation alone is sufficient
    /// for correctness, so a missing eager-read optimisation is not fatal.
    pub fn spawn(root: &Path) -> Self {
        let watcher = notify::recommended_watcher(|res: notify::Result<notify::Event>| match res {
            Ok(event) => log::debug!("capture fs activity: {event:?}"),
            Err(e) => log::debug!("capture fs watch error: {e}"),
        })
        .and_then(|mut w| {
            w.watch(root, RecursiveMode::Recursive)?;
            Ok(w)
        });

        let inner = match watcher {
            Ok(w) => Some(w),
            Err(e) => {
                log::warn!("could not install capture fs watcher on {}: {e}", root.display());
                None
            }
        };

        Self { _inner: inner, seen: Mutex::new(HashSet::new()) }
    }

    /// Walks `<mount>/task_<id>/` and returns one `FileEvent` per entry not
    /// already reconciled, recording each emitted entry so a repeat call is
    /// a no-op (§4.5 "exactly once per file").
    pub fn reconcile(&self, root: &Path, task_id: i64) -> io::Result<Vec<FileEvent>> {
        let task_dir = root.join(format!("task_{task_id}"));
        if !task_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut events = Vec::new();
        let mut seen = self.seen.lock().expect("capture watcher seen-set mutex poisoned");

        for entry in walk_files(&task_dir)? {
            let meta = entry.metadata()?;
            let relative = entry.strip_prefix(root).unwrap_or(&entry).to_string_lossy().replace('\\', "/");
            let key: SeenKey = (relative.clone(), meta.len(), mtime_nanos(&meta));
            if seen.contains(&key) {
                continue;
            }
            let bytes = std::fs::read(&entry)?;
            seen.insert(key);
            events.push(FileEvent { task_id, relative_path: relative, bytes });
        }
        Ok(events)
    }
}

fn walk_files(dir: &Path) -> io::Result<Vec<std::path::PathBuf>> {
    let mut out = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        for entry in std::fs::read_dir(&current)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else {
                out.push(path);
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconcile_emits_each_file_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let task_dir = dir.path().join("task_1");
        std::fs::create_dir_all(&task_dir).unwrap();
        std::fs::write(task_dir.join("molecule"), b"hello").unwrap();

        let watcher = CaptureWatcher::spawn(dir.path());
        let first = watcher.reconcile(dir.path(), 1).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].relative_path, "task_1/molecule");
        assert_eq!(first[0].bytes, b"hello");

        let second = watcher.reconcile(dir.path(), 1).unwrap();
        assert!(second.is_empty());
    }

    #[test]
    fn reconcile_on_missing_task_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let watcher = CaptureWatcher::spawn(dir.path());
        assert!(watcher.reconcile(dir.path(), 99).unwrap().is_empty());
    }
}
