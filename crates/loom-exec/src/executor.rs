//! Per-task script execution (C4, §4.4).
//!
//! Grounded on `chem_adapters`'s steps for the "one step, one script" shape
//! and on `raiko-host::prover::proof::sgx::execute_sgx` for spawning and
//! waiting on a child process with `tokio::process::Command`, generalised
//! from a fixed SGX binary invocation to an arbitrary shell script with
//! stdout/stderr piped line-by-line into the `loom_exec::child` log target
//! rather than collected via `.output()`.

use std::collections::HashSet;
use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, Semaphore};

use loom_capture::{CaptureMount, CaptureWatcher, CommitBarrier, FileEvent};
use loom_core::domain::{Column, RowId, Step};
use loom_core::store::{BlobStore, Catalog};

use crate::error::ExecError;

/// Bounds concurrent script executions to `min(global, step.parallel)`
/// (§4.4 "Parallelism"). `global` is the process-wide cap shared across
/// every step/column; `local` is this step/column's own declared cap, if
/// any.
pub fn degree_of_parallelism(global: usize, local: Option<u32>) -> usize {
    match local {
        Some(n) => (n as usize).min(global).max(1),
        None => global.max(1),
    }
}

pub struct Executor<C: Catalog, B: BlobStore> {
    catalog: Arc<C>,
    blobs: Arc<B>,
    mount: Arc<CaptureMount>,
    watcher: Arc<CaptureWatcher>,
    events: mpsc::Sender<FileEvent>,
    barrier: Arc<CommitBarrier>,
    global_permits: Arc<Semaphore>,
    running_children: Arc<Mutex<HashSet<u32>>>,
}

impl<C: Catalog, B: BlobStore> Executor<C, B> {
    pub fn new(catalog: Arc<C>, blobs: Arc<B>, mount: Arc<CaptureMount>, watcher: Arc<CaptureWatcher>,
               events: mpsc::Sender<FileEvent>, barrier: Arc<CommitBarrier>, global_parallelism: usize)
               -> Self {
        Self { catalog,
               blobs,
               mount,
               watcher,
               events,
               barrier,
               global_permits: Arc::new(Semaphore::new(global_parallelism.max(1))),
               running_children: Arc::new(Mutex::new(HashSet::new())) }
    }

    /// Sends `SIGKILL` to every currently-running script's process group
    /// (§9 "Signal handling": in-flight children are not waited on, their
    /// whole group is killed). `run_script` puts each child in its own
    /// group via `process_group(0)` precisely so a caller can target it
    /// without also signalling itself.
    #[cfg(unix)]
    pub fn kill_running_children(&self) {
        let pids: Vec<u32> = self.running_children.lock().expect("child registry mutex poisoned").iter().copied().collect();
        for pid in pids {
            // SAFETY: killing a process group this executor itself created.
            unsafe {
                libc::kill(-(pid as i32), libc::SIGKILL);
            }
        }
    }

    #[cfg(not(unix))]
    pub fn kill_running_children(&self) {}

    /// Runs every script for `step` against `task_id`/`input_resource_id`
    /// (§4.4, steps 1-4), then reconciles the Capture FS and hands every
    /// resulting file off to the Consumer (§4.5, §4.6). Also notes the
    /// handoff count on the shared commit barrier, so a driver calling
    /// `wait_for_resource_commit` afterwards blocks until every one of
    /// these files is actually visible in the catalog, not just until
    /// *some* resource gets committed.
    pub async fn execute_step_task(&self, step: &Step, task_id: RowId, input_resource_id: Option<RowId>)
                                    -> Result<usize, ExecError> {
        let _permit = self.global_permits.acquire().await.expect("executor semaphore closed");

        let input_file = tempfile::NamedTempFile::new()?;
        if let Some(resource_id) = input_resource_id {
            let resource = self.catalog.resource(resource_id)?;
            let bytes = self.blobs.get(&resource.object_hash)?;
            tokio::fs::write(input_file.path(), &bytes).await?;
        }

        let output_dir = self.mount.task_dir(task_id)?;

        run_script(&step.script, &[("INPUT_FILE", path_str(input_file.path())), ("OUTPUT_DIR", path_str(&output_dir))],
                   task_id, &self.running_children)
        .await?;

        // Final-close detection: the child has already exited by this
        // point, which is the authoritative signal §4.5 relies on.
        let captured = self.watcher.reconcile(self.mount.root(), task_id)?;
        let count = captured.len();
        // Noted before the sends below so a waiter already blocked on the
        // barrier can never observe `sent` lower than what is actually
        // in flight to the consumer.
        self.barrier.note_sent(count as u64);
        for event in captured {
            // A closed receiver means the consumer pool has shut down;
            // nothing further can be persisted, so stop forwarding.
            if self.events.send(event).await.is_err() {
                break;
            }
        }
        Ok(count)
    }

    /// Runs `column.script` against `resource_id`'s bytes plus its
    /// dependency values (§4.4, column variant).
    pub async fn execute_column_task(&self, column: &Column, column_task_id: RowId, resource_id: RowId)
                                      -> Result<(), ExecError> {
        let _permit = self.global_permits.acquire().await.expect("executor semaphore closed");

        let input_dir = tempfile::tempdir()?;
        let resource = self.catalog.resource(resource_id)?;
        let bytes = self.blobs.get(&resource.object_hash)?;
        tokio::fs::write(input_dir.path().join("data"), &bytes).await?;

        for dependency in &column.dependencies {
            let dep_column = self.catalog
                                  .column_by_name(dependency, &column.resource_name)?
                                  .ok_or_else(|| ExecError::MissingDependency(dependency.clone()))?;
            let value = self.catalog
                            .column_value(dep_column.id, resource_id)?
                            .ok_or_else(|| ExecError::MissingDependency(dependency.clone()))?;
            let dep_bytes = self.blobs.get(&value.object_hash)?;
            tokio::fs::write(input_dir.path().join(dependency), &dep_bytes).await?;
        }

        let output_dir = tempfile::tempdir()?;
        run_script(&column.script,
                   &[("INPUT_DIR", path_str(input_dir.path())), ("OUTPUT_DIR", path_str(output_dir.path()))],
                   column_task_id, &self.running_children)
        .await?;

        let output_path = output_dir.path().join(&column.name);
        if !output_path.exists() {
            return Err(ExecError::MissingOutput(output_path.display().to_string()));
        }
        let result_bytes = tokio::fs::read(&output_path).await?;
        let hash = loom_core::hash::sha256_hex(&result_bytes);
        if !self.blobs.exists(&hash)? {
            self.blobs.put(&hash, &result_bytes)?;
        }
        self.catalog.put_column_value(column.id, resource_id, &hash)?;
        Ok(())
    }
}

fn path_str(p: &Path) -> String {
    p.to_string_lossy().into_owned()
}

/// Tracks one spawned child's process-group leader pid in `registry` for
/// the duration of this guard, so `Executor::kill_running_children` can
/// find it; removes it again on drop regardless of how the script finished.
struct ChildGuard<'a> {
    registry: &'a Mutex<HashSet<u32>>,
    pid: u32,
}

impl<'a> ChildGuard<'a> {
    fn new(registry: &'a Mutex<HashSet<u32>>, pid: u32) -> Self {
        registry.lock().expect("child registry mutex poisoned").insert(pid);
        Self { registry, pid }
    }
}

impl Drop for ChildGuard<'_> {
    fn drop(&mut self) {
        self.registry.lock().expect("child registry mutex poisoned").remove(&self.pid);
    }
}

/// Spawns `sh -c <script>` with `env` set, waits for exit, and streams
/// stdout/stderr line-by-line into the `loom_exec::child` target so every
/// line a script prints is attributable to the task that produced it
/// (§4.4 step 3). Non-zero exit is surfaced as `ExecError::ScriptFailed`.
async fn run_script(script: &str, env: &[(&str, String)], task_id: RowId, registry: &Mutex<HashSet<u32>>)
                     -> Result<(), ExecError> {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(script).envs(env.iter().map(|(k, v)| (*k, v.as_str())))
       .stdout(Stdio::piped())
       .stderr(Stdio::piped());

    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = cmd.spawn()?;
    let _guard = child.id().map(|pid| ChildGuard::new(registry, pid));

    let stdout = child.stdout.take().expect("piped stdout");
    let stderr = child.stderr.take().expect("piped stderr");

    let out_task = tokio::spawn(stream_lines(stdout, task_id, "stdout"));
    let err_task = tokio::spawn(stream_lines(stderr, task_id, "stderr"));

    let status = child.wait().await?;
    let _ = tokio::join!(out_task, err_task);

    if !status.success() {
        return Err(ExecError::ScriptFailed(status.to_string()));
    }
    Ok(())
}

async fn stream_lines(reader: impl tokio::io::AsyncRead + Unpin, task_id: RowId, stream: &'static str) {
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => log::info!(target: "loom_exec::child", "[task {task_id} {stream}] {line}"),
            Ok(None) => break,
            Err(e) => {
                log::warn!(target: "loom_exec::child", "[task {task_id} {stream}] read error: {e}");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degree_of_parallelism_caps_at_global() {
        assert_eq!(degree_of_parallelism(4, Some(10)), 4);
        assert_eq!(degree_of_parallelism(4, Some(2)), 2);
        assert_eq!(degree_of_parallelism(4, None), 4);
        assert_eq!(degree_of_parallelism(4, Some(0)), 1);
    }
}
