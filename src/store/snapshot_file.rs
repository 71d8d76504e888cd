use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::error::{BoardError, Result};
use crate::model::Snapshot;
use crate::state::SharedState;
use crate::store::lock;

/// The single JSON file holding a node's durable `{ports, messages}` snapshot.
///
/// Writes are serialized twice over: an in-process mutex orders writers on
/// this node, and an advisory lock on `<file>.lock` orders processes sharing
/// the file. Content lands in `<file>.tmp` first and is renamed into place.
#[derive(Debug)]
pub struct SnapshotStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| OsString::from("peerboard"));
        name.push(suffix);
        self.path.with_file_name(name)
    }

    fn lock_path(&self) -> PathBuf {
        self.sibling(".lock")
    }

    fn tmp_path(&self) -> PathBuf {
        self.sibling(".tmp")
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn ensure_parent(&self) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| BoardError::store(parent, e))?;
        }
        Ok(())
    }

    /// Strict read. `Ok(None)` when the file does not exist yet.
    pub fn read(&self) -> Result<Option<Snapshot>> {
        let _guard = self.guard();
        if !self.path.exists() {
            return Ok(None);
        }
        let file_lock = lock::acquire_lock(&self.lock_path())?;
        let data = fs::read(&self.path).map_err(|e| BoardError::store(&self.path, e));
        lock::release_lock(file_lock)?;
        let data = data?;
        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        Ok(Some(serde_json::from_slice(&data)?))
    }

    /// Best-effort startup read: a missing, empty, unreadable or corrupt file
    /// yields an empty snapshot.
    pub fn load(&self) -> Snapshot {
        match self.read() {
            Ok(Some(snapshot)) => {
                tracing::debug!(
                    path = %self.path.display(),
                    peers = snapshot.peers.len(),
                    messages = snapshot.messages.len(),
                    "loaded snapshot"
                );
                snapshot
            }
            Ok(None) => Snapshot::default(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "ignoring unusable store file");
                Snapshot::default()
            }
        }
    }

    /// Overwrite the file with `snapshot`.
    pub fn write(&self, snapshot: &Snapshot) -> Result<()> {
        let _guard = self.guard();
        self.write_locked(snapshot)
    }

    /// Snapshot `state` and write it.
    ///
    /// Lock order: the persistence lock is taken first, the state lock only
    /// inside `snapshot()`, and it is released before any file I/O begins.
    pub fn persist(&self, state: &SharedState) -> Result<()> {
        let _guard = self.guard();
        let snapshot = state.snapshot();
        self.write_locked(&snapshot)
    }

    fn write_locked(&self, snapshot: &Snapshot) -> Result<()> {
        self.ensure_parent()?;
        let json = serde_json::to_vec_pretty(snapshot)?;

        let file_lock = lock::acquire_lock(&self.lock_path())?;
        let tmp = self.tmp_path();
        let written = fs::write(&tmp, &json)
            .and_then(|()| fs::rename(&tmp, &self.path))
            .map_err(|e| BoardError::store(&self.path, e));
        if written.is_err() {
            match fs::remove_file(&tmp) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => tracing::debug!(path = %tmp.display(), error = %e, "stale temp file left"),
            }
        }
        lock::release_lock(file_lock)?;
        written
    }
}
