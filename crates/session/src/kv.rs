//! Key-value store contract and its adapters
//!
//! The session layer persists a handful of string values. [`KeyValueStore`]
//! is the seam: [`FileStore`] keeps them in a JSON file on disk (written with
//! temp-file + rename so a crash never leaves a torn file), [`MemoryStore`]
//! keeps them in the process for tests and throwaway sessions.
//!
//! Calls are synchronous. Callers on an async runtime treat them like any
//! other short blocking read of local state.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, info};

use crate::error::{Error, Result};

/// One entry of a write batch: `Some` writes the value, `None` removes the key.
pub type BatchEntry<'a> = (&'a str, Option<&'a str>);

/// Persistent string store addressed by key.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;

    /// Apply several writes and removals together.
    ///
    /// The default runs the entries in order. Stores that can persist the
    /// whole batch at once override this so readers never observe half of it.
    fn apply(&self, batch: &[BatchEntry<'_>]) -> Result<()> {
        for (key, value) in batch {
            match value {
                Some(value) => self.set(key, value)?,
                None => self.remove(key)?,
            }
        }
        Ok(())
    }
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<MutexGuard<'_, BTreeMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| Error::Unavailable("memory store lock poisoned".into()))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries()?.remove(key);
        Ok(())
    }

    fn apply(&self, batch: &[BatchEntry<'_>]) -> Result<()> {
        let mut entries = self.entries()?;
        apply_batch(&mut entries, batch);
        Ok(())
    }
}

/// JSON file backed store.
///
/// The whole file is held in memory; every mutation rewrites it atomically
/// with 0600 permissions since it contains bearer tokens.
pub struct FileStore {
    path: PathBuf,
    state: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open the store at `path`, creating it as `{}` when it does not exist.
    pub fn open(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| Error::Io(format!("reading session file: {e}")))?;
            let entries: BTreeMap<String, String> = if contents.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&contents)
                    .map_err(|e| Error::Parse(format!("parsing session file: {e}")))?
            };
            info!(path = %path.display(), keys = entries.len(), "loaded session store");
            entries
        } else {
            info!(path = %path.display(), "session file not found, starting empty");
            let entries = BTreeMap::new();
            write_atomic(&path, &entries)?;
            entries
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn state(&self) -> Result<MutexGuard<'_, BTreeMap<String, String>>> {
        self.state
            .lock()
            .map_err(|_| Error::Unavailable("session store lock poisoned".into()))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.state()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.apply(&[(key, Some(value))])
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.apply(&[(key, None)])
    }

    fn apply(&self, batch: &[BatchEntry<'_>]) -> Result<()> {
        let mut state = self.state()?;
        let mut next = state.clone();
        apply_batch(&mut next, batch);
        if next == *state {
            return Ok(());
        }
        write_atomic(&self.path, &next)?;
        *state = next;
        debug!(entries = batch.len(), "applied session batch");
        Ok(())
    }
}

fn apply_batch(entries: &mut BTreeMap<String, String>, batch: &[BatchEntry<'_>]) {
    for (key, value) in batch {
        match value {
            Some(value) => {
                entries.insert((*key).to_string(), (*value).to_string());
            }
            None => {
                entries.remove(*key);
            }
        }
    }
}

/// Write the store to disk atomically.
///
/// Writes a temporary file next to the target and renames it over the
/// target, so a crash mid-write leaves the previous contents intact.
fn write_atomic(path: &Path, data: &BTreeMap<String, String>) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| Error::Parse(format!("serializing session store: {e}")))?;

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let tmp_path = dir.join(format!(".session.tmp.{}", std::process::id()));

    std::fs::write(&tmp_path, json.as_bytes())
        .map_err(|e| Error::Io(format!("writing temp session file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))
            .map_err(|e| Error::Io(format!("setting session file permissions: {e}")))?;
    }

    std::fs::rename(&tmp_path, path)
        .map_err(|e| Error::Io(format!("renaming temp session file: {e}")))?;

    debug!(path = %path.display(), "persisted session store");
    Ok(())
}
