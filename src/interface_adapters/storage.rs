use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::warn;

use crate::domain::ports::CredentialBackend;

// Process-local backend; nothing survives a restart.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>, String> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), String> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), String> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), String> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.clear();
        Ok(())
    }
}

/// Durable backend keeping every entry in one JSON object on disk.
///
/// Each write rewrites the whole file through a sibling temp file and a
/// rename, so a crash never leaves a half-written namespace behind.
#[derive(Clone)]
pub struct FileBackend {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    lock: Arc<Mutex<()>>,
}

type Entries = BTreeMap<String, String>;

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_raw(&self) -> Result<Option<String>, String> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => Ok(Some(raw)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(format!("failed to read {}: {err}", self.path.display())),
        }
    }

    fn parse(&self, raw: &str) -> Result<Entries, String> {
        if raw.trim().is_empty() {
            return Ok(Entries::new());
        }
        serde_json::from_str(raw)
            .map_err(|err| format!("corrupt state file {}: {err}", self.path.display()))
    }

    fn load(&self) -> Result<Entries, String> {
        match self.read_raw()? {
            Some(raw) => self.parse(&raw),
            None => Ok(Entries::new()),
        }
    }

    // A corrupt file is replaced rather than blocking every later write.
    fn load_for_write(&self) -> Result<Entries, String> {
        let Some(raw) = self.read_raw()? else {
            return Ok(Entries::new());
        };
        Ok(self.parse(&raw).unwrap_or_else(|err| {
            warn!(error = %err, "resetting unreadable state file");
            Entries::new()
        }))
    }

    fn store(&self, entries: &Entries) -> Result<(), String> {
        if let Some(parent) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|err| format!("failed to create {}: {err}", parent.display()))?;
        }

        let raw = serde_json::to_string_pretty(entries)
            .map_err(|err| format!("failed to encode state: {err}"))?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, raw).map_err(|err| format!("failed to write {}: {err}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .map_err(|err| format!("failed to replace {}: {err}", self.path.display()))
    }

    fn update<F>(&self, change: F) -> Result<(), String>
    where
        F: FnOnce(&mut Entries) -> bool,
    {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.load_for_write()?;
        if change(&mut entries) {
            self.store(&entries)?;
        }
        Ok(())
    }
}

impl CredentialBackend for FileBackend {
    fn get(&self, key: &str) -> Result<Option<String>, String> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), String> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
            true
        })
    }

    fn remove(&self, key: &str) -> Result<(), String> {
        self.update(|entries| entries.remove(key).is_some())
    }

    fn clear(&self) -> Result<(), String> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(format!("failed to remove {}: {err}", self.path.display())),
        }
    }
}
