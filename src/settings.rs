//! Durable settings store for the resolved runtime location.
//!
//! The resolver caches its discovery for future runs. That side effect is
//! isolated behind a trait so the supervisor never touches global mutable
//! environment state directly, and tests can substitute an in-memory store.

use std::path::{Path, PathBuf};
use anyhow::Result;
use serde::{Deserialize, Serialize};

pub trait SettingsStore: Send + Sync {
    /// Previously persisted runtime location, if any.
    fn load_runtime_home(&self) -> Option<PathBuf>;

    /// Persist the runtime location for future runs.
    fn store_runtime_home(&self, path: &Path) -> Result<()>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedSettings {
    runtime_home: Option<String>,
}

/// JSON-file backed store. The file lives next to the other application
/// data; a missing or unparsable file reads as "nothing persisted".
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read(&self) -> PersistedSettings {
        std::fs::read_to_string(&self.path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }
}

impl SettingsStore for FileSettingsStore {
    fn load_runtime_home(&self) -> Option<PathBuf> {
        self.read().runtime_home.map(PathBuf::from)
    }

    fn store_runtime_home(&self, path: &Path) -> Result<()> {
        let settings = PersistedSettings {
            runtime_home: Some(path.to_string_lossy().to_string()),
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&settings)?)?;
        tracing::info!("Persisted runtime location: {}", path.display());
        Ok(())
    }
}

/// In-memory store for tests and for callers that opt out of persistence.
#[derive(Default)]
pub struct MemorySettingsStore {
    inner: std::sync::Mutex<Option<PathBuf>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load_runtime_home(&self) -> Option<PathBuf> {
        self.inner.lock().ok().and_then(|g| g.clone())
    }

    fn store_runtime_home(&self, path: &Path) -> Result<()> {
        if let Ok(mut guard) = self.inner.lock() {
            *guard = Some(path.to_path_buf());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_roundtrip() {
        let store = MemorySettingsStore::new();
        assert!(store.load_runtime_home().is_none());
        store.store_runtime_home(Path::new("/opt/java/17")).unwrap();
        assert_eq!(store.load_runtime_home(), Some(PathBuf::from("/opt/java/17")));
    }

    #[test]
    fn file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSettingsStore::new(dir.path().join("settings.json"));
        assert!(store.load_runtime_home().is_none());

        store.store_runtime_home(Path::new("/usr/lib/jvm/java-17")).unwrap();
        assert_eq!(
            store.load_runtime_home(),
            Some(PathBuf::from("/usr/lib/jvm/java-17"))
        );

        // A fresh store instance reads the same file
        let reopened = FileSettingsStore::new(dir.path().join("settings.json"));
        assert_eq!(
            reopened.load_runtime_home(),
            Some(PathBuf::from("/usr/lib/jvm/java-17"))
        );
    }

    #[test]
    fn file_store_garbage_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not json at all").unwrap();
        let store = FileSettingsStore::new(&path);
        assert!(store.load_runtime_home().is_none());
    }
}
