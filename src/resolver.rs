//! Runtime discovery.
//!
//! Locates a Java runtime capable of executing the worker artifact:
//! previously persisted location first, then the `JAVA_HOME` environment
//! variable, then a scan over the configured installation roots. The
//! selected location is persisted through the injected [`SettingsStore`]
//! so later runs skip the scan.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::events::EventSink;
use crate::settings::SettingsStore;

#[derive(Error, Debug)]
pub enum ResolverError {
    #[error("no Java runtime installation found")]
    RuntimeNotFound,
}

pub struct RuntimeResolver {
    install_roots: Vec<PathBuf>,
    /// Explicit pre-set location (config `runtime_home`, or the caller's
    /// reading of `JAVA_HOME`). The resolver itself never touches the
    /// process environment.
    preset: Option<PathBuf>,
    settings: Arc<dyn SettingsStore>,
    sink: EventSink,
}

impl RuntimeResolver {
    pub fn new(
        install_roots: Vec<PathBuf>,
        preset: Option<PathBuf>,
        settings: Arc<dyn SettingsStore>,
        sink: EventSink,
    ) -> Self {
        Self {
            install_roots,
            preset,
            settings,
            sink,
        }
    }

    /// Resolve the runtime location.
    ///
    /// A cached location (persisted store, then `JAVA_HOME`) that still
    /// exists on disk is returned as-is and never overwritten. Otherwise
    /// each installation root is scanned in order; within a root the
    /// subdirectories are sorted newest-first (numeric name segments
    /// compared as numbers, everything else reverse-lexicographically)
    /// and the first one of the first non-empty root wins. This is a
    /// heuristic; directories that are not named after versions may sort
    /// surprisingly.
    pub fn resolve(&self) -> Result<PathBuf, ResolverError> {
        if let Some(cached) = self.settings.load_runtime_home() {
            if cached.exists() {
                self.sink
                    .info(format!("Runtime location already set to: {}", cached.display()));
                return Ok(cached);
            }
            self.sink.warn(format!(
                "Persisted runtime location {} no longer exists, re-resolving",
                cached.display()
            ));
        }

        if let Some(preset) = &self.preset {
            if preset.exists() {
                self.sink
                    .info(format!("Runtime home is already set to: {}", preset.display()));
                return Ok(preset.clone());
            }
            self.sink.warn(format!(
                "Configured runtime home {} does not exist, falling back to discovery",
                preset.display()
            ));
        }

        self.sink.info("Searching for Java installations...");

        for root in &self.install_roots {
            if !root.exists() {
                continue;
            }
            self.sink.info(format!("Checking path: {}", root.display()));

            if let Some(newest) = newest_subdirectory(root) {
                self.sink
                    .info(format!("Detected latest runtime: {}", newest.display()));
                self.persist(&newest);
                return Ok(newest);
            }
        }

        self.sink.error("Error: No Java installations found.");
        Err(ResolverError::RuntimeNotFound)
    }

    /// Persist the discovery. Durable-store failure is logged and reported
    /// but never fails the resolve itself.
    fn persist(&self, path: &Path) {
        match self.settings.store_runtime_home(path) {
            Ok(()) => self
                .sink
                .info(format!("Runtime location saved for future runs: {}", path.display())),
            Err(e) => {
                tracing::warn!("Failed to persist runtime location: {}", e);
                self.sink
                    .warn(format!("Failed to save runtime location: {}", e));
            }
        }
    }
}

/// First subdirectory of `root` in newest-first name order, or `None`
/// when the root has no subdirectories.
fn newest_subdirectory(root: &Path) -> Option<PathBuf> {
    let mut names: Vec<String> = std::fs::read_dir(root)
        .ok()?
        .flatten()
        .filter(|e| e.path().is_dir())
        .filter_map(|e| e.file_name().into_string().ok())
        .collect();

    names.sort_by(|a, b| compare_version_names(b, a));
    names.first().map(|name| root.join(name))
}

/// Name comparison that treats runs of digits as numbers, so `17` sorts
/// above `8` and `jdk-17` above `jdk-11`. Non-numeric segments fall back
/// to plain byte order, which degenerates to reverse-lexicographic when
/// the sort above is applied.
fn compare_version_names(a: &str, b: &str) -> std::cmp::Ordering {
    use std::cmp::Ordering;

    let mut ca = a.chars().peekable();
    let mut cb = b.chars().peekable();

    loop {
        match (ca.peek().copied(), cb.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                if x.is_ascii_digit() && y.is_ascii_digit() {
                    let na = take_number(&mut ca);
                    let nb = take_number(&mut cb);
                    match na.cmp(&nb) {
                        Ordering::Equal => continue,
                        ord => return ord,
                    }
                }
                match x.cmp(&y) {
                    Ordering::Equal => {
                        ca.next();
                        cb.next();
                    }
                    ord => return ord,
                }
            }
        }
    }
}

fn take_number(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> u64 {
    let mut n: u64 = 0;
    while let Some(c) = chars.peek().copied() {
        if let Some(d) = c.to_digit(10) {
            n = n.saturating_mul(10).saturating_add(d as u64);
            chars.next();
        } else {
            break;
        }
    }
    n
}

/// Path of the `java` executable inside a runtime location.
pub fn runtime_executable(runtime_home: &Path) -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        runtime_home.join("bin").join("java.exe")
    }
    #[cfg(not(target_os = "windows"))]
    {
        runtime_home.join("bin").join("java")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events;
    use crate::settings::MemorySettingsStore;

    fn resolver_for(roots: Vec<PathBuf>) -> (RuntimeResolver, crate::events::ConsoleQueue) {
        let (sink, queue) = events::channel();
        let resolver =
            RuntimeResolver::new(roots, None, Arc::new(MemorySettingsStore::new()), sink);
        (resolver, queue)
    }

    #[test]
    fn picks_newest_numeric_version() {
        let root = tempfile::tempdir().unwrap();
        for name in ["8", "11", "17"] {
            std::fs::create_dir(root.path().join(name)).unwrap();
        }

        let (resolver, _q) = resolver_for(vec![root.path().to_path_buf()]);
        let resolved = resolver.resolve().unwrap();
        assert_eq!(resolved, root.path().join("17"));
    }

    #[test]
    fn name_ordering_is_numeric_aware() {
        use std::cmp::Ordering;
        assert_eq!(compare_version_names("17", "8"), Ordering::Greater);
        assert_eq!(compare_version_names("jdk-17", "jdk-11"), Ordering::Greater);
        assert_eq!(compare_version_names("jdk-17.0.2", "jdk-17.0.10"), Ordering::Less);
        // Pure-text names fall back to byte order
        assert_eq!(compare_version_names("beta", "alpha"), Ordering::Greater);
        assert_eq!(compare_version_names("same", "same"), Ordering::Equal);
    }

    #[test]
    fn picks_first_non_empty_root() {
        let empty = tempfile::tempdir().unwrap();
        let populated = tempfile::tempdir().unwrap();
        std::fs::create_dir(populated.path().join("jdk-17")).unwrap();
        std::fs::create_dir(populated.path().join("jdk-11")).unwrap();

        let (resolver, _q) = resolver_for(vec![
            empty.path().to_path_buf(),
            populated.path().to_path_buf(),
        ]);
        assert_eq!(resolver.resolve().unwrap(), populated.path().join("jdk-17"));
    }

    #[test]
    fn all_roots_empty_or_absent_is_not_found() {
        let empty = tempfile::tempdir().unwrap();
        let (resolver, mut queue) = resolver_for(vec![
            empty.path().to_path_buf(),
            PathBuf::from("/definitely/not/a/real/root"),
        ]);

        assert!(matches!(resolver.resolve(), Err(ResolverError::RuntimeNotFound)));

        // A terminal failure event must have been emitted, and no
        // "detected" location message.
        let texts: Vec<String> = queue.drain().into_iter().map(|e| e.text).collect();
        assert!(texts.iter().any(|t| t.contains("No Java installations")));
        assert!(!texts.iter().any(|t| t.contains("Detected latest runtime")));
    }

    #[test]
    fn files_in_root_are_ignored() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("README.txt"), "not a jdk").unwrap();

        let (resolver, _q) = resolver_for(vec![root.path().to_path_buf()]);
        assert!(resolver.resolve().is_err());
    }

    #[test]
    fn cached_location_short_circuits_scan() {
        let cached = tempfile::tempdir().unwrap();
        let store = Arc::new(MemorySettingsStore::new());
        store.store_runtime_home(cached.path()).unwrap();

        let (sink, _q) = events::channel();
        // No roots at all — the cache alone must satisfy the resolve
        let resolver = RuntimeResolver::new(vec![], None, store, sink);
        assert_eq!(resolver.resolve().unwrap(), cached.path());
    }

    #[test]
    fn stale_cache_falls_through_to_scan() {
        let store = Arc::new(MemorySettingsStore::new());
        store
            .store_runtime_home(Path::new("/gone/runtime"))
            .unwrap();

        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("jdk-21")).unwrap();

        let (sink, _q) = events::channel();
        let resolver =
            RuntimeResolver::new(vec![root.path().to_path_buf()], None, store.clone(), sink);
        assert_eq!(resolver.resolve().unwrap(), root.path().join("jdk-21"));
        // Scan result replaces the stale persisted value
        assert_eq!(store.load_runtime_home(), Some(root.path().join("jdk-21")));
    }

    #[test]
    fn resolve_persists_selection() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("17")).unwrap();

        let store = Arc::new(MemorySettingsStore::new());
        let (sink, _q) = events::channel();
        let resolver =
            RuntimeResolver::new(vec![root.path().to_path_buf()], None, store.clone(), sink);
        let resolved = resolver.resolve().unwrap();
        assert_eq!(store.load_runtime_home(), Some(resolved));
    }

    #[test]
    fn preset_location_wins_over_scan() {
        let preset = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("17")).unwrap();

        let (sink, _q) = events::channel();
        let resolver = RuntimeResolver::new(
            vec![root.path().to_path_buf()],
            Some(preset.path().to_path_buf()),
            Arc::new(MemorySettingsStore::new()),
            sink,
        );
        assert_eq!(resolver.resolve().unwrap(), preset.path());
    }

    #[test]
    fn missing_preset_falls_back_to_scan() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("11")).unwrap();

        let (sink, _q) = events::channel();
        let resolver = RuntimeResolver::new(
            vec![root.path().to_path_buf()],
            Some(PathBuf::from("/no/such/runtime")),
            Arc::new(MemorySettingsStore::new()),
            sink,
        );
        assert_eq!(resolver.resolve().unwrap(), root.path().join("11"));
    }

    #[test]
    fn runtime_executable_is_under_bin() {
        let exe = runtime_executable(Path::new("/opt/java/17"));
        assert!(exe.starts_with("/opt/java/17/bin"));
    }
}
