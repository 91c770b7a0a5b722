use std::path::PathBuf;
use serde::Deserialize;

/// Default flush threshold for worker output batching. Observed deployments
/// use 1 (immediate) or 10; overridable via `flush_threshold` in
/// config/jarvisor.toml.
pub const DEFAULT_FLUSH_THRESHOLD: usize = 1;

/// Default console poll interval in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

/// Default terminate-then-kill grace period in seconds.
pub const DEFAULT_GRACE_PERIOD_SECS: u64 = 5;

#[derive(Deserialize, Debug, Clone, Default)]
pub struct AppConfig {
    /// Pre-set runtime location; skips discovery when it exists on disk.
    pub runtime_home: Option<String>,
    /// Ordered candidate installation roots scanned during discovery.
    pub install_roots: Option<Vec<String>>,
    /// Remote artifact listing page.
    pub listing_url: Option<String>,
    /// Artifact filename stem (the `name` in `name-1.2.3-SNAPSHOT.jar`).
    pub artifact_name: Option<String>,
    /// Artifact filename extension (without the dot).
    pub artifact_ext: Option<String>,
    /// Directory the downloaded artifact lands in.
    pub download_dir: Option<String>,
    /// Lines of worker output accumulated before one joined flush.
    pub flush_threshold: Option<usize>,
    /// Console consumer poll interval (ms).
    pub poll_interval_ms: Option<u64>,
    /// Graceful shutdown grace period (seconds).
    pub grace_period_secs: Option<u64>,
    /// Base URL of the worker's local control API.
    pub node_api_url: Option<String>,
    /// Remote node-discovery endpoint.
    pub discovery_url: Option<String>,
    /// Settings file used to persist the resolved runtime location.
    pub settings_file: Option<String>,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let s = std::fs::read_to_string("config/jarvisor.toml").unwrap_or_default();
        let cfg: Self = toml::from_str(&s).unwrap_or_default();
        Ok(cfg)
    }

    pub fn install_roots(&self) -> Vec<PathBuf> {
        match &self.install_roots {
            Some(roots) => roots.iter().map(PathBuf::from).collect(),
            None => default_install_roots(),
        }
    }

    pub fn listing_url(&self) -> String {
        self.listing_url
            .clone()
            .unwrap_or_else(|| "https://github.com/CorporateFounder/unitedStates_final/raw/master/target/".to_string())
    }

    pub fn artifact_name(&self) -> String {
        self.artifact_name.clone().unwrap_or_else(|| "unitedStates".to_string())
    }

    pub fn artifact_ext(&self) -> String {
        self.artifact_ext.clone().unwrap_or_else(|| "jar".to_string())
    }

    pub fn download_dir(&self) -> PathBuf {
        self.download_dir
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn flush_threshold(&self) -> usize {
        self.flush_threshold.unwrap_or(DEFAULT_FLUSH_THRESHOLD).max(1)
    }

    pub fn poll_interval_ms(&self) -> u64 {
        self.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS)
    }

    pub fn grace_period_secs(&self) -> u64 {
        self.grace_period_secs.unwrap_or(DEFAULT_GRACE_PERIOD_SECS)
    }

    pub fn node_api_url(&self) -> String {
        self.node_api_url
            .clone()
            .unwrap_or_else(|| "http://localhost:8082".to_string())
    }

    pub fn discovery_url(&self) -> String {
        self.discovery_url
            .clone()
            .unwrap_or_else(|| "https://raw.githubusercontent.com/CorporateFounder/unitedStates_final/master/nodes.json".to_string())
    }

    pub fn settings_file(&self) -> PathBuf {
        self.settings_file
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("config/settings.json"))
    }
}

/// Platform-specific default roots for runtime discovery.
fn default_install_roots() -> Vec<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        vec![
            PathBuf::from("C:\\Program Files\\Java"),
            PathBuf::from("C:\\Program Files (x86)\\Java"),
        ]
    }
    #[cfg(not(target_os = "windows"))]
    {
        vec![PathBuf::from("/usr/lib/jvm"), PathBuf::from("/opt/java")]
    }
}
