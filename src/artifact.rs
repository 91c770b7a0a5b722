//! Remote artifact listing and download.
//!
//! The worker is distributed as a versioned `name-X.Y.Z-SNAPSHOT.ext`
//! bundle on a plain HTTP listing page. This module extracts the newest
//! advertised version from the listing body, decides whether the locally
//! cached copy is still fresh, and streams the download to disk.

use std::path::{Path, PathBuf};
use futures_util::StreamExt;
use regex::Regex;
use tokio::io::AsyncWriteExt;

use crate::supervisor::SupervisorError;
use crate::version::SemVer;

pub struct ArtifactSource {
    listing_url: String,
    name: String,
    ext: String,
    http: reqwest::Client,
}

impl ArtifactSource {
    pub fn new(listing_url: &str, name: &str, ext: &str) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(concat!("jarvisor/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();

        Self {
            listing_url: listing_url.trim_end_matches('/').to_string(),
            name: name.to_string(),
            ext: ext.to_string(),
            http,
        }
    }

    /// Filename pattern for this artifact, capturing the version triple.
    fn pattern(&self) -> Regex {
        let raw = format!(
            r"{}-(\d+\.\d+\.\d+)-SNAPSHOT\.{}",
            regex::escape(&self.name),
            regex::escape(&self.ext)
        );
        // The pattern is built from escaped literals around a fixed group,
        // so compilation cannot fail.
        Regex::new(&raw).unwrap()
    }

    /// Extract the newest version string advertised in a listing body.
    /// When the listing mentions several versions the highest one wins;
    /// with exactly one match that version is returned verbatim.
    pub fn extract_latest_version(&self, body: &str) -> Option<String> {
        self.pattern()
            .captures_iter(body)
            .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
            .max_by(|a, b| {
                let va = SemVer::parse(a);
                let vb = SemVer::parse(b);
                va.cmp(&vb)
            })
    }

    /// GET the listing page and derive the newest artifact version.
    pub async fn fetch_latest_version(&self) -> Result<String, SupervisorError> {
        let response = self
            .http
            .get(format!("{}/", self.listing_url))
            .send()
            .await
            .map_err(|e| SupervisorError::RemoteListingUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SupervisorError::RemoteListingUnavailable(format!(
                "listing returned HTTP {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SupervisorError::RemoteListingUnavailable(e.to_string()))?;

        self.extract_latest_version(&body)
            .ok_or(SupervisorError::NoArtifactMatch)
    }

    /// `name-VERSION-SNAPSHOT.ext`
    pub fn file_name(&self, version: &str) -> String {
        format!("{}-{}-SNAPSHOT.{}", self.name, version, self.ext)
    }

    /// Download URL for a discovered version; embeds the version verbatim.
    pub fn download_url(&self, version: &str) -> String {
        format!("{}/{}", self.listing_url, self.file_name(version))
    }

    /// Local path the artifact of `version` would occupy under `dir`.
    pub fn local_path(&self, dir: &Path, version: &str) -> PathBuf {
        dir.join(self.file_name(version))
    }

    /// A cached artifact is fresh only when a file named with exactly the
    /// latest remote version exists; any other cached copy is stale.
    pub fn is_cached(&self, dir: &Path, version: &str) -> bool {
        self.local_path(dir, version).exists()
    }

    /// Stream-download the artifact for `version` into `dir`, overwriting
    /// any existing file of the same name. The stream lands in a `.part`
    /// file that only takes the final name once complete, so an aborted
    /// transfer never satisfies the cache check and is retried from
    /// scratch on the next attempt.
    pub async fn download(&self, version: &str, dir: &Path) -> Result<PathBuf, SupervisorError> {
        let url = self.download_url(version);
        let dest = self.local_path(dir, version);
        let partial = dir.join(format!("{}.part", self.file_name(version)));
        tracing::info!("Downloading {} -> {}", url, dest.display());

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| SupervisorError::DownloadFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SupervisorError::DownloadFailed(format!(
                "download returned HTTP {}",
                response.status()
            )));
        }

        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| SupervisorError::DownloadFailed(e.to_string()))?;

        let written = match stream_to_file(response, &partial).await {
            Ok(n) => n,
            Err(e) => {
                let _ = tokio::fs::remove_file(&partial).await;
                return Err(e);
            }
        };

        tokio::fs::rename(&partial, &dest)
            .await
            .map_err(|e| SupervisorError::DownloadFailed(e.to_string()))?;

        tracing::info!("Downloaded {} ({} bytes)", dest.display(), written);
        Ok(dest)
    }
}

/// Write the response body to `path` chunk by chunk, returning the byte
/// count. Any transport or filesystem error aborts the write.
async fn stream_to_file(
    response: reqwest::Response,
    path: &Path,
) -> Result<u64, SupervisorError> {
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| SupervisorError::DownloadFailed(e.to_string()))?;

    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| SupervisorError::DownloadFailed(e.to_string()))?;
        file.write_all(&chunk)
            .await
            .map_err(|e| SupervisorError::DownloadFailed(e.to_string()))?;
        written += chunk.len() as u64;
    }
    file.flush()
        .await
        .map_err(|e| SupervisorError::DownloadFailed(e.to_string()))?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> ArtifactSource {
        ArtifactSource::new("https://example.com/target/", "app", "jar")
    }

    #[test]
    fn extracts_single_version_verbatim() {
        let body = r#"<a href="app-2.3.1-SNAPSHOT.jar">app-2.3.1-SNAPSHOT.jar</a>"#;
        assert_eq!(source().extract_latest_version(body).as_deref(), Some("2.3.1"));
    }

    #[test]
    fn download_url_embeds_version() {
        let url = source().download_url("2.3.1");
        assert!(url.ends_with("app-2.3.1-SNAPSHOT.jar"));
        assert_eq!(url, "https://example.com/target/app-2.3.1-SNAPSHOT.jar");
    }

    #[test]
    fn no_match_yields_none() {
        let body = "<html>nothing versioned here, not even other-1.2.3.zip</html>";
        assert!(source().extract_latest_version(body).is_none());
    }

    #[test]
    fn wrong_name_or_ext_does_not_match() {
        assert!(source().extract_latest_version("other-1.2.3-SNAPSHOT.jar").is_none());
        assert!(source().extract_latest_version("app-1.2.3-SNAPSHOT.zip").is_none());
        assert!(source().extract_latest_version("app-1.2.3.jar").is_none());
    }

    #[test]
    fn several_versions_pick_highest() {
        let body = "app-1.9.0-SNAPSHOT.jar app-1.10.2-SNAPSHOT.jar app-1.2.3-SNAPSHOT.jar";
        assert_eq!(source().extract_latest_version(body).as_deref(), Some("1.10.2"));
    }

    #[test]
    fn cache_check_matches_exact_version_only() {
        let dir = tempfile::tempdir().unwrap();
        let src = source();
        std::fs::write(dir.path().join("app-2.3.0-SNAPSHOT.jar"), b"old").unwrap();

        assert!(src.is_cached(dir.path(), "2.3.0"));
        // A newer remote version makes the cached 2.3.0 stale
        assert!(!src.is_cached(dir.path(), "2.3.1"));
    }

    #[test]
    fn name_with_regex_metacharacters_is_escaped() {
        let src = ArtifactSource::new("https://example.com", "app.core", "jar");
        // The dot must not act as a wildcard
        assert!(src.extract_latest_version("appxcore-1.0.0-SNAPSHOT.jar").is_none());
        assert_eq!(
            src.extract_latest_version("app.core-1.0.0-SNAPSHOT.jar").as_deref(),
            Some("1.0.0")
        );
    }

    #[tokio::test]
    #[ignore = "requires mock server"]
    async fn fetch_latest_version_against_mock() {
        let src = ArtifactSource::new("http://127.0.0.1:9876/target", "app", "jar");
        let version = src.fetch_latest_version().await.unwrap();
        assert!(SemVer::parse(&version).is_some());
    }
}
