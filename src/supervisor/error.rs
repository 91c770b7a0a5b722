//! Supervisor error types. Every failure is terminal for the current run;
//! nothing here triggers an automatic retry.

use std::path::PathBuf;

use crate::resolver::ResolverError;

#[derive(thiserror::Error, Debug)]
pub enum SupervisorError {
    #[error("no Java runtime installation found")]
    RuntimeNotFound,

    #[error("remote artifact listing unavailable: {0}")]
    RemoteListingUnavailable(String),

    #[error("no versioned artifact found in remote listing")]
    NoArtifactMatch,

    #[error("artifact download failed: {0}")]
    DownloadFailed(String),

    #[error("runtime executable missing: {0}")]
    RuntimeExecutableMissing(PathBuf),

    #[error("failed to launch worker process: {0}")]
    LaunchFailed(String),

    #[error("worker process crashed: {0}")]
    ProcessCrashed(String),
}

impl SupervisorError {
    /// Machine-readable error code for consumers that want more than the
    /// display text.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::RuntimeNotFound => "RUNTIME_NOT_FOUND",
            Self::RemoteListingUnavailable(_) => "REMOTE_LISTING_UNAVAILABLE",
            Self::NoArtifactMatch => "NO_ARTIFACT_MATCH",
            Self::DownloadFailed(_) => "DOWNLOAD_FAILED",
            Self::RuntimeExecutableMissing(_) => "RUNTIME_EXECUTABLE_MISSING",
            Self::LaunchFailed(_) => "LAUNCH_FAILED",
            Self::ProcessCrashed(_) => "PROCESS_CRASHED",
        }
    }
}

impl From<ResolverError> for SupervisorError {
    fn from(e: ResolverError) -> Self {
        match e {
            ResolverError::RuntimeNotFound => Self::RuntimeNotFound,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(SupervisorError::RuntimeNotFound.error_code(), "RUNTIME_NOT_FOUND");
        assert_eq!(SupervisorError::NoArtifactMatch.error_code(), "NO_ARTIFACT_MATCH");
        assert_eq!(
            SupervisorError::DownloadFailed("timeout".into()).error_code(),
            "DOWNLOAD_FAILED"
        );
    }

    #[test]
    fn resolver_error_maps_to_runtime_not_found() {
        let e: SupervisorError = ResolverError::RuntimeNotFound.into();
        assert!(matches!(e, SupervisorError::RuntimeNotFound));
    }

    #[test]
    fn display_carries_detail() {
        let e = SupervisorError::RuntimeExecutableMissing(PathBuf::from("/opt/java/17/bin/java"));
        assert!(e.to_string().contains("/opt/java/17/bin/java"));
    }
}
