//! Error taxonomy for the installer.
//!
//! Every component-level failure maps to exactly one variant so the
//! top-level orchestrator can print a single actionable message and the
//! process can exit with a category-specific code.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InstallerError {
    /// The kernel name or architecture string did not match a supported
    /// entry. Never a silent default.
    #[error("unsupported platform: kernel `{kernel}`, architecture `{arch}`")]
    UnsupportedPlatform { kernel: String, arch: String },

    /// The release-listing endpoint was unreachable or returned nothing
    /// that parses as a version tag.
    #[error("could not resolve the latest noctum release: {reason}")]
    VersionResolutionFailed { reason: String },

    /// Network error or non-2xx response while fetching the artifact.
    #[error("download failed for {url}")]
    DownloadFailed {
        url: String,
        #[source]
        source: anyhow::Error,
    },

    /// The downloaded archive was malformed or did not contain the
    /// expected executable.
    #[error("could not extract the release archive {archive}")]
    ExtractionFailed {
        archive: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// Privilege elevation was declined or an elevated step failed.
    #[error("privilege elevation failed: {detail}")]
    PermissionDenied { detail: String },

    /// A native service manager command failed.
    #[error("service manager operation failed: {0}")]
    ServiceManager(String),

    /// A service descriptor template did not render cleanly.
    #[error("service template error: {0}")]
    Template(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl InstallerError {
    /// Process exit code for this error category.
    pub fn exit_code(&self) -> u8 {
        match self {
            InstallerError::UnsupportedPlatform { .. } => 2,
            InstallerError::VersionResolutionFailed { .. } => 3,
            InstallerError::DownloadFailed { .. } => 4,
            InstallerError::ExtractionFailed { .. } => 5,
            InstallerError::PermissionDenied { .. } => 6,
            InstallerError::ServiceManager(_) => 7,
            InstallerError::Template(_) => 8,
            InstallerError::Io(_) => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, InstallerError>;
