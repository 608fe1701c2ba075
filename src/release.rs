//! Release resolution against the noctum release listing.
//!
//! Every installer run re-resolves "latest" from the endpoint; nothing is
//! cached across runs.

use std::time::Duration;

use semver::Version;
use serde::Deserialize;

use crate::error::{InstallerError, Result};
use crate::platform::PlatformTag;

pub const BINARY_NAME: &str = "noctum";

const RELEASE_API_URL: &str = "https://api.github.com/repos/noctum/noctum/releases/latest";
const RELEASE_DOWNLOAD_BASE: &str = "https://github.com/noctum/noctum/releases/download";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("noctum-install/", env!("CARGO_PKG_VERSION"));

/// Release listing response, reduced to the one field we read.
#[derive(Deserialize, Debug)]
struct ReleaseListing {
    tag_name: String,
}

pub struct ReleaseLocator {
    api_url: String,
    download_base: String,
}

impl Default for ReleaseLocator {
    fn default() -> Self {
        Self::new()
    }
}

impl ReleaseLocator {
    pub fn new() -> Self {
        ReleaseLocator {
            api_url: RELEASE_API_URL.to_string(),
            download_base: RELEASE_DOWNLOAD_BASE.to_string(),
        }
    }

    /// Point the locator at alternate endpoints. Used by tests.
    pub fn with_endpoints(api_url: impl Into<String>, download_base: impl Into<String>) -> Self {
        ReleaseLocator {
            api_url: api_url.into(),
            download_base: download_base.into(),
        }
    }

    /// Resolve the latest published version from the release listing.
    pub async fn latest_version(&self) -> Result<Version> {
        let resolution_failed = |reason: String| InstallerError::VersionResolutionFailed { reason };

        let client = http_client()?;
        let response = client
            .get(&self.api_url)
            .send()
            .await
            .map_err(|e| resolution_failed(format!("release endpoint unreachable: {e}")))?;

        if !response.status().is_success() {
            return Err(resolution_failed(format!(
                "release endpoint returned HTTP {}",
                response.status()
            )));
        }

        let listing: ReleaseListing = response
            .json()
            .await
            .map_err(|e| resolution_failed(format!("unparseable release listing: {e}")))?;

        version_from_tag(&listing.tag_name)
    }

    /// Compose the per-platform tarball URL. Pure string composition.
    pub fn download_url(&self, version: &Version, tag: PlatformTag) -> String {
        format!(
            "{}/v{}/{}-{}.tar.gz",
            self.download_base,
            version,
            BINARY_NAME,
            tag.release_suffix()
        )
    }
}

/// HTTP client shared by release resolution and artifact download.
pub(crate) fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| InstallerError::VersionResolutionFailed {
            reason: format!("could not construct HTTP client: {e}"),
        })
}

/// Parse a release tag (`v1.2.3` or `1.2.3`) into a version.
pub fn version_from_tag(tag: &str) -> Result<Version> {
    let bare = tag.strip_prefix('v').unwrap_or(tag);
    Version::parse(bare).map_err(|_| InstallerError::VersionResolutionFailed {
        reason: format!("release tag `{tag}` is not a semantic version"),
    })
}
