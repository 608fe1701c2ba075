//! Platform classification for release artifact selection.
//!
//! Maps raw kernel and architecture identifiers (as reported by `uname`)
//! onto the supported set. Anything outside the table is a hard
//! classification failure, never a default.

use std::process::Command;

use crate::error::{InstallerError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsFamily {
    Linux,
    MacOs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arch {
    X86_64,
    Arm64,
}

/// Normalized platform identity, resolved once per installer run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformTag {
    pub os_family: OsFamily,
    pub arch: Arch,
}

impl PlatformTag {
    /// Classify raw `uname -s` / `uname -m` strings. Case-sensitive on the
    /// kernel name, no fuzzy matching.
    pub fn from_raw(kernel: &str, arch: &str) -> Result<Self> {
        let unsupported = || InstallerError::UnsupportedPlatform {
            kernel: kernel.to_string(),
            arch: arch.to_string(),
        };

        let os_family = match kernel {
            "Linux" => OsFamily::Linux,
            "Darwin" => OsFamily::MacOs,
            _ => return Err(unsupported()),
        };

        let arch = match arch {
            "x86_64" => Arch::X86_64,
            "arm64" | "aarch64" => Arch::Arm64,
            _ => return Err(unsupported()),
        };

        Ok(PlatformTag { os_family, arch })
    }

    /// Detect the running platform from `uname`.
    pub fn detect() -> Result<Self> {
        let kernel = uname("-s")?;
        let arch = uname("-m")?;
        Self::from_raw(&kernel, &arch)
    }

    /// Target-triple suffix used in release artifact names.
    pub fn release_suffix(&self) -> &'static str {
        match (self.os_family, self.arch) {
            (OsFamily::Linux, Arch::X86_64) => "x86_64-unknown-linux-gnu",
            (OsFamily::Linux, Arch::Arm64) => "aarch64-unknown-linux-gnu",
            (OsFamily::MacOs, Arch::X86_64) => "x86_64-apple-darwin",
            (OsFamily::MacOs, Arch::Arm64) => "aarch64-apple-darwin",
        }
    }
}

fn uname(flag: &str) -> Result<String> {
    let output = Command::new("uname").arg(flag).output()?;
    uname_stdout(flag, output)
}

/// A failing `uname` is an I/O problem, not a classification result.
fn uname_stdout(flag: &str, output: std::process::Output) -> Result<String> {
    if !output.status.success() {
        return Err(InstallerError::Io(std::io::Error::other(format!(
            "`uname {flag}` failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        ))));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
