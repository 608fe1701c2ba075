//! Native service supervision adapters.
//!
//! One [`ServiceManager`] capability set, three variants: systemd,
//! launchd, and a none-adapter for hosts without a supported manager.
//! Selection happens once, solely from the platform's OS family; every
//! call site stays platform-agnostic.

use std::path::PathBuf;
use std::sync::Arc;

use log::warn;

use crate::error::{InstallerError, Result};
use crate::platform::{OsFamily, PlatformTag};
use crate::privilege::Runner;

pub mod launchd;
pub mod systemd;

pub use launchd::LaunchdAdapter;
pub use systemd::SystemdAdapter;

pub const SERVICE_NAME: &str = "noctum";
pub const LAUNCHD_LABEL: &str = "com.noctum.daemon";

/// Single source of truth rendered into both the systemd unit and the
/// launchd plist. Field parity between the two renderings is enforced by
/// the strict template renderer.
#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    pub exec_path: PathBuf,
    pub run_as_user: String,
    pub run_as_group: String,
    pub home_dir: PathBuf,
    pub stdout_log: PathBuf,
    pub stderr_log: PathBuf,
}

impl ServiceDescriptor {
    /// Descriptor for running the daemon as the invoking user, logging
    /// under the daemon's data directory.
    pub fn for_current_user(exec_path: PathBuf) -> Result<Self> {
        let home_dir = dirs::home_dir().ok_or_else(|| {
            InstallerError::ServiceManager("could not determine home directory".to_string())
        })?;

        let uid = nix::unistd::Uid::effective();
        let run_as_user = nix::unistd::User::from_uid(uid)
            .map_err(|e| {
                InstallerError::ServiceManager(format!("could not resolve current user: {e}"))
            })?
            .map(|u| u.name)
            .ok_or_else(|| {
                InstallerError::ServiceManager(format!("no passwd entry for uid {uid}"))
            })?;

        let gid = nix::unistd::Gid::effective();
        let run_as_group = nix::unistd::Group::from_gid(gid)
            .map_err(|e| {
                InstallerError::ServiceManager(format!("could not resolve current group: {e}"))
            })?
            .map(|g| g.name)
            .ok_or_else(|| {
                InstallerError::ServiceManager(format!("no group entry for gid {gid}"))
            })?;

        let log_dir = home_dir.join(".local/share/noctum/logs");

        Ok(ServiceDescriptor {
            exec_path,
            run_as_user,
            run_as_group,
            stdout_log: log_dir.join("noctum.out.log"),
            stderr_log: log_dir.join("noctum.err.log"),
            home_dir,
        })
    }

    /// Field list fed to the template renderer. Both renderings consume
    /// exactly this set.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("exec_path", self.exec_path.display().to_string()),
            ("run_as_user", self.run_as_user.clone()),
            ("run_as_group", self.run_as_group.clone()),
            ("home_dir", self.home_dir.display().to_string()),
            ("stdout_log", self.stdout_log.display().to_string()),
            ("stderr_log", self.stderr_log.display().to_string()),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
    Running,
    Stopped,
    NotInstalled,
}

/// Common contract across supervisor variants.
///
/// `install` is idempotent: re-running overwrites the descriptor and
/// restarts the service. `uninstall` is always safe to call speculatively;
/// a missing descriptor is a no-op, not an error.
pub trait ServiceManager {
    fn install(&self, descriptor: &ServiceDescriptor) -> Result<()>;
    fn uninstall(&self) -> Result<()>;
    fn status(&self) -> Result<ServiceStatus>;
}

/// Used when no supported service manager is detectable. Install degrades
/// to a warning; the deployed binary stays usable via `noctum start`.
pub struct NoneAdapter;

impl ServiceManager for NoneAdapter {
    fn install(&self, _descriptor: &ServiceDescriptor) -> Result<()> {
        warn!("no supported service manager found; start the daemon manually with `noctum start`");
        Ok(())
    }

    fn uninstall(&self) -> Result<()> {
        Ok(())
    }

    fn status(&self) -> Result<ServiceStatus> {
        Ok(ServiceStatus::NotInstalled)
    }
}

/// Select the adapter for this platform. Linux degrades to the
/// none-adapter when systemctl is not on PATH; macOS always has launchd.
pub fn select_adapter(tag: PlatformTag, runner: Arc<dyn Runner>) -> Box<dyn ServiceManager> {
    match tag.os_family {
        OsFamily::Linux => {
            if which::which("systemctl").is_ok() {
                Box::new(SystemdAdapter::new(runner))
            } else {
                warn!("systemctl not found; the noctum service will not be supervised");
                Box::new(NoneAdapter)
            }
        }
        OsFamily::MacOs => Box::new(LaunchdAdapter::new(runner)),
    }
}
