//! launchd supervisor adapter.
//!
//! User-scope agent at `~/Library/LaunchAgents/com.noctum.daemon.plist`,
//! no elevation needed. `RunAtLoad` starts the daemon on load;
//! `KeepAlive.SuccessfulExit=false` restarts it only on non-zero exit,
//! mirroring systemd's `on-failure`. Re-install unloads any previously
//! loaded descriptor first so launchd never holds two registrations for
//! the same label.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, info, warn};

use crate::error::Result;
use crate::privilege::{Action, Runner, ensure_success};
use crate::service::{LAUNCHD_LABEL, ServiceDescriptor, ServiceManager, ServiceStatus};
use crate::template;

const PLIST_TEMPLATE: &str = include_str!("../../templates/com.noctum.daemon.plist.template");

pub struct LaunchdAdapter {
    runner: Arc<dyn Runner>,
    agents_dir: PathBuf,
}

impl LaunchdAdapter {
    pub fn new(runner: Arc<dyn Runner>) -> Self {
        let agents_dir = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("/"))
            .join("Library/LaunchAgents");
        Self::with_agents_dir(runner, agents_dir)
    }

    /// Alternate agents directory. Used by tests.
    pub fn with_agents_dir(runner: Arc<dyn Runner>, agents_dir: PathBuf) -> Self {
        LaunchdAdapter { runner, agents_dir }
    }

    pub fn plist_path(&self) -> PathBuf {
        self.agents_dir.join(format!("{LAUNCHD_LABEL}.plist"))
    }

    fn unload_existing(&self) {
        let action = Action::new("launchctl").args([
            "unload".to_string(),
            self.plist_path().display().to_string(),
        ]);
        match self.runner.run(&action) {
            Ok(output) if !output.success => {
                debug!("launchctl unload: {}", output.stderr.trim());
            }
            Err(e) => warn!("`{}` failed: {e}", action.display()),
            Ok(_) => {}
        }
    }
}

impl ServiceManager for LaunchdAdapter {
    fn install(&self, descriptor: &ServiceDescriptor) -> Result<()> {
        // Log directory for StandardOutPath/StandardErrorPath; created
        // here, never removed by uninstall.
        for log in [&descriptor.stdout_log, &descriptor.stderr_log] {
            if let Some(parent) = log.parent() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::create_dir_all(&self.agents_dir)?;

        // Unconditional: a registration can outlive its plist file when
        // the file was removed out-of-band, and unload tolerates the
        // nothing-loaded case.
        let plist_path = self.plist_path();
        self.unload_existing();

        let plist = template::render(PLIST_TEMPLATE, &descriptor.fields())?;
        let staged = self.agents_dir.join(format!(".{LAUNCHD_LABEL}.plist.tmp"));
        fs::write(&staged, &plist)?;
        fs::rename(&staged, &plist_path)?;

        // RunAtLoad=true means load implies start.
        let load = Action::new("launchctl").args([
            "load".to_string(),
            plist_path.display().to_string(),
        ]);
        let output = self.runner.run(&load)?;
        ensure_success(&load, &output)?;

        info!("launchd agent {LAUNCHD_LABEL} loaded");
        Ok(())
    }

    fn uninstall(&self) -> Result<()> {
        let plist_path = self.plist_path();
        if !plist_path.exists() {
            debug!("no launchd agent at {}, nothing to remove", plist_path.display());
            return Ok(());
        }

        self.unload_existing();
        fs::remove_file(&plist_path)?;

        info!("launchd agent {LAUNCHD_LABEL} removed");
        Ok(())
    }

    fn status(&self) -> Result<ServiceStatus> {
        if !self.plist_path().exists() {
            return Ok(ServiceStatus::NotInstalled);
        }

        let action = Action::new("launchctl").args(["list", LAUNCHD_LABEL]);
        let output = self.runner.run(&action)?;
        if output.success {
            Ok(ServiceStatus::Running)
        } else {
            Ok(ServiceStatus::Stopped)
        }
    }
}
