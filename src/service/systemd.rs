//! systemd supervisor adapter.
//!
//! Descriptor location `/etc/systemd/system/noctum.service`. The unit file
//! is rendered from a template, written to an unprivileged temp location,
//! and moved into place as the smallest possible elevated step. Reload,
//! enable, and start run unconditionally on every install call, which is
//! what makes re-install safe.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, info, warn};

use crate::error::Result;
use crate::privilege::{Action, Runner, ensure_success};
use crate::service::{SERVICE_NAME, ServiceDescriptor, ServiceManager, ServiceStatus};
use crate::template;

const UNIT_TEMPLATE: &str = include_str!("../../templates/noctum.service.template");
const SYSTEM_UNIT_DIR: &str = "/etc/systemd/system";

pub struct SystemdAdapter {
    runner: Arc<dyn Runner>,
    unit_dir: PathBuf,
}

impl SystemdAdapter {
    pub fn new(runner: Arc<dyn Runner>) -> Self {
        Self::with_unit_dir(runner, PathBuf::from(SYSTEM_UNIT_DIR))
    }

    /// Alternate unit directory. Used by tests.
    pub fn with_unit_dir(runner: Arc<dyn Runner>, unit_dir: PathBuf) -> Self {
        SystemdAdapter { runner, unit_dir }
    }

    pub fn unit_path(&self) -> PathBuf {
        self.unit_dir.join(format!("{SERVICE_NAME}.service"))
    }

    fn systemctl<I, S>(&self, args: I) -> Action
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Action::new("systemctl").args(args).elevated()
    }

    fn run_checked(&self, action: &Action) -> Result<()> {
        let output = self.runner.run(action)?;
        ensure_success(action, &output)
    }
}

impl ServiceManager for SystemdAdapter {
    fn install(&self, descriptor: &ServiceDescriptor) -> Result<()> {
        let unit = template::render(UNIT_TEMPLATE, &descriptor.fields())?;

        // Stage unprivileged, move into place elevated.
        let staging = tempfile::Builder::new().prefix("noctum-unit").tempdir()?;
        let staged = staging.path().join(format!("{SERVICE_NAME}.service"));
        fs::write(&staged, &unit)?;

        let unit_path = self.unit_path();
        self.run_checked(
            &Action::new("mv")
                .args([
                    staged.display().to_string(),
                    unit_path.display().to_string(),
                ])
                .elevated(),
        )?;
        self.run_checked(
            &Action::new("chmod")
                .args(["644".to_string(), unit_path.display().to_string()])
                .elevated(),
        )?;

        // Unconditional on every install: overwrite-and-restart semantics.
        self.run_checked(&self.systemctl(["daemon-reload"]))?;
        self.run_checked(&self.systemctl(["enable", SERVICE_NAME]))?;
        self.run_checked(&self.systemctl(["restart", SERVICE_NAME]))?;

        info!("systemd service {SERVICE_NAME} installed and started");
        Ok(())
    }

    fn uninstall(&self) -> Result<()> {
        let unit_path = self.unit_path();
        if !unit_path.exists() {
            debug!("no systemd unit at {}, nothing to remove", unit_path.display());
            return Ok(());
        }

        // Stop/disable failures are tolerated so a broken unit can still
        // be removed.
        for args in [["stop", SERVICE_NAME], ["disable", SERVICE_NAME]] {
            let action = self.systemctl(args);
            match self.runner.run(&action) {
                Ok(output) if !output.success => {
                    warn!("`{}` failed: {}", action.display(), output.stderr.trim());
                }
                Err(e) => warn!("`{}` failed: {e}", action.display()),
                Ok(_) => {}
            }
        }

        self.run_checked(
            &Action::new("rm")
                .args(["-f".to_string(), unit_path.display().to_string()])
                .elevated(),
        )?;
        self.run_checked(&self.systemctl(["daemon-reload"]))?;

        info!("systemd service {SERVICE_NAME} removed");
        Ok(())
    }

    fn status(&self) -> Result<ServiceStatus> {
        if !self.unit_path().exists() {
            return Ok(ServiceStatus::NotInstalled);
        }

        let action = Action::new("systemctl").args(["is-active", SERVICE_NAME]);
        let output = self.runner.run(&action)?;
        if output.success && output.stdout.trim() == "active" {
            Ok(ServiceStatus::Running)
        } else {
            Ok(ServiceStatus::Stopped)
        }
    }
}
