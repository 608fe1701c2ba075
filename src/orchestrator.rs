//! Top-level lifecycle coordination.
//!
//! One immutable [`Intent`] per process run, built once from parsed
//! arguments. Install sequences platform resolution, release resolution,
//! artifact acquisition, deployment, and (optionally) service
//! installation; uninstall runs the inverse. The daemon's config and data
//! directories are never touched.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use log::info;

use crate::artifact;
use crate::error::Result;
use crate::platform::PlatformTag;
use crate::privilege::{Action, HostRunner, Runner, ensure_success};
use crate::release::{BINARY_NAME, ReleaseLocator, http_client};
use crate::service::{self, ServiceDescriptor, ServiceManager};

const INSTALL_DIR: &str = "/usr/local/bin";

/// What this run should do. Constructed once from the CLI; no component
/// reads ambient process state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Install { manage_service: bool },
    Uninstall,
}

pub struct Orchestrator {
    runner: Arc<dyn Runner>,
    locator: ReleaseLocator,
    install_dir: PathBuf,
    workspace_root: Option<PathBuf>,
    supervisor: Option<Box<dyn ServiceManager>>,
    platform: Option<PlatformTag>,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl Orchestrator {
    pub fn new() -> Self {
        Self::with_parts(
            Arc::new(HostRunner),
            ReleaseLocator::new(),
            PathBuf::from(INSTALL_DIR),
        )
    }

    /// Substitute runner, locator, or install directory. Used by tests.
    pub fn with_parts(
        runner: Arc<dyn Runner>,
        locator: ReleaseLocator,
        install_dir: PathBuf,
    ) -> Self {
        Orchestrator {
            runner,
            locator,
            install_dir,
            workspace_root: None,
            supervisor: None,
            platform: None,
        }
    }

    /// Skip `uname`-based detection. Used by tests.
    pub fn with_platform(mut self, platform: PlatformTag) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Substitute the supervisor adapter. Used by tests.
    pub fn with_supervisor(mut self, supervisor: Box<dyn ServiceManager>) -> Self {
        self.supervisor = Some(supervisor);
        self
    }

    /// Create the scoped workspace under this directory instead of the
    /// system temp dir. Used by tests.
    pub fn with_workspace_root(mut self, root: PathBuf) -> Self {
        self.workspace_root = Some(root);
        self
    }

    pub async fn run(&self, intent: Intent) -> Result<()> {
        match intent {
            Intent::Install { manage_service } => self.install(manage_service).await,
            Intent::Uninstall => self.uninstall(),
        }
    }

    fn resolved_platform(&self) -> Result<PlatformTag> {
        match self.platform {
            Some(tag) => Ok(tag),
            None => PlatformTag::detect(),
        }
    }

    fn workspace(&self) -> Result<tempfile::TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("noctum-install");
        let workspace = match &self.workspace_root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };
        Ok(workspace)
    }

    async fn install(&self, manage_service: bool) -> Result<()> {
        let tag = self.resolved_platform()?;
        info!("platform: {}", tag.release_suffix());

        let version = self.locator.latest_version().await?;
        info!("latest release: v{version}");
        let url = self.locator.download_url(&version, tag);

        // Scoped workspace: the guard removes the directory on every exit
        // path, including errors between here and deploy.
        let workspace = self.workspace()?;

        let client = http_client()?;
        let tarball = artifact::fetch(&client, &url, workspace.path()).await?;
        let executable = artifact::extract(&tarball, workspace.path())?;
        let deployed = artifact::deploy(&executable, &self.install_dir, self.runner.as_ref())?;

        if manage_service {
            let selected;
            let adapter: &dyn ServiceManager = match &self.supervisor {
                Some(adapter) => adapter.as_ref(),
                None => {
                    selected = service::select_adapter(tag, self.runner.clone());
                    selected.as_ref()
                }
            };
            let descriptor = ServiceDescriptor::for_current_user(deployed)?;
            adapter.install(&descriptor)?;
        } else {
            info!("service management skipped; run `{BINARY_NAME} start` to launch the daemon");
        }

        Ok(())
    }

    fn uninstall(&self) -> Result<()> {
        let tag = self.resolved_platform()?;

        // Speculative by design: removing a service that was never
        // installed is a no-op.
        let selected;
        let adapter: &dyn ServiceManager = match &self.supervisor {
            Some(adapter) => adapter.as_ref(),
            None => {
                selected = service::select_adapter(tag, self.runner.clone());
                selected.as_ref()
            }
        };
        adapter.uninstall()?;

        self.remove_binary()?;

        info!(
            "kept ~/.config/{BINARY_NAME}/ and ~/.local/share/{BINARY_NAME}/ (daemon-owned data)"
        );
        Ok(())
    }

    fn remove_binary(&self) -> Result<()> {
        let target = self.install_dir.join(BINARY_NAME);
        if !target.exists() {
            info!("{} not present, nothing to remove", target.display());
            return Ok(());
        }

        match fs::remove_file(&target) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                let action = Action::new("rm")
                    .args(["-f".to_string(), target.display().to_string()])
                    .elevated();
                let output = self.runner.run(&action)?;
                ensure_success(&action, &output)?;
            }
            Err(e) => return Err(e.into()),
        }

        info!("removed {}", target.display());
        Ok(())
    }
}
