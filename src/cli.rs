//! Command-line surface.

use clap::Parser;

use crate::orchestrator::Intent;

#[derive(Parser, Debug)]
#[command(
    name = "noctum-install",
    version,
    about = "Install or remove the noctum daemon"
)]
pub struct Args {
    /// Install and start the native service supervisor after deploying
    /// the binary
    #[arg(long)]
    pub service: bool,

    /// Deploy the binary only (default)
    #[arg(long, conflicts_with = "service")]
    pub no_service: bool,

    /// Remove the deployed binary and any installed service
    /// (ignores --service / --no-service)
    #[arg(long)]
    pub uninstall: bool,
}

impl Args {
    pub fn intent(&self) -> Intent {
        if self.uninstall {
            Intent::Uninstall
        } else {
            Intent::Install {
                manage_service: self.service,
            }
        }
    }
}
