//! Installer and service lifecycle manager for the noctum daemon.
//!
//! Resolves the running platform, fetches the matching release artifact,
//! deploys the binary to the system path, and drives the OS-native
//! service manager (systemd on Linux, launchd on macOS) through a single
//! polymorphic adapter. Install is idempotent; uninstall is always safe
//! to call speculatively.

pub mod artifact;
pub mod cli;
pub mod error;
pub mod orchestrator;
pub mod platform;
pub mod privilege;
pub mod release;
pub mod service;
pub mod template;

pub use error::{InstallerError, Result};
