//! Release artifact acquisition and deployment.
//!
//! The tarball is streamed into a scoped temporary workspace owned by the
//! caller (a `tempfile::TempDir`, removed on every exit path when the
//! guard drops), extracted there, and the executable is placed on the
//! system path atomically: written under a temporary name inside the
//! target directory and renamed into place. A concurrently running daemon
//! keeps its old file descriptor and a half-written binary is never
//! observable at the final path.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};
use tokio::io::AsyncWriteExt;

use crate::error::{InstallerError, Result};
use crate::privilege::{Action, Runner, ensure_success};
use crate::release::BINARY_NAME;

/// Stream the tarball at `url` into the workspace.
pub async fn fetch(client: &reqwest::Client, url: &str, workspace: &Path) -> Result<PathBuf> {
    let download_failed = |source: anyhow::Error| InstallerError::DownloadFailed {
        url: url.to_string(),
        source,
    };

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| download_failed(e.into()))?;

    if !response.status().is_success() {
        return Err(download_failed(anyhow::anyhow!(
            "HTTP {}",
            response.status()
        )));
    }

    let progress = response
        .content_length()
        .map(download_progress_bar)
        .unwrap_or_else(ProgressBar::hidden);

    let tarball = workspace.join(format!("{BINARY_NAME}.tar.gz"));
    let mut file = tokio::fs::File::create(&tarball).await?;

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| download_failed(e.into()))?;
        file.write_all(&chunk).await?;
        progress.inc(chunk.len() as u64);
    }
    file.flush().await?;
    progress.finish_and_clear();

    debug!("downloaded {} to {}", url, tarball.display());
    Ok(tarball)
}

fn download_progress_bar(total: u64) -> ProgressBar {
    let bar = ProgressBar::new(total);
    if let Ok(style) =
        ProgressStyle::with_template("{bar:40} {bytes}/{total_bytes} ({bytes_per_sec})")
    {
        bar.set_style(style);
    }
    bar
}

/// Unpack the gzipped tarball inside the workspace and locate the
/// executable entry.
pub fn extract(tarball: &Path, workspace: &Path) -> Result<PathBuf> {
    let extraction_failed = |source: anyhow::Error| InstallerError::ExtractionFailed {
        archive: tarball.to_path_buf(),
        source,
    };

    let unpacked = workspace.join("unpacked");
    fs::create_dir_all(&unpacked)?;

    let file = fs::File::open(tarball)?;
    let mut archive = tar::Archive::new(flate2::read::GzDecoder::new(file));
    archive
        .unpack(&unpacked)
        .map_err(|e| extraction_failed(e.into()))?;

    let executable = locate_executable(&unpacked)
        .ok_or_else(|| extraction_failed(anyhow::anyhow!("archive contains no `{BINARY_NAME}`")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(&executable)?.permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&executable, perms)?;
    }

    Ok(executable)
}

/// The executable sits either at the archive root or inside a single
/// top-level directory.
fn locate_executable(unpacked: &Path) -> Option<PathBuf> {
    let direct = unpacked.join(BINARY_NAME);
    if direct.is_file() {
        return Some(direct);
    }

    let entries = fs::read_dir(unpacked).ok()?;
    for entry in entries.flatten() {
        let candidate = entry.path().join(BINARY_NAME);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

/// Place the executable at `{target_dir}/noctum`.
///
/// Tries an unprivileged copy+rename first; when the directory is not
/// writable the same staged-rename sequence runs through the elevated
/// runner, keeping the privileged step as small as possible.
pub fn deploy(executable: &Path, target_dir: &Path, runner: &dyn Runner) -> Result<PathBuf> {
    let target = target_dir.join(BINARY_NAME);
    let staged = target_dir.join(format!(".{BINARY_NAME}.tmp"));

    match deploy_unprivileged(executable, &staged, &target) {
        Ok(()) => {
            info!("installed {}", target.display());
            return Ok(target);
        }
        Err(e) if escalation_worthwhile(&e) => {
            debug!("unprivileged deploy failed ({e}), escalating");
        }
        Err(e) => return Err(e.into()),
    }

    deploy_elevated(executable, &staged, &target, target_dir, runner)?;
    info!("installed {} (elevated)", target.display());
    Ok(target)
}

fn deploy_unprivileged(executable: &Path, staged: &Path, target: &Path) -> std::io::Result<()> {
    fs::copy(executable, staged)?;

    let finalize = || -> std::io::Result<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(staged)?.permissions();
            perms.set_mode(0o755);
            fs::set_permissions(staged, perms)?;
        }
        fs::rename(staged, target)
    };

    let result = finalize();
    if result.is_err() {
        // the staged copy must not outlive a failed deploy
        let _ = fs::remove_file(staged);
    }
    result
}

fn escalation_worthwhile(e: &std::io::Error) -> bool {
    matches!(e.kind(), ErrorKind::PermissionDenied | ErrorKind::NotFound)
}

fn deploy_elevated(
    executable: &Path,
    staged: &Path,
    target: &Path,
    target_dir: &Path,
    runner: &dyn Runner,
) -> Result<()> {
    let steps = [
        Action::new("mkdir")
            .args(["-p".to_string(), target_dir.display().to_string()])
            .elevated(),
        Action::new("cp")
            .args([
                executable.display().to_string(),
                staged.display().to_string(),
            ])
            .elevated(),
        Action::new("chmod")
            .args(["755".to_string(), staged.display().to_string()])
            .elevated(),
        // rename within the target directory, atomic on the same filesystem
        Action::new("mv")
            .args([
                "-f".to_string(),
                staged.display().to_string(),
                target.display().to_string(),
            ])
            .elevated(),
    ];

    for action in &steps {
        let output = runner.run(action)?;
        ensure_success(action, &output)?;
    }
    Ok(())
}
