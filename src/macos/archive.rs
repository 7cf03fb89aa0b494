//! Archive creation and extraction with `ditto`
//!
//! `ditto -c -k` produces the Finder-compatible PKZip layout Apple's
//! notarization service expects; plain `zip` output is a frequent source of
//! rejected submissions.

use super::validation::has_extension;
use crate::config::OutputConfig;
use crate::error::{NotarizeError, Result};
use crate::info_plist::InfoPlist;
use crate::process::{CommandRunner, ToolCommand};
use crate::{verbose, warn};
use std::path::{Path, PathBuf};

/// Options for the `zip` subcommand
#[derive(Debug, Clone, Default)]
pub struct ZipOptions {
    /// Explicit output file; defaults to `<Name>_<Version>[_macOS].zip`
    pub output: Option<PathBuf>,
    pub include_macos_suffix: bool,
    /// Remove the bundle once archived
    pub delete_source: bool,
    /// Overwrite an existing output file
    pub force: bool,
}

/// `<dir>/<stem>.zip` for a bundle at `<dir>/<stem>.app`
pub fn bundle_zip_path(bundle: &Path) -> Result<PathBuf> {
    let stem = bundle
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| NotarizeError::InvalidConfig("Invalid app name".to_string()))?;
    let dir = bundle.parent().unwrap_or(Path::new(""));
    Ok(dir.join(format!("{stem}.zip")))
}

/// Hidden sibling of `archive` used while building its replacement
pub fn staging_path(archive: &Path) -> Result<PathBuf> {
    let name = archive
        .file_name()
        .and_then(|s| s.to_str())
        .ok_or_else(|| NotarizeError::InvalidConfig("Invalid archive name".to_string()))?;
    let dir = archive.parent().unwrap_or(Path::new(""));
    Ok(dir.join(format!(".{name}.stapled")))
}

/// Archive `bundle` into `output`, keeping the bundle directory as the
/// top-level entry
pub async fn compress<R: CommandRunner>(runner: &R, bundle: &Path, output: &Path) -> Result<()> {
    let cmd = ToolCommand::new("ditto")
        .args(["-c", "-k", "--sequesterRsrc", "--keepParent"])
        .path_arg(bundle)?
        .path_arg(output)?;
    runner.run(&cmd).await
}

/// Compress a bundle next to itself, returning the new archive path
pub async fn compress_bundle<R: CommandRunner>(runner: &R, bundle: &Path) -> Result<PathBuf> {
    let zip_path = bundle_zip_path(bundle)?;
    println!(
        "compressing {} to {}",
        bundle.display(),
        zip_path.display()
    );
    compress(runner, bundle, &zip_path).await?;
    Ok(zip_path)
}

/// Expand `archive` into `dest`
pub async fn extract<R: CommandRunner>(runner: &R, archive: &Path, dest: &Path) -> Result<()> {
    let cmd = ToolCommand::new("ditto")
        .args(["-x", "-k"])
        .path_arg(archive)?
        .path_arg(dest)?;
    runner.run(&cmd).await
}

/// Distribution file name derived from the bundle's Info.plist
pub async fn default_output_name(bundle: &Path, include_macos_suffix: bool) -> Result<String> {
    let plist = InfoPlist::from_file(&bundle.join("Contents").join("Info.plist")).await?;
    let name = plist.bundle_name()?;
    let version = plist.bundle_short_version_string()?;
    let suffix = if include_macos_suffix { "_macOS" } else { "" };
    Ok(format!("{name}_{version}{suffix}.zip"))
}

/// Create a distribution zip of `bundle`.
///
/// Honours dry-run for every filesystem change: removal of an existing
/// output, the archive itself and deletion of the source bundle.
pub async fn zip_bundle<R: CommandRunner>(
    runner: &R,
    bundle: &Path,
    options: &ZipOptions,
) -> Result<PathBuf> {
    if !has_extension(bundle, "app") {
        warn!("{} does not look like an app bundle", bundle.display());
    }

    let output = match &options.output {
        Some(path) => path.clone(),
        None => PathBuf::from(default_output_name(bundle, options.include_macos_suffix).await?),
    };
    let out: OutputConfig = runner.output();

    if let Ok(metadata) = tokio::fs::metadata(&output).await
        && !metadata.is_dir()
    {
        if !options.force {
            return Err(NotarizeError::OutputExists(output));
        }
        if out.dry_run {
            println!("rm {}", output.display());
        } else {
            verbose!(out, 1, "removing {}", output.display());
            tokio::fs::remove_file(&output).await.map_err(|e| {
                NotarizeError::Io(std::io::Error::new(
                    e.kind(),
                    format!("error removing {}: {e}", output.display()),
                ))
            })?;
        }
    }

    let cmd = ToolCommand::new("ditto")
        .args(["-c", "-k", "--norsrc", "--sequesterRsrc", "--keepParent"])
        .path_arg(bundle)?
        .path_arg(&output)?;
    runner.run(&cmd).await?;

    if options.delete_source {
        if out.dry_run || out.verbosity > 0 {
            println!("rm -r {}", bundle.display());
        }
        if !out.dry_run {
            tokio::fs::remove_dir_all(bundle).await?;
        }
    }

    Ok(output)
}
