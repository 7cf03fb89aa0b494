//! Ticket stapling and archive replacement

use super::{LogFetcher, Notarizer, Sleeper};
use crate::error::{NotarizeError, Result};
use crate::macos::archive::{compress, extract, staging_path};
use crate::macos::validation::{has_extension, verify_signature};
use crate::process::{CommandRunner, ToolCommand};
use std::path::{Path, PathBuf};

/// What [`Notarizer::staple`] did to the archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StapleOutcome {
    /// The bundle was stapled and the archive at this path replaced
    Stapled(PathBuf),
    /// The payload was a bare executable; it was verified and the archive
    /// left untouched
    VerifiedOnly(PathBuf),
}

impl StapleOutcome {
    pub fn archive(&self) -> &Path {
        match self {
            Self::Stapled(path) | Self::VerifiedOnly(path) => path,
        }
    }
}

enum ExtractedPayload {
    Bundle(PathBuf),
    Executable(PathBuf),
}

/// Find what an archive expanded to: the first `.app` directory, or failing
/// that a lone file. Hidden entries and `__MACOSX` resource forks are ignored.
async fn locate_payload(dir: &Path) -> Result<ExtractedPayload> {
    let mut entries = Vec::new();
    let mut read_dir = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = read_dir.next_entry().await? {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with('.') || name == "__MACOSX" {
            continue;
        }
        entries.push((entry.path(), entry.file_type().await?));
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    if let Some((path, _)) = entries
        .iter()
        .find(|(path, file_type)| file_type.is_dir() && has_extension(path, "app"))
    {
        return Ok(ExtractedPayload::Bundle(path.clone()));
    }
    match entries.as_slice() {
        [(path, file_type)] if file_type.is_file() => Ok(ExtractedPayload::Executable(path.clone())),
        _ => Err(NotarizeError::BundleNotFound(dir.to_path_buf())),
    }
}

fn staple_command(bundle: &Path) -> Result<ToolCommand> {
    ToolCommand::new("xcrun")
        .args(["stapler", "staple"])
        .path_arg(bundle)
}

impl<R, S, L> Notarizer<R, S, L>
where
    R: CommandRunner,
    S: Sleeper,
    L: LogFetcher,
{
    /// Staple the notarization ticket into the bundle inside `archive`,
    /// verify it and swap the archive for a re-packaged copy.
    ///
    /// Work happens in a temporary directory that is removed on every exit
    /// path. The replacement is built beside `archive` and renamed over it.
    pub async fn staple(&self, archive: &Path) -> Result<StapleOutcome> {
        if self.runner.dry_run() {
            return self.staple_dry_run(archive).await;
        }

        let workdir = tempfile::Builder::new().prefix("notarizer").tempdir()?;
        extract(&self.runner, archive, workdir.path()).await?;

        match locate_payload(workdir.path()).await? {
            ExtractedPayload::Bundle(bundle) => {
                self.runner.run(&staple_command(&bundle)?).await?;
                verify_signature(&self.runner, &bundle).await?;
                self.replace_archive(&bundle, archive).await?;
                Ok(StapleOutcome::Stapled(archive.to_path_buf()))
            }
            ExtractedPayload::Executable(binary) => {
                log::info!("{} is not a bundle, skipping staple", binary.display());
                verify_signature(&self.runner, &binary).await?;
                Ok(StapleOutcome::VerifiedOnly(archive.to_path_buf()))
            }
        }
    }

    async fn replace_archive(&self, bundle: &Path, archive: &Path) -> Result<()> {
        let staged = staging_path(archive)?;
        crate::cleanup_path(&staged, "stale staged archive").await;

        let mut result = compress(&self.runner, bundle, &staged).await;
        if result.is_ok() {
            result = tokio::fs::rename(&staged, archive)
                .await
                .map_err(NotarizeError::from);
        }

        if result.is_err() {
            crate::cleanup_path(&staged, "staged archive").await;
        }
        result
    }

    /// Print the commands a real staple would run. Nothing is created.
    async fn staple_dry_run(&self, archive: &Path) -> Result<StapleOutcome> {
        let stem = archive
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| NotarizeError::InvalidConfig("Invalid archive name".to_string()))?;
        let workdir = std::env::temp_dir().join("notarizer.dry-run");
        let bundle = workdir.join(format!("{stem}.app"));
        let staged = staging_path(archive)?;

        extract(&self.runner, archive, &workdir).await?;
        self.runner.run(&staple_command(&bundle)?).await?;
        verify_signature(&self.runner, &bundle).await?;
        compress(&self.runner, &bundle, &staged).await?;
        println!("mv {} {}", staged.display(), archive.display());
        Ok(StapleOutcome::Stapled(archive.to_path_buf()))
    }
}
