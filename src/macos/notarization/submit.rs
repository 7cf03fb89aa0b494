//! Upload to the notarization service

use super::response::parse_ticket;
use super::{Credentials, LogFetcher, Notarizer, Sleeper, Ticket};
use crate::error::{NotarizeError, Result};
use crate::payload::bundle_id_for;
use crate::process::{CommandRunner, ToolCommand};
use std::path::Path;

pub(super) fn submit_command(
    archive: &Path,
    bundle_id: &str,
    credentials: &Credentials,
    verbosity: u8,
) -> Result<ToolCommand> {
    let mut cmd = ToolCommand::new("xcrun")
        .args(["altool", "--notarize-app", "--primary-bundle-id"])
        .arg(bundle_id)
        .arg("--username")
        .arg(credentials.username.clone())
        .arg("--password")
        .arg(credentials.password.clone())
        .arg("--file")
        .path_arg(archive)?;
    if verbosity > 0 {
        cmd = cmd.arg("--verbose");
    }
    Ok(cmd)
}

impl<R, S, L> Notarizer<R, S, L>
where
    R: CommandRunner,
    S: Sleeper,
    L: LogFetcher,
{
    /// Submit `archive`, reading its bundle identifier from the payload
    pub async fn submit(&self, archive: &Path, credentials: &Credentials) -> Result<Ticket> {
        let bundle_id = bundle_id_for(archive)?;
        self.submit_bundle(archive, &bundle_id, credentials).await
    }

    /// Submit `archive` under `bundle_id` and return the issued ticket.
    ///
    /// `altool` can exit non-zero and still print a usable ticket (for
    /// example when the payload was uploaded before), so a failed exit only
    /// matters when the output holds no ticket either.
    pub async fn submit_bundle(
        &self,
        archive: &Path,
        bundle_id: &str,
        credentials: &Credentials,
    ) -> Result<Ticket> {
        let out = self.runner.output();
        let name = archive.file_name().map_or_else(
            || archive.display().to_string(),
            |n| n.to_string_lossy().into_owned(),
        );
        println!("submitting {name} for notarization...");
        log::info!("primary bundle id {bundle_id}");

        let cmd = submit_command(archive, bundle_id, credentials, out.verbosity)?;
        let output = match self.runner.capture(&cmd).await {
            Ok(output) => output,
            Err(NotarizeError::CommandFailed { status, output, .. }) => {
                log::warn!("altool exited with {status}, looking for a ticket anyway");
                output
            }
            Err(e) => return Err(e),
        };

        if out.dry_run {
            return Ok(Ticket::dry_run());
        }
        parse_ticket(&output)
    }
}
