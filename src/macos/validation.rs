//! Gatekeeper signature assessment

use crate::error::Result;
use crate::process::{CommandRunner, ToolCommand};
use std::path::Path;

/// Build the `spctl --assess` invocation for `path`.
///
/// Applications are assessed for execution; anything else (frameworks,
/// bare executables) is assessed against its primary signature.
pub fn assess_command(path: &Path, verbosity: u8) -> Result<ToolCommand> {
    let mut cmd = ToolCommand::new("spctl");
    if verbosity > 0 {
        cmd = cmd.arg("--verbose=10");
    }
    cmd = cmd.args(["--assess", "--ignore-cache", "--no-cache"]);
    cmd = if is_app_bundle(path) {
        cmd.args(["--type", "execute"])
    } else {
        cmd.args(["--type", "open", "--context", "context:primary-signature"])
    };
    cmd.path_arg(path)
}

/// Verify the signature of `path`, failing if Gatekeeper rejects it
pub async fn verify_signature<R: CommandRunner>(runner: &R, path: &Path) -> Result<()> {
    log::info!("verifying signature of {}", path.display());
    let cmd = assess_command(path, runner.output().verbosity)?;
    runner.run(&cmd).await
}

pub(crate) fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

pub(crate) fn is_app_bundle(path: &Path) -> bool {
    has_extension(path, "app")
}
