//! Recursive code signing with hardened runtime
//!
//! Nested code must be signed before the bundle that contains it, so the
//! bundle is walked depth-first and every signable item is signed on the way
//! back up.

use super::validation::{has_extension, verify_signature};
use crate::error::{NotarizeError, Result};
use crate::payload::is_executable;
use crate::process::{CommandRunner, ToolCommand};
use crate::verbose;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Directory extensions that are signed as a unit
const SIGNED_DIR_EXTENSIONS: &[&str] = &["app", "framework", "xpc"];

#[derive(Debug, Clone)]
pub struct SignOptions {
    /// Certificate name or hash passed to `codesign --sign`
    pub identity: String,
    pub entitlements: Option<PathBuf>,
}

/// Everything under `root` that needs a signature, innermost first.
///
/// Siblings are visited in file name order and symlinks are never followed.
pub fn signing_order(root: &Path) -> Result<Vec<PathBuf>> {
    let mut order = Vec::new();
    for entry in WalkDir::new(root).contents_first(true).sort_by_file_name() {
        let entry = entry?;
        let file_type = entry.file_type();
        if file_type.is_symlink() {
            continue;
        }

        let path = entry.path();
        let should_sign = if file_type.is_dir() {
            SIGNED_DIR_EXTENSIONS
                .iter()
                .any(|ext| has_extension(path, ext))
        } else {
            has_extension(path, "dylib")
                || path
                    .parent()
                    .and_then(Path::file_name)
                    .is_some_and(|name| name == "Helpers")
                || is_executable(&entry.metadata()?)
        };

        if should_sign {
            order.push(path.to_path_buf());
        }
    }
    Ok(order)
}

/// Build the `codesign` invocation for one item
pub fn codesign_command(path: &Path, options: &SignOptions, verbosity: u8) -> Result<ToolCommand> {
    let mut cmd = ToolCommand::new("codesign");
    if verbosity > 0 {
        cmd = cmd.arg("--verbose");
    }
    cmd = cmd.args(["--force", "--options=runtime", "--timestamp"]);
    if let Some(entitlements) = &options.entitlements {
        cmd = cmd.arg("--entitlements").path_arg(entitlements)?;
    }
    cmd.arg("--sign").arg(options.identity.clone()).path_arg(path)
}

/// Sign a bundle (or single binary) and everything nested inside it, then
/// verify `.app` and `.framework` roots with Gatekeeper.
pub async fn sign_bundle<R: CommandRunner>(
    runner: &R,
    root: &Path,
    options: &SignOptions,
) -> Result<()> {
    if let Some(entitlements) = &options.entitlements
        && !entitlements.exists()
    {
        return Err(NotarizeError::InvalidConfig(format!(
            "Entitlements file not found: {}",
            entitlements.display()
        )));
    }

    let out = runner.output();
    for path in signing_order(root)? {
        let name = path
            .strip_prefix(root)
            .ok()
            .filter(|rel| !rel.as_os_str().is_empty())
            .unwrap_or(root);
        verbose!(out, 1, "signing {}", name.display());
        let cmd = codesign_command(&path, options, out.verbosity)?;
        runner.run(&cmd).await?;
    }

    if has_extension(root, "app") || has_extension(root, "framework") {
        verify_signature(runner, root).await?;
    }
    Ok(())
}
