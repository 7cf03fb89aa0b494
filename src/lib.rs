//! Signing, packaging and notarization of macOS app bundles

use std::io::Write;
use termcolor::{BufferWriter, Color, ColorChoice, ColorSpec, WriteColor};

/// Attempt to remove a file or directory, logging warnings on failure.
///
/// This function implements best-effort cleanup:
/// - Succeeds silently when cleanup works
/// - Prints a warning when cleanup fails
/// - Never returns errors
///
/// # Arguments
///
/// * `path` - Path to file or directory to remove
/// * `description` - Human-readable description of what's being cleaned up
pub async fn cleanup_path<P: AsRef<std::path::Path>>(path: P, description: &str) {
    let path = path.as_ref();

    let Ok(metadata) = tokio::fs::symlink_metadata(path).await else {
        return;
    };

    let result = if metadata.is_dir() {
        tokio::fs::remove_dir_all(path).await
    } else {
        tokio::fs::remove_file(path).await
    };

    if let Err(e) = result {
        // Already gone is fine
        if e.kind() != std::io::ErrorKind::NotFound {
            let bufwtr = BufferWriter::stderr(ColorChoice::Auto);
            let mut buffer = bufwtr.buffer();

            let _ = buffer.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)));
            let _ = writeln!(&mut buffer, "⚠️  Warning: Failed to cleanup {description}");
            let _ = buffer.reset();
            let _ = writeln!(&mut buffer, "   Path: {}", path.display());
            let _ = writeln!(&mut buffer, "   Error: {e}");

            if e.kind() == std::io::ErrorKind::PermissionDenied {
                let _ = writeln!(
                    &mut buffer,
                    "   Suggestion: Check file permissions or try: sudo rm -rf {}",
                    path.display()
                );
            } else {
                let _ = writeln!(&mut buffer, "   Suggestion: Manual cleanup may be needed");
            }

            let _ = bufwtr.print(&buffer);
        }
    }
}

pub mod config;
pub mod error;
pub mod info_plist;
pub mod payload;
pub mod process;

#[macro_use]
pub mod macos;

// Re-export common types
pub use config::{FileConfig, NotarySettings, OutputConfig};
pub use error::{NotarizeError, Result};
pub use macos::{
    Credentials, NotarizationRequest, Notarizer, SignOptions, Ticket, ZipOptions, sign_bundle,
    zip_bundle,
};
pub use process::{CommandRunner, SystemRunner, ToolCommand};
