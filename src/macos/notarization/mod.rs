//! Notarization workflow for macOS apps
//!
//! Uploads a zipped bundle with `xcrun altool`, polls the service until it
//! reaches a terminal state, then staples the ticket and replaces the
//! original archive with the stapled one.
//!
//! ```no_run
//! # async fn run() -> kodegen_bundler_notarize::Result<()> {
//! use kodegen_bundler_notarize::config::{NotarySettings, OutputConfig};
//! use kodegen_bundler_notarize::macos::notarization::{Credentials, NotarizationRequest, Notarizer};
//! use kodegen_bundler_notarize::process::SystemRunner;
//!
//! let notarizer = Notarizer::new(SystemRunner::new(OutputConfig::default()), NotarySettings::default());
//! let request = NotarizationRequest::new(
//!     "MyApp.app",
//!     Credentials::new("dev@example.com", "app-specific-password"),
//! );
//! let archive = notarizer.notarize(request).await?;
//! # Ok(())
//! # }
//! ```

mod poll;
pub mod response;
mod staple;
mod submit;

pub use poll::{HttpLogFetcher, LogFetcher, Sleeper, TokioSleeper};
pub use response::{NotarizationStatus, parse_log_url, parse_status, parse_ticket};
pub use staple::StapleOutcome;

use super::archive::compress_bundle;
use crate::config::NotarySettings;
use crate::error::{NotarizeError, Result};
use crate::process::{CommandRunner, REDACTED_PASSWORD};
use crate::success;
use std::fmt;
use std::path::{Path, PathBuf};

/// Request identifier issued by the notarization service
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ticket(String);

impl Ticket {
    /// Stand-in used when a dry run skips the real submission
    pub const DRY_RUN: &'static str = "00000000-0000-0000-0000-000000000000";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn dry_run() -> Self {
        Self::new(Self::DRY_RUN)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Ticket {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for Ticket {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Apple ID with an app-specific password
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Fail fast when either half is missing
    pub fn validate(&self) -> Result<()> {
        if self.username.trim().is_empty() {
            return Err(NotarizeError::MissingCredentials(
                "no username provided (use --username or APPLE_ID)".to_string(),
            ));
        }
        if self.password.is_empty() {
            return Err(NotarizeError::MissingCredentials(
                "no password provided (use --password or APPLE_PASSWORD)".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &REDACTED_PASSWORD)
            .finish()
    }
}

/// One run of the submit, poll and staple pipeline
#[derive(Debug, Clone)]
pub struct NotarizationRequest {
    /// `.app` directory, extension-less bundle, or `.zip` archive
    pub artifact: PathBuf,
    pub credentials: Credentials,
    /// Previously issued ticket; when set, submission is skipped
    pub ticket: Option<Ticket>,
}

impl NotarizationRequest {
    pub fn new(artifact: impl Into<PathBuf>, credentials: Credentials) -> Self {
        Self {
            artifact: artifact.into(),
            credentials,
            ticket: None,
        }
    }

    #[must_use]
    pub fn with_ticket(mut self, ticket: impl Into<Ticket>) -> Self {
        self.ticket = Some(ticket.into());
        self
    }
}

/// Drives notarization through a [`CommandRunner`].
///
/// Sleeping and failure-log retrieval are injected so the polling loop can
/// run without wall-clock delays or network access.
pub struct Notarizer<R, S = TokioSleeper, L = HttpLogFetcher> {
    runner: R,
    sleeper: S,
    logs: L,
    settings: NotarySettings,
}

impl<R: CommandRunner> Notarizer<R> {
    pub fn new(runner: R, settings: NotarySettings) -> Self {
        Self::with_services(runner, TokioSleeper, HttpLogFetcher::default(), settings)
    }
}

impl<R, S, L> Notarizer<R, S, L>
where
    R: CommandRunner,
    S: Sleeper,
    L: LogFetcher,
{
    pub fn with_services(runner: R, sleeper: S, logs: L, settings: NotarySettings) -> Self {
        Self {
            runner,
            sleeper,
            logs,
            settings,
        }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn settings(&self) -> &NotarySettings {
        &self.settings
    }

    /// Run the whole pipeline and return the path of the stapled archive.
    pub async fn notarize(&self, request: NotarizationRequest) -> Result<PathBuf> {
        let NotarizationRequest {
            artifact,
            credentials,
            ticket,
        } = request;
        credentials.validate()?;

        let archive = self.prepare_archive(&artifact).await?;

        let ticket = match ticket {
            Some(ticket) => {
                println!("resuming notarization of {ticket}");
                ticket
            }
            None => {
                let bundle_id = self.primary_bundle_id(&artifact, &archive)?;
                self.submit_bundle(&archive, &bundle_id, &credentials)
                    .await?
            }
        };

        println!("waiting for notarization of {ticket}");
        self.wait_for_notarization(&ticket, &credentials).await?;
        self.staple(&archive).await?;

        if !self.runner.dry_run() {
            success!("notarized {}", archive.display());
        }
        Ok(archive)
    }

    /// Zip archives are used as-is; `.app` directories and extension-less
    /// paths are compressed next to themselves first.
    async fn prepare_archive(&self, artifact: &Path) -> Result<PathBuf> {
        match artifact.extension() {
            None => compress_bundle(&self.runner, artifact).await,
            Some(ext) if ext.eq_ignore_ascii_case("zip") => Ok(artifact.to_path_buf()),
            Some(ext) if ext.eq_ignore_ascii_case("app") => {
                compress_bundle(&self.runner, artifact).await
            }
            Some(ext) => Err(NotarizeError::UnsupportedFormat(format!(
                ".{}",
                ext.to_string_lossy()
            ))),
        }
    }

    /// A dry run never creates the archive, so the identifier is read from
    /// the source bundle instead.
    fn primary_bundle_id(&self, artifact: &Path, archive: &Path) -> Result<String> {
        let source = if self.runner.dry_run() && !archive.exists() {
            artifact
        } else {
            archive
        };
        crate::payload::bundle_id_for(source)
    }
}
