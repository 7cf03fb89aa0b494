//! Configuration structures for signing and notarization.
//!
//! Runtime knobs (`OutputConfig`, `NotarySettings`) are built once by the
//! binary and handed to components at construction. Persistent defaults can
//! live in a TOML file (`FileConfig`).

use crate::error::{NotarizeError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default signing identity passed to `codesign --sign`
pub const DEFAULT_IDENTITY: &str = "Developer ID";

/// Interval between notarization status queries
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Config file name under `<config_dir>/kodegen/`
pub const CONFIG_FILE_NAME: &str = "notarize.toml";

/// Verbosity and dry-run switches shared by every external invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputConfig {
    /// 0 = quiet, 1 = echo commands, 2+ = chatty
    pub verbosity: u8,
    /// Print commands instead of running them
    pub dry_run: bool,
}

/// Polling behaviour for the notarization status loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotarySettings {
    pub poll_interval: Duration,
    /// Upper bound on total time spent waiting; `None` waits forever
    pub max_wait: Option<Duration>,
}

impl Default for NotarySettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_wait: None,
        }
    }
}

/// On-disk configuration file.
///
/// ```toml
/// [notarize]
/// username = "dev@example.com"
/// poll_interval_secs = 10
/// max_wait_secs = 3600
///
/// [sign]
/// identity = "Developer ID Application: Acme Corp (TEAM123)"
/// entitlements = "~/acme/app.entitlements"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub notarize: NotarizeFileConfig,

    #[serde(default)]
    pub sign: SignFileConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotarizeFileConfig {
    pub username: Option<String>,
    pub poll_interval_secs: Option<u64>,
    pub max_wait_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignFileConfig {
    pub identity: Option<String>,
    pub entitlements: Option<String>,
}

impl FileConfig {
    /// Parse a config file from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        if config.notarize.poll_interval_secs == Some(0) {
            return Err(NotarizeError::InvalidConfig(
                "poll_interval_secs must be greater than zero".to_string(),
            ));
        }
        Ok(config)
    }

    /// Load configuration.
    ///
    /// An explicit path must exist. Without one, the default location is
    /// used when present and an empty config is returned otherwise.
    pub async fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match default_config_path() {
                Some(path) if tokio::fs::try_exists(&path).await.unwrap_or(false) => path,
                _ => return Ok(Self::default()),
            },
        };

        log::debug!("loading config from {}", path.display());
        let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
            NotarizeError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Polling settings with file overrides applied to the defaults
    #[must_use]
    pub fn notary_settings(&self) -> NotarySettings {
        let defaults = NotarySettings::default();
        NotarySettings {
            poll_interval: self
                .notarize
                .poll_interval_secs
                .map_or(defaults.poll_interval, Duration::from_secs),
            max_wait: self.notarize.max_wait_secs.map(Duration::from_secs),
        }
    }

    /// Entitlements path with `~` expanded
    pub fn entitlements_path(&self) -> Result<Option<PathBuf>> {
        self.sign
            .entitlements
            .as_deref()
            .map(|p| expand_tilde_path(p).map(PathBuf::from))
            .transpose()
    }
}

/// `<config_dir>/kodegen/notarize.toml`
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("kodegen").join(CONFIG_FILE_NAME))
}

/// Expand tilde in path, returning error if HOME is not set
///
/// When HOME is unset, shellexpand leaves `~` unchanged, which is detected
/// and reported instead of silently producing a relative path.
pub fn expand_tilde_path(path: &str) -> Result<String> {
    let expanded = shellexpand::tilde(path).to_string();

    if path.starts_with('~') && expanded.starts_with('~') {
        return Err(NotarizeError::InvalidConfig(format!(
            "Could not expand ~ in {path} (HOME environment variable not set).\n\
             Please use an absolute path instead."
        )));
    }

    Ok(expanded)
}
