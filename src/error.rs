//! Error types for signing, packaging and notarization.
//!
//! Variants are grouped the way failures surface to the user:
//! pre-condition errors (credentials, artifact format, configuration),
//! payload and response parse errors, remote service errors, and
//! process/IO errors that bubble up unchanged.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, NotarizeError>;

#[derive(Debug, Error)]
pub enum NotarizeError {
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    #[error("can't notarize app in {0} format")]
    UnsupportedFormat(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("could not find Info.plist")]
    InfoPlistNotFound,

    #[error("malformed property list: {0}")]
    PlistDecode(String),

    #[error("key {key:?} not found")]
    KeyNotFound { key: String },

    #[error("key {key:?} has invalid type: expecting value of type {expected}, got {found} instead")]
    InvalidType {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("cannot find ticket in notarization response")]
    TicketNotFound,

    #[error("unexpected output format from altool")]
    UnexpectedFormat,

    #[error("unknown status {0:?}")]
    UnknownStatus(String),

    #[error("app notarization failed")]
    NotarizationFailed,

    #[error("notarization of {ticket} still in progress after {waited_secs}s")]
    Timeout { ticket: String, waited_secs: u64 },

    #[error("couldn't find any .app directories at {}", .0.display())]
    BundleNotFound(PathBuf),

    #[error("{} already exists", .0.display())]
    OutputExists(PathBuf),

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("{command} failed ({status})")]
    CommandFailed {
        command: String,
        status: String,
        /// Combined stdout/stderr, empty when output was not captured
        output: String,
    },

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Directory traversal failed: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Config parsing error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}
