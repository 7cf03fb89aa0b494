//! Typed lookups over a bundle's `Info.plist`.

use crate::error::{NotarizeError, Result};
use plist::{Dictionary, Value};
use std::io::Cursor;
use std::path::Path;

pub const CF_BUNDLE_IDENTIFIER: &str = "CFBundleIdentifier";
pub const CF_BUNDLE_NAME: &str = "CFBundleName";
pub const CF_BUNDLE_SHORT_VERSION_STRING: &str = "CFBundleShortVersionString";

/// Decoded property list whose root is a dictionary.
#[derive(Debug, Clone)]
pub struct InfoPlist {
    data: Dictionary,
}

impl InfoPlist {
    /// Decode from raw bytes (XML or binary format)
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let value = Value::from_reader(Cursor::new(bytes))
            .map_err(|e| NotarizeError::PlistDecode(e.to_string()))?;
        match value {
            Value::Dictionary(data) => Ok(Self { data }),
            other => Err(NotarizeError::PlistDecode(format!(
                "expected a dictionary at the root, got {}",
                type_name(&other)
            ))),
        }
    }

    pub async fn from_file(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        Self::from_bytes(&bytes)
    }

    /// String value for `key`
    pub fn string(&self, key: &str) -> Result<&str> {
        let value = self.data.get(key).ok_or_else(|| NotarizeError::KeyNotFound {
            key: key.to_string(),
        })?;
        value.as_string().ok_or_else(|| NotarizeError::InvalidType {
            key: key.to_string(),
            expected: "string",
            found: type_name(value),
        })
    }

    pub fn bundle_identifier(&self) -> Result<&str> {
        self.string(CF_BUNDLE_IDENTIFIER)
    }

    pub fn bundle_name(&self) -> Result<&str> {
        self.string(CF_BUNDLE_NAME)
    }

    pub fn bundle_short_version_string(&self) -> Result<&str> {
        self.string(CF_BUNDLE_SHORT_VERSION_STRING)
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Array(_) => "array",
        Value::Dictionary(_) => "dictionary",
        Value::Boolean(_) => "boolean",
        Value::Data(_) => "data",
        Value::Date(_) => "date",
        Value::Real(_) => "real",
        Value::Integer(_) => "integer",
        Value::String(_) => "string",
        Value::Uid(_) => "uid",
        _ => "unknown",
    }
}
