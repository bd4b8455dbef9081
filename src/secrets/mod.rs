//! Secret document loading and materialization to one file per key.
//!
//! The input is a flat JSON object such as `vault-secrets.json`:
//! `{"alpha": "secret-value-1", "beta": "secret-value-2"}`. Each value is
//! written verbatim to `<output_dir>/<key>`.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;
use tracing::debug;

mod materialize;

pub use materialize::{
    enforce_private_file_permissions, resolve_secret_path, MaterializeReport, Materializer,
};

/// Default secret document, relative to the working directory.
pub const DEFAULT_SECRETS_INPUT: &str = "vault-secrets.json";

/// Default output directory, relative to the working directory.
pub const DEFAULT_SECRETS_DIR: &str = "secrets";

/// Flat secret name to secret value mapping.
#[derive(Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct SecretDocument {
    entries: BTreeMap<String, String>,
}

impl fmt::Debug for SecretDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretDocument")
            .field("keys", &self.entries.keys().collect::<Vec<_>>())
            .field("values", &"[REDACTED]")
            .finish()
    }
}

impl SecretDocument {
    /// Build a document from a key-value map.
    pub fn from_map(entries: BTreeMap<String, String>) -> Self {
        Self { entries }
    }

    /// Parse a JSON document.
    ///
    /// # Errors
    ///
    /// Returns the JSON error if the input is not a flat object of strings.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Value stored under `key`, if any.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Secret names in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of secrets.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the document holds no secrets.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// How secret keys containing path separators are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyPolicy {
    /// `a/b` writes `<output_dir>/a/b`, creating `a/` as needed.
    #[default]
    Nested,
    /// Keys must be plain file names; separators are rejected.
    Flat,
}

impl KeyPolicy {
    /// Lowercase name used in config files and on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Nested => "nested",
            Self::Flat => "flat",
        }
    }
}

impl fmt::Display for KeyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nested" => Ok(Self::Nested),
            "flat" => Ok(Self::Flat),
            other => Err(format!(
                "unknown key policy '{other}' (expected 'nested' or 'flat')"
            )),
        }
    }
}

/// Errors from loading or materializing secrets.
#[derive(Debug, thiserror::Error)]
pub enum SecretsError {
    /// The secret document could not be read.
    #[error("failed to read secret document at {}: {source}", .path.display())]
    Read {
        /// Document path.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// The secret document is not a flat JSON object of strings.
    #[error("failed to parse secret document at {}: {source}", .path.display())]
    Parse {
        /// Document path.
        path: PathBuf,
        /// Underlying JSON failure.
        source: serde_json::Error,
    },

    /// A key cannot be turned into a path under the output directory.
    #[error("invalid secret key '{key}': {reason}")]
    InvalidKey {
        /// The rejected key.
        key: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// A parent directory could not be created.
    #[error("failed to create directory {}: {source}", .path.display())]
    CreateDir {
        /// Directory being created.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// A secret file could not be written.
    #[error("failed to write secret file {}: {source}", .path.display())]
    Write {
        /// File being written.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// Permissions on a written file could not be restricted.
    #[error("failed to set permissions on {}: {source}", .path.display())]
    Permissions {
        /// File whose mode was being changed.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },
}

/// Load a secret document from disk.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a flat JSON object of strings.
pub fn load_secret_document(path: &Path) -> Result<SecretDocument, SecretsError> {
    let contents = std::fs::read_to_string(path).map_err(|source| SecretsError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let document = SecretDocument::from_json(&contents).map_err(|source| SecretsError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), secrets = document.len(), "secret document loaded");
    Ok(document)
}
