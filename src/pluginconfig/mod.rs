//! Plugin configuration document and the version consistency check.
//!
//! The document is the `pluginconfig-311.yaml` shape: a top-level `versions`
//! map keyed by plugin version, each entry carrying the VM `imageVersion` and
//! an `images` map of component name to container image reference.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

mod validate;

pub use validate::{platform_version_fragment, validate, CheckRules, Mismatch, TagMatch};
pub use validate::{ValidationError, DEFAULT_TRUSTED_REGISTRY};

/// Default location of the plugin configuration, relative to the working directory.
pub const DEFAULT_PLUGINCONFIG_PATH: &str = "pluginconfig/pluginconfig-311.yaml";

/// Parsed plugin configuration. Only the fields the check needs are modelled.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PluginConfig {
    /// Per plugin version settings, ordered by plugin version.
    #[serde(default)]
    pub versions: BTreeMap<String, VersionConfig>,
}

/// Settings for a single plugin version.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VersionConfig {
    /// VM image version, e.g. `311.129.20190601`.
    #[serde(rename = "imageVersion", default)]
    pub image_version: String,

    /// Component name to container image reference.
    #[serde(default)]
    pub images: BTreeMap<String, String>,
}

impl PluginConfig {
    /// Parse a YAML document.
    ///
    /// # Errors
    ///
    /// Returns the YAML error when the document does not match the expected shape.
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }
}

/// Errors from loading or checking a plugin configuration file.
#[derive(Debug, thiserror::Error)]
pub enum PluginConfigError {
    /// The file could not be read.
    #[error("failed to read plugin config at {}: {source}", .path.display())]
    Read {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// The file is not valid YAML of the expected shape.
    #[error("failed to parse plugin config at {}: {source}", .path.display())]
    Parse {
        /// File that was being parsed.
        path: PathBuf,
        /// Underlying YAML failure.
        source: serde_yaml::Error,
    },

    /// The document is structurally unusable (e.g. a malformed `imageVersion`).
    #[error(transparent)]
    Invalid(ValidationError),
}

/// Result of a completed check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Every trusted image tag agrees with its VM image version.
    Consistent,
    /// The first inconsistency found; the walk stopped there.
    Mismatch(Mismatch),
}

/// Load a plugin configuration from disk.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_plugin_config(path: &Path) -> Result<PluginConfig, PluginConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| PluginConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config = PluginConfig::from_yaml(&contents).map_err(|source| PluginConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(
        path = %path.display(),
        versions = config.versions.len(),
        "plugin config loaded"
    );
    Ok(config)
}

/// Load `path` and run the consistency check against it.
///
/// A version mismatch is reported as [`CheckOutcome::Mismatch`]; everything
/// else that goes wrong is an error.
///
/// # Errors
///
/// Returns an error if the file cannot be loaded or an `imageVersion` is malformed.
pub fn verify_file(path: &Path, rules: &CheckRules) -> Result<CheckOutcome, PluginConfigError> {
    let config = load_plugin_config(path)?;
    match validate(&config, rules) {
        Ok(()) => Ok(CheckOutcome::Consistent),
        Err(ValidationError::Mismatch(mismatch)) => Ok(CheckOutcome::Mismatch(mismatch)),
        Err(err) => Err(PluginConfigError::Invalid(err)),
    }
}
