//! Settings loading.
//!
//! Loads `hacktools.toml` (or `$HACKTOOLS_CONFIG_PATH`) with per-section
//! defaults, then applies environment overrides. Command-line flags are
//! applied on top by the binary.
//!
//! Precedence: flags > env vars > settings file > defaults.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use crate::pluginconfig::{CheckRules, DEFAULT_PLUGINCONFIG_PATH, DEFAULT_TRUSTED_REGISTRY};
use crate::secrets::{KeyPolicy, DEFAULT_SECRETS_DIR, DEFAULT_SECRETS_INPUT};

/// Default settings file name, looked up in the working directory.
pub const DEFAULT_SETTINGS_FILE: &str = "hacktools.toml";

/// Environment variable naming an alternative settings file.
pub const SETTINGS_PATH_ENV: &str = "HACKTOOLS_CONFIG_PATH";

/// Top-level settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Console logging.
    pub logging: LoggingSettings,
    /// Version consistency check.
    pub pluginconfig: PluginConfigSettings,
    /// Secret materialization.
    pub secrets: SecretsSettings,
    /// Env overrides that were set but not applied. Reported by the binary
    /// once logging is up.
    #[serde(skip)]
    pub ignored_overrides: Vec<IgnoredOverride>,
}

/// An environment override that was present but rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoredOverride {
    /// Environment variable name.
    pub var: &'static str,
    /// The rejected value.
    pub value: String,
    /// Why it was rejected.
    pub reason: String,
}

/// Console logging settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Filter used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_owned(),
        }
    }
}

/// Settings for `verify-pluginconfig`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PluginConfigSettings {
    /// Plugin configuration YAML to check.
    pub path: PathBuf,
    /// Registry substring whose images are checked.
    pub trusted_registry: String,
}

impl Default for PluginConfigSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_PLUGINCONFIG_PATH),
            trusted_registry: DEFAULT_TRUSTED_REGISTRY.to_owned(),
        }
    }
}

/// Settings for `materialize-secrets`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SecretsSettings {
    /// Flat JSON secret document.
    pub input: PathBuf,
    /// Directory the secret files are written under.
    pub output_dir: PathBuf,
    /// Treatment of keys containing path separators.
    pub key_policy: KeyPolicy,
    /// Restrict written files to `0600`.
    pub private_files: bool,
}

impl Default for SecretsSettings {
    fn default() -> Self {
        Self {
            input: PathBuf::from(DEFAULT_SECRETS_INPUT),
            output_dir: PathBuf::from(DEFAULT_SECRETS_DIR),
            key_policy: KeyPolicy::default(),
            private_files: true,
        }
    }
}

impl Settings {
    /// Load settings with precedence env vars > settings file > defaults.
    ///
    /// `explicit` takes priority over `$HACKTOOLS_CONFIG_PATH` and the default
    /// file name. A missing default file yields defaults; a missing explicit
    /// file is an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings file exists but cannot be read or parsed.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        Self::load_with(explicit, |key| std::env::var(key).ok())
    }

    /// Same as [`Settings::load`] with a custom env resolver (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the settings file exists but cannot be read or parsed.
    pub fn load_with(
        explicit: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<Self> {
        let mut settings = match explicit {
            Some(path) => Self::load_from_file(path)?,
            None => {
                let path = settings_path_with(&env);
                match std::fs::read_to_string(&path) {
                    Ok(contents) => Self::from_toml(&contents).with_context(|| {
                        format!("failed to parse settings at {}", path.display())
                    })?,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
                    Err(e) => {
                        return Err(anyhow::anyhow!(
                            "failed to read settings at {}: {e}",
                            path.display()
                        ))
                    }
                }
            }
        };
        settings.apply_overrides(env);
        Ok(settings)
    }

    /// Load from a settings file only, no env overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read settings at {}: {e}", path.display()))?;
        Self::from_toml(&contents)
            .with_context(|| format!("failed to parse settings at {}", path.display()))
    }

    /// Parse a TOML string into settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or has unexpected types.
    pub fn from_toml(toml_str: &str) -> anyhow::Result<Self> {
        let settings: Settings = toml::from_str(toml_str).context("failed to parse settings TOML")?;
        Ok(settings)
    }

    /// Apply environment variable overrides (env > file > defaults).
    ///
    /// Invalid values leave the current setting alone and are recorded in
    /// [`Settings::ignored_overrides`]. Takes a resolver function so tests
    /// avoid mutating the process environment.
    pub fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env("HACKTOOLS_LOG_LEVEL") {
            self.logging.level = v;
        }

        // Version check.
        if let Some(v) = env("HACKTOOLS_PLUGINCONFIG") {
            self.pluginconfig.path = PathBuf::from(v);
        }
        if let Some(v) = env("HACKTOOLS_TRUSTED_REGISTRY") {
            match CheckRules::with_registry(v.as_str()) {
                Ok(_) => self.pluginconfig.trusted_registry = v,
                Err(err) => self.ignored_overrides.push(IgnoredOverride {
                    var: "HACKTOOLS_TRUSTED_REGISTRY",
                    value: v,
                    reason: err.to_string(),
                }),
            }
        }

        // Secrets.
        if let Some(v) = env("HACKTOOLS_SECRETS_INPUT") {
            self.secrets.input = PathBuf::from(v);
        }
        if let Some(v) = env("HACKTOOLS_SECRETS_DIR") {
            self.secrets.output_dir = PathBuf::from(v);
        }
        if let Some(v) = env("HACKTOOLS_KEY_POLICY") {
            match v.parse() {
                Ok(policy) => self.secrets.key_policy = policy,
                Err(reason) => self.ignored_overrides.push(IgnoredOverride {
                    var: "HACKTOOLS_KEY_POLICY",
                    value: v,
                    reason,
                }),
            }
        }
    }
}

/// Resolve the settings file path using a custom env resolver.
///
/// Checks `$HACKTOOLS_CONFIG_PATH` first, then `./hacktools.toml`.
pub fn settings_path_with(env: impl Fn(&str) -> Option<String>) -> PathBuf {
    env(SETTINGS_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE))
}
