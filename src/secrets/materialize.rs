//! Writes a [`SecretDocument`] to disk, one file per key.

use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info};

use super::{KeyPolicy, SecretDocument, SecretsError};

/// Paths written by a [`Materializer::materialize`] run, in key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterializeReport {
    /// Every file that was written.
    pub written: Vec<PathBuf>,
}

impl MaterializeReport {
    /// Number of files written.
    pub fn len(&self) -> usize {
        self.written.len()
    }

    /// Whether nothing was written.
    pub fn is_empty(&self) -> bool {
        self.written.is_empty()
    }
}

/// Writes secret values under a base directory.
#[derive(Debug, Clone)]
pub struct Materializer {
    base_dir: PathBuf,
    policy: KeyPolicy,
    private_files: bool,
}

impl Materializer {
    /// Materializer for `base_dir` with the nested key policy and `0600` files.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            policy: KeyPolicy::default(),
            private_files: true,
        }
    }

    /// Use `policy` for keys containing path separators.
    #[must_use]
    pub fn with_policy(mut self, policy: KeyPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Toggle restricting written files to owner read/write.
    #[must_use]
    pub fn with_private_files(mut self, private_files: bool) -> Self {
        self.private_files = private_files;
        self
    }

    /// Directory secrets are written under.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Write every entry of `document` to `<base_dir>/<key>`.
    ///
    /// All keys are resolved and checked against each other before the first
    /// write, so an invalid key, two keys naming the same file, or a key whose
    /// parent directory is another key's file writes nothing. Filesystem state
    /// is not consulted up front: an existing file where a directory is needed
    /// fails mid-way. Existing files are overwritten and existing directories
    /// are reused. A failed write leaves the files written so far in place.
    ///
    /// With private files on, new files are created with mode `0600` and
    /// existing files are narrowed to it.
    ///
    /// # Errors
    ///
    /// Returns an error for a key rejected by the policy or conflicting with
    /// another key, or when a directory or file cannot be created.
    pub fn materialize(&self, document: &SecretDocument) -> Result<MaterializeReport, SecretsError> {
        let targets = document
            .iter()
            .map(|(key, value)| {
                resolve_secret_path(&self.base_dir, key, self.policy).map(|path| (key, path, value))
            })
            .collect::<Result<Vec<_>, _>>()?;
        reject_conflicting_targets(&targets)?;

        let mut report = MaterializeReport::default();
        for (key, path, value) in targets {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|source| SecretsError::CreateDir {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
            write_secret_file(&path, value.as_bytes(), self.private_files)?;
            if self.private_files {
                enforce_private_file_permissions(&path)?;
            }
            debug!(key, path = %path.display(), "secret written");
            report.written.push(path);
        }

        info!(
            dir = %self.base_dir.display(),
            count = report.len(),
            "secrets materialized"
        );
        Ok(report)
    }
}

/// Reject keys that resolve to the same file, or whose parent directory is
/// another key's file.
fn reject_conflicting_targets(targets: &[(&str, PathBuf, &str)]) -> Result<(), SecretsError> {
    let mut files = BTreeSet::new();
    for (key, path, _) in targets {
        if !files.insert(path.as_path()) {
            return Err(SecretsError::InvalidKey {
                key: (*key).to_owned(),
                reason: "resolves to the same file as another key",
            });
        }
    }
    for (key, path, _) in targets {
        if path.ancestors().skip(1).any(|dir| files.contains(dir)) {
            return Err(SecretsError::InvalidKey {
                key: (*key).to_owned(),
                reason: "another key names one of its parent directories",
            });
        }
    }
    Ok(())
}

/// Create or truncate `path` and write `contents`. New files are created
/// with mode `0600` when `private` is set on unix.
fn write_secret_file(path: &Path, contents: &[u8], private: bool) -> Result<(), SecretsError> {
    let write_error = |source: std::io::Error| SecretsError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    if private {
        use std::os::unix::fs::OpenOptionsExt;

        options.mode(0o600);
    }
    #[cfg(not(unix))]
    let _ = private;

    let mut file = options.open(path).map_err(write_error)?;
    file.write_all(contents).map_err(write_error)?;
    Ok(())
}

/// Resolve `key` to a file path under `base`.
///
/// `.` components are dropped and `..` is allowed as long as it stays inside
/// `base`. Filesystem state is not consulted.
///
/// # Errors
///
/// Returns [`SecretsError::InvalidKey`] for empty or absolute keys, keys that
/// escape `base` or name `base` itself, and, under [`KeyPolicy::Flat`], keys
/// containing a path separator.
pub fn resolve_secret_path(base: &Path, key: &str, policy: KeyPolicy) -> Result<PathBuf, SecretsError> {
    let invalid = |reason| SecretsError::InvalidKey {
        key: key.to_owned(),
        reason,
    };

    if key.is_empty() {
        return Err(invalid("key is empty"));
    }
    if policy == KeyPolicy::Flat && key.chars().any(std::path::is_separator) {
        return Err(invalid("path separators are not allowed by the flat key policy"));
    }

    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
    for component in Path::new(key).components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if parts.pop().is_none() {
                    return Err(invalid("key escapes the output directory"));
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(invalid("absolute paths are not allowed"));
            }
        }
    }
    if parts.is_empty() {
        return Err(invalid("key does not name a file"));
    }

    let mut resolved = base.to_path_buf();
    resolved.extend(parts);
    Ok(resolved)
}

/// Restrict `path` to owner read/write where the platform supports it.
///
/// # Errors
///
/// Returns an error if the permissions cannot be updated.
pub fn enforce_private_file_permissions(path: &Path) -> Result<(), SecretsError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|source| {
            SecretsError::Permissions {
                path: path.to_path_buf(),
                source,
            }
        })?;
    }
    #[cfg(not(unix))]
    let _ = path;

    Ok(())
}
