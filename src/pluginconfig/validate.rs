//! Cross-checks container image tags against the VM image version.
//!
//! For `imageVersion: 311.129.20190601` the platform fragment is `129`, and
//! every trusted image must then be tagged `v3.11.129`.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, trace};

use super::PluginConfig;

/// Registry whose images must carry the platform version tag.
pub const DEFAULT_TRUSTED_REGISTRY: &str = "registry.access.redhat.com/openshift3";

static TAG_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r":(v3\.11\.(\d+))").expect("tag pattern is a valid regex")
});

/// Errors produced by [`validate`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// `imageVersion` has fewer than two dot-separated components.
    #[error("{plugin_version}] ImageVersion {image_version} has no '.'")]
    MalformedImageVersion {
        /// Key under `versions`.
        plugin_version: String,
        /// The offending value.
        image_version: String,
    },

    /// A trusted image tag disagrees with the VM image version.
    #[error("{0}")]
    Mismatch(Mismatch),

    /// The trusted registry substring is blank and would match every image.
    #[error("trusted registry must not be empty")]
    EmptyTrustedRegistry,
}

/// A trusted image whose tag does not match its plugin version's VM image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    /// Key under `versions`.
    pub plugin_version: String,
    /// Component name under `images`.
    pub image: String,
    /// The full `imageVersion` value.
    pub image_version: String,
    /// The container tag found on the image, e.g. `v3.11.9`.
    pub tag: String,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}] VM version {} and container tag {} do not match",
            self.plugin_version, self.image_version, self.tag
        )
    }
}

/// A `:v3.11.<digits>` tag found in an image reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagMatch<'a> {
    /// Whole tag without the leading colon, e.g. `v3.11.129`.
    pub tag: &'a str,
    /// Captured digit group, e.g. `129`.
    pub minor: &'a str,
}

/// Which images are subject to the check and how their tags are recognised.
#[derive(Debug, Clone)]
pub struct CheckRules {
    trusted_registry: String,
    tag_pattern: Regex,
}

impl Default for CheckRules {
    fn default() -> Self {
        Self {
            trusted_registry: DEFAULT_TRUSTED_REGISTRY.to_owned(),
            tag_pattern: TAG_PATTERN.clone(),
        }
    }
}

impl CheckRules {
    /// Rules using the standard tag pattern and the given trusted registry substring.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyTrustedRegistry`] when the substring is
    /// empty or whitespace only.
    pub fn with_registry(trusted_registry: impl Into<String>) -> Result<Self, ValidationError> {
        let trusted_registry = trusted_registry.into();
        if trusted_registry.trim().is_empty() {
            return Err(ValidationError::EmptyTrustedRegistry);
        }
        Ok(Self {
            trusted_registry,
            tag_pattern: TAG_PATTERN.clone(),
        })
    }

    /// The trusted registry substring.
    pub fn trusted_registry(&self) -> &str {
        &self.trusted_registry
    }

    /// Whether `reference` comes from the trusted registry.
    pub fn is_trusted(&self, reference: &str) -> bool {
        reference.contains(&self.trusted_registry)
    }

    /// Find the version tag in an image reference, if it has one.
    pub fn container_tag<'a>(&self, reference: &'a str) -> Option<TagMatch<'a>> {
        let caps = self.tag_pattern.captures(reference)?;
        Some(TagMatch {
            tag: caps.get(1)?.as_str(),
            minor: caps.get(2)?.as_str(),
        })
    }
}

/// Second dot-separated component of an `imageVersion`, or `None` when there is none.
pub fn platform_version_fragment(image_version: &str) -> Option<&str> {
    image_version.split('.').nth(1)
}

/// Walk every plugin version and image, stopping at the first problem.
///
/// Images outside the trusted registry and images without a `:v3.11.<digits>`
/// tag are skipped.
///
/// # Errors
///
/// Returns [`ValidationError::MalformedImageVersion`] for an `imageVersion`
/// without a `.`, or [`ValidationError::Mismatch`] for the first trusted image
/// whose tag disagrees with its platform fragment.
pub fn validate(config: &PluginConfig, rules: &CheckRules) -> Result<(), ValidationError> {
    for (plugin_version, version) in &config.versions {
        let fragment = platform_version_fragment(&version.image_version).ok_or_else(|| {
            ValidationError::MalformedImageVersion {
                plugin_version: plugin_version.clone(),
                image_version: version.image_version.clone(),
            }
        })?;

        for (image, reference) in &version.images {
            if !rules.is_trusted(reference) {
                trace!(%plugin_version, %image, "untrusted registry, skipped");
                continue;
            }
            let Some(tag) = rules.container_tag(reference) else {
                trace!(%plugin_version, %image, "no version tag, skipped");
                continue;
            };
            if tag.minor != fragment {
                return Err(ValidationError::Mismatch(Mismatch {
                    plugin_version: plugin_version.clone(),
                    image: image.clone(),
                    image_version: version.image_version.clone(),
                    tag: tag.tag.to_owned(),
                }));
            }
        }

        debug!(%plugin_version, images = version.images.len(), "plugin version consistent");
    }

    Ok(())
}
