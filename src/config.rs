//! Configuration for the realm permission layer.

use crate::error::RealmError;
use serde::Deserialize;

fn default_require_workspace() -> bool {
    false
}
fn default_require_organization() -> bool {
    false
}
fn default_max_field_depth() -> usize {
    3
}

/// Configuration for realm records and request gating.
///
/// Can be deserialized from the host application's config file.
/// All fields have defaults.
///
/// ```yaml
/// realm:
///   require_workspace: true      # default: false
///   require_organization: false  # default: false
///   max_field_depth: 3           # default: 3
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RealmConfig {
    /// Whether saving a realm without a workspace fails. Default: false.
    #[serde(default = "default_require_workspace")]
    pub require_workspace: bool,
    /// Whether saving a realm without an organization fails. Default: false.
    #[serde(default = "default_require_organization")]
    pub require_organization: bool,
    /// Maximum nesting depth walked when collecting targets from a
    /// serializer field tree. Default: 3.
    #[serde(default = "default_max_field_depth")]
    pub max_field_depth: usize,
}

impl Default for RealmConfig {
    fn default() -> Self {
        Self {
            require_workspace: false,
            require_organization: false,
            max_field_depth: 3,
        }
    }
}

impl RealmConfig {
    /// Create a configuration with all defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Require a workspace on every saved realm.
    pub fn with_required_workspace(mut self) -> Self {
        self.require_workspace = true;
        self
    }

    /// Require an organization on every saved realm.
    pub fn with_required_organization(mut self) -> Self {
        self.require_organization = true;
        self
    }

    /// Set the maximum field-tree nesting depth.
    pub fn with_max_field_depth(mut self, depth: usize) -> Self {
        self.max_field_depth = depth;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), RealmError> {
        if self.max_field_depth == 0 {
            return Err(RealmError::InvalidConfig(
                "max_field_depth must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
