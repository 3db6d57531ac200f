//! Error types for realm permission checks.

use std::fmt;

/// Errors that can occur while resolving realm permissions.
#[derive(Debug)]
pub enum RealmError {
    /// A target path could not be parsed (wrong segment count, empty or
    /// wildcarded namespace/entity segment).
    InvalidTarget(String),
    /// A target path parsed but its entity is not known to the schema registry.
    UnknownEntity(String),
    /// The HTTP verb has no permission-kind mapping.
    UnsupportedMethod(String),
    /// Realm is missing a workspace while the config requires one.
    MissingWorkspace,
    /// Realm is missing an organization while the config requires one.
    MissingOrganization,
    /// Invalid configuration.
    InvalidConfig(String),
    /// The grant store failed.
    Store(String),
}

impl fmt::Display for RealmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RealmError::InvalidTarget(target) => write!(f, "invalid target: {target}"),
            RealmError::UnknownEntity(entity) => write!(f, "unknown entity: {entity}"),
            RealmError::UnsupportedMethod(method) => {
                write!(f, "method not allowed: {method}")
            }
            RealmError::MissingWorkspace => write!(f, "workspace value is required"),
            RealmError::MissingOrganization => write!(f, "organization value is required"),
            RealmError::InvalidConfig(msg) => write!(f, "invalid realm config: {msg}"),
            RealmError::Store(msg) => write!(f, "grant store error: {msg}"),
        }
    }
}

impl std::error::Error for RealmError {}
