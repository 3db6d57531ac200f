//! Target paths — dotted `namespace.entity.field` keys.
//!
//! A target identifies one field of one entity, or every field of an entity
//! when the field segment is the `*` wildcard. Only the field segment may be
//! wildcarded; namespace and entity are always concrete.

use crate::error::RealmError;
use crate::permission::PermissionKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The wildcard field segment, meaning "all fields of the entity".
pub const WILDCARD: &str = "*";

/// A `namespace.entity.field` access path.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Target {
    namespace: String,
    entity: String,
    field: String,
}

impl Target {
    /// Build a target from its three segments.
    pub fn new(
        namespace: impl Into<String>,
        entity: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            entity: entity.into(),
            field: field.into(),
        }
    }

    /// Build the wildcard target covering every field of an entity.
    pub fn wildcard(namespace: impl Into<String>, entity: impl Into<String>) -> Self {
        Self::new(namespace, entity, WILDCARD)
    }

    /// Parse a dotted path. Exactly three non-empty segments; only the field
    /// segment may be `*`.
    pub fn parse(path: &str) -> Result<Self, RealmError> {
        let mut segments = path.split('.');
        let (namespace, entity, field) = match (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) {
            (Some(ns), Some(entity), Some(field), None) => (ns, entity, field),
            _ => return Err(RealmError::InvalidTarget(path.to_string())),
        };
        if namespace.is_empty() || entity.is_empty() || field.is_empty() {
            return Err(RealmError::InvalidTarget(path.to_string()));
        }
        if namespace.contains('*') || entity.contains('*') {
            return Err(RealmError::InvalidTarget(path.to_string()));
        }
        Ok(Self::new(namespace, entity, field))
    }

    /// Build a target from a qualified `namespace.entity` key plus a field.
    pub fn for_entity(entity_key: &str, field: impl Into<String>) -> Result<Self, RealmError> {
        let (namespace, entity) = entity_key
            .split_once('.')
            .ok_or_else(|| RealmError::InvalidTarget(entity_key.to_string()))?;
        if namespace.is_empty() || entity.is_empty() || entity.contains('.') {
            return Err(RealmError::InvalidTarget(entity_key.to_string()));
        }
        Ok(Self::new(namespace, entity, field))
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    /// The qualified `namespace.entity` key.
    pub fn entity_key(&self) -> String {
        format!("{}.{}", self.namespace, self.entity)
    }

    /// Whether the field segment is the wildcard.
    pub fn is_wildcard(&self) -> bool {
        self.field == WILDCARD
    }

    /// The wildcard form of this target's entity.
    pub fn to_wildcard(&self) -> Target {
        Target::wildcard(self.namespace.clone(), self.entity.clone())
    }

    /// The same field path on another entity.
    pub fn on_entity(&self, entity_key: &str) -> Result<Target, RealmError> {
        Target::for_entity(entity_key, self.field.clone())
    }

    /// Whether this target covers `other`: exact equality, or same entity
    /// when this target is the wildcard.
    pub fn covers(&self, other: &Target) -> bool {
        if self.namespace != other.namespace || self.entity != other.entity {
            return false;
        }
        self.is_wildcard() || self.field == other.field
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.namespace, self.entity, self.field)
    }
}

impl FromStr for Target {
    type Err = RealmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Target::parse(s)
    }
}

impl TryFrom<String> for Target {
    type Error = RealmError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Target::parse(&value)
    }
}

impl From<Target> for String {
    fn from(target: Target) -> Self {
        target.to_string()
    }
}

/// A requested access: a permission kind plus a target.
///
/// The string form may carry a leading kind segment
/// (`"edit.app.widget.name"`); without one the kind defaults to view.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AccessRequest {
    pub kind: PermissionKind,
    pub target: Target,
}

impl AccessRequest {
    pub fn new(kind: PermissionKind, target: Target) -> Self {
        Self { kind, target }
    }

    pub fn view(target: Target) -> Self {
        Self::new(PermissionKind::View, target)
    }

    pub fn edit(target: Target) -> Self {
        Self::new(PermissionKind::Edit, target)
    }

    /// Parse `"[kind.]namespace.entity.field"`.
    pub fn parse(path: &str) -> Result<Self, RealmError> {
        if let Some((head, rest)) = path.split_once('.') {
            if let Ok(kind) = head.parse::<PermissionKind>() {
                return Ok(Self::new(kind, Target::parse(rest)?));
            }
        }
        Ok(Self::view(Target::parse(path)?))
    }
}

impl fmt::Display for AccessRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.kind, self.target)
    }
}

impl FromStr for AccessRequest {
    type Err = RealmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AccessRequest::parse(s)
    }
}
