//! Permission records — field-level allow/disallow grants.
//!
//! A permission grants or revokes one kind of access (view, edit, action)
//! to one target path, optionally scoped by condition tags that must all be
//! present in the request context for the permission to apply.

use crate::error::RealmError;
use crate::target::Target;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The category of access a permission covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionKind {
    View,
    Edit,
    Action,
}

impl PermissionKind {
    /// Whether a permission of this kind applies to a request of
    /// `requested` kind. Edit implies view; action stands alone.
    pub fn qualifies(self, requested: PermissionKind) -> bool {
        match requested {
            PermissionKind::View => matches!(self, PermissionKind::View | PermissionKind::Edit),
            PermissionKind::Edit => self == PermissionKind::Edit,
            PermissionKind::Action => self == PermissionKind::Action,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PermissionKind::View => "view",
            PermissionKind::Edit => "edit",
            PermissionKind::Action => "action",
        }
    }
}

impl fmt::Display for PermissionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermissionKind {
    type Err = RealmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "view" => Ok(PermissionKind::View),
            "edit" => Ok(PermissionKind::Edit),
            "action" => Ok(PermissionKind::Action),
            other => Err(RealmError::InvalidTarget(format!(
                "unknown permission kind: {other}"
            ))),
        }
    }
}

/// Whether a permission grants or revokes its target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionEffect {
    Allow,
    Disallow,
}

impl fmt::Display for PermissionEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionEffect::Allow => f.write_str("allow"),
            PermissionEffect::Disallow => f.write_str("disallow"),
        }
    }
}

/// A field-level permission grant.
///
/// Records are immutable once stored; precedence between conflicting
/// records is computed at resolution time, not kept in the store.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permission {
    pub kind: PermissionKind,
    pub effect: PermissionEffect,
    pub target: Target,
    /// Condition tags; every tag must be present in the request context for
    /// the permission to apply. Empty matches any context.
    #[serde(default)]
    pub condition: Vec<String>,
}

impl Permission {
    pub fn new(kind: PermissionKind, effect: PermissionEffect, target: Target) -> Self {
        Self {
            kind,
            effect,
            target,
            condition: Vec::new(),
        }
    }

    /// An allow permission with no conditions.
    pub fn allow(kind: PermissionKind, target: Target) -> Self {
        Self::new(kind, PermissionEffect::Allow, target)
    }

    /// A disallow permission with no conditions.
    pub fn disallow(kind: PermissionKind, target: Target) -> Self {
        Self::new(kind, PermissionEffect::Disallow, target)
    }

    /// Attach condition tags.
    pub fn with_condition<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.condition = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_allow(&self) -> bool {
        self.effect == PermissionEffect::Allow
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} permission to {} {} at {:?}",
            match self.effect {
                PermissionEffect::Allow => "Allow",
                PermissionEffect::Disallow => "Disallow",
            },
            self.kind,
            self.target,
            self.condition,
        )
    }
}
