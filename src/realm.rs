//! Realm principals and the request-scoped permission session.
//!
//! A [`Realm`] binds an authenticated user to its tenancy context
//! (workspace, organization) and carries the user's grants: direct
//! permission links plus group memberships. One realm stands for "the
//! principal of this request".
//!
//! [`RealmSession`] is the per-request handle. It owns the memoized
//! permission set for exactly one request — sessions are created at the
//! request boundary and dropped with it, so one principal's resolved
//! permissions can never leak into another request.

use crate::backend::{Decision, RealmRegistry};
use crate::error::RealmError;
use crate::permission::Permission;
use crate::store::Context;
use crate::target::AccessRequest;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::OnceCell;

pub type RealmId = u64;
pub type GroupId = u64;
pub type PermissionId = u64;

/// The user a realm binds, with the flags the short-circuits consult.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealmUser {
    pub id: String,
    pub active: bool,
    pub superuser: bool,
}

impl RealmUser {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            active: true,
            superuser: false,
        }
    }

    pub fn superuser(mut self) -> Self {
        self.superuser = true;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

/// A named collection of permission grants.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    pub permissions: Vec<PermissionId>,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            permissions: Vec::new(),
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// The authorization principal: a user plus tenancy context plus grants.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Realm {
    /// Store-assigned id; 0 until first save.
    #[serde(default)]
    pub id: RealmId,
    pub user: RealmUser,
    pub workspace: Option<String>,
    pub organization: Option<String>,
    /// Group memberships (transitively grant the group's permissions).
    #[serde(default)]
    pub groups: Vec<GroupId>,
    /// Direct permission grants.
    #[serde(default)]
    pub grants: Vec<PermissionId>,
}

impl Realm {
    pub fn new(user: RealmUser) -> Self {
        Self {
            id: 0,
            user,
            workspace: None,
            organization: None,
            groups: Vec::new(),
            grants: Vec::new(),
        }
    }

    pub fn with_workspace(mut self, workspace: impl Into<String>) -> Self {
        self.workspace = Some(workspace.into());
        self
    }

    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }
}

impl fmt::Display for Realm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = vec![self.user.id.as_str()];
        if let Some(workspace) = &self.workspace {
            parts.push(workspace);
        }
        if let Some(organization) = &self.organization {
            parts.push(organization);
        }
        f.write_str(&parts.join(" "))
    }
}

/// Request-scoped permission session for one principal.
///
/// Created via [`RealmRegistry::session`] at the request boundary. The
/// realm record and the resolved permission sets are fetched from the
/// grant store at most once per session.
pub struct RealmSession {
    registry: RealmRegistry,
    user_id: String,
    realm: OnceCell<Option<Realm>>,
    direct: OnceCell<Vec<Permission>>,
    group: OnceCell<Vec<Permission>>,
    all: OnceCell<Vec<Permission>>,
}

impl RealmSession {
    pub(crate) fn new(registry: RealmRegistry, user_id: String) -> Self {
        Self {
            registry,
            user_id,
            realm: OnceCell::new(),
            direct: OnceCell::new(),
            group: OnceCell::new(),
            all: OnceCell::new(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn registry(&self) -> &RealmRegistry {
        &self.registry
    }

    /// The realm record for this principal, fetched once per session.
    pub async fn realm(&self) -> Result<Option<&Realm>, RealmError> {
        let realm = self
            .realm
            .get_or_try_init(|| self.registry.store().realm_for_user(&self.user_id))
            .await?;
        Ok(realm.as_ref())
    }

    fn grants_apply(realm: Option<&Realm>) -> Option<&Realm> {
        realm.filter(|r| r.user.active)
    }

    /// Permissions granted directly to the realm. Empty for inactive or
    /// missing principals.
    pub async fn get_direct_permissions(&self) -> Result<&[Permission], RealmError> {
        let permissions = self
            .direct
            .get_or_try_init(|| async {
                match Self::grants_apply(self.realm().await?) {
                    Some(realm) => self.registry.store().direct_permissions(realm.id).await,
                    None => Ok(Vec::new()),
                }
            })
            .await?;
        Ok(permissions)
    }

    /// Permissions granted through group membership. Empty for inactive or
    /// missing principals.
    pub async fn get_group_permissions(&self) -> Result<&[Permission], RealmError> {
        let permissions = self
            .group
            .get_or_try_init(|| async {
                match Self::grants_apply(self.realm().await?) {
                    Some(realm) => self.registry.store().group_permissions(realm.id).await,
                    None => Ok(Vec::new()),
                }
            })
            .await?;
        Ok(permissions)
    }

    /// Union of direct and group permissions, memoized for this session.
    pub async fn get_all_permissions(&self) -> Result<&[Permission], RealmError> {
        let permissions = self
            .all
            .get_or_try_init(|| async {
                let mut union = self.get_direct_permissions().await?.to_vec();
                for permission in self.get_group_permissions().await? {
                    if !union.contains(permission) {
                        union.push(permission.clone());
                    }
                }
                Ok(union)
            })
            .await?;
        Ok(permissions)
    }

    /// Check one typed access request.
    ///
    /// Superusers pass without consulting the store; inactive principals
    /// fail the same way. Otherwise the registry's backend chain decides,
    /// stopping at the first allow or the first hard deny; if every
    /// backend abstains the request is denied.
    pub async fn has_access(
        &self,
        request: &AccessRequest,
        context: &Context,
    ) -> Result<bool, RealmError> {
        if let Some(realm) = self.realm().await? {
            if !realm.user.active {
                tracing::debug!(user = %self.user_id, request = %request, "inactive principal");
                return Ok(false);
            }
            if realm.user.superuser {
                tracing::trace!(user = %self.user_id, request = %request, "superuser");
                return Ok(true);
            }
        }

        for backend in self.registry.backends() {
            match backend.resolve(self, request, context).await? {
                Decision::Allow => {
                    tracing::debug!(user = %self.user_id, request = %request, "allowed");
                    return Ok(true);
                }
                Decision::Deny => {
                    tracing::debug!(user = %self.user_id, request = %request, "denied");
                    return Ok(false);
                }
                Decision::Abstain => {}
            }
        }
        Ok(false)
    }

    /// Check a `"[kind.]namespace.entity.field"` permission string.
    pub async fn has_perm(&self, perm: &str, context: &Context) -> Result<bool, RealmError> {
        let request = AccessRequest::parse(perm)?;
        self.has_access(&request, context).await
    }

    /// True iff every request individually resolves allowed.
    ///
    /// Each target re-runs the full resolution pipeline on its own, so one
    /// target's disallow cannot claim a sibling target's decision.
    pub async fn has_requests(
        &self,
        requests: &[AccessRequest],
        context: &Context,
    ) -> Result<bool, RealmError> {
        for request in requests {
            if !self.has_access(request, context).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// True iff every permission string individually resolves allowed.
    pub async fn has_perms<I, S>(&self, perms: I, context: &Context) -> Result<bool, RealmError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for perm in perms {
            if !self.has_perm(perm.as_ref(), context).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
