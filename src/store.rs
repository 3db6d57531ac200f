//! Grant store — where permission records live, and the query layer the
//! resolution pipeline runs against.
//!
//! [`GrantStore`] is the async boundary to the host's persistent store; one
//! batched lookup per resolution call, never one per target. [`MemoryStore`]
//! is the provided dashmap-backed implementation, also used as the write
//! surface for admin tooling and the legacy migration.
//!
//! [`filter_by_targets`] and [`filter_by_context`] are the pure query
//! helpers: exact string matching after wildcard/ancestor expansion, and
//! condition-tag containment.

use crate::config::RealmConfig;
use crate::error::RealmError;
use crate::permission::Permission;
use crate::realm::{Group, GroupId, PermissionId, Realm, RealmId, RealmUser};
use crate::schema::SchemaRegistry;
use crate::target::Target;
use dashmap::DashMap;
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};

/// Boxed future returned by [`GrantStore`] methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, RealmError>> + Send + 'a>>;

// ── Context ────────────────────────────────────────────────────────────

/// One value in a request context: a tag, or a nested group of values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContextValue {
    Tag(String),
    Group(Vec<ContextValue>),
}

impl From<&str> for ContextValue {
    fn from(tag: &str) -> Self {
        ContextValue::Tag(tag.to_string())
    }
}

impl From<String> for ContextValue {
    fn from(tag: String) -> Self {
        ContextValue::Tag(tag)
    }
}

impl<T: Into<ContextValue>> From<Vec<T>> for ContextValue {
    fn from(values: Vec<T>) -> Self {
        ContextValue::Group(values.into_iter().map(Into::into).collect())
    }
}

/// The contextual tags active for one request.
///
/// Values may nest arbitrarily; matching always happens on the fully
/// flattened tag set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Context {
    values: Vec<ContextValue>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, value: impl Into<ContextValue>) -> Self {
        self.values.push(value.into());
        self
    }

    pub fn from_tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: tags
                .into_iter()
                .map(|t| ContextValue::Tag(t.into()))
                .collect(),
        }
    }

    /// Flatten nested groups into the plain tag set.
    pub fn flatten(&self) -> HashSet<String> {
        let mut tags = HashSet::new();
        let mut queue: Vec<&ContextValue> = self.values.iter().collect();
        while let Some(value) = queue.pop() {
            match value {
                ContextValue::Tag(tag) => {
                    tags.insert(tag.clone());
                }
                ContextValue::Group(values) => queue.extend(values.iter()),
            }
        }
        tags
    }
}

// ── Query helpers ──────────────────────────────────────────────────────

/// Keep permissions whose condition tags are all present in the flattened
/// context. An empty condition matches any context.
pub fn filter_by_context(permissions: &[Permission], context: &Context) -> Vec<Permission> {
    let tags = context.flatten();
    permissions
        .iter()
        .filter(|p| p.condition.iter().all(|c| tags.contains(c)))
        .cloned()
        .collect()
}

/// Keep permissions matching any requested target, its one-level ancestor
/// equivalents, or their wildcard forms.
///
/// Matching is exact equality after expansion; a requested target that
/// does not resolve against the registry still matches literally, just
/// without ancestor expansion.
pub fn filter_by_targets(
    permissions: &[Permission],
    targets: &[Target],
    registry: &dyn SchemaRegistry,
) -> Vec<Permission> {
    let mut wanted: HashSet<Target> = HashSet::new();
    for target in targets {
        wanted.insert(target.clone());
        for parent in registry.collect_parents(&target.entity_key(), Some(1)) {
            match target.on_entity(&parent) {
                Ok(equivalent) => {
                    wanted.insert(equivalent);
                }
                Err(err) => {
                    tracing::warn!(target = %target, parent = %parent, error = %err,
                        "skipping ancestor expansion");
                }
            }
        }
    }
    let wildcards: Vec<Target> = wanted.iter().map(Target::to_wildcard).collect();
    wanted.extend(wildcards);

    permissions
        .iter()
        .filter(|p| wanted.contains(&p.target))
        .cloned()
        .collect()
}

// ── GrantStore ─────────────────────────────────────────────────────────

/// Async boundary to the host's persistent grant store.
///
/// Only the read operations the resolution pipeline needs are part of the
/// trait; writes (admin tooling, migration) belong to the concrete store.
pub trait GrantStore: Send + Sync + 'static {
    /// Fetch the realm record bound to a user, if any.
    fn realm_for_user(&self, user_id: &str) -> StoreFuture<'_, Option<Realm>>;

    /// Permissions granted directly to the realm.
    fn direct_permissions(&self, realm: RealmId) -> StoreFuture<'_, Vec<Permission>>;

    /// Permissions granted through the realm's group memberships.
    fn group_permissions(&self, realm: RealmId) -> StoreFuture<'_, Vec<Permission>>;
}

// ── MemoryStore ────────────────────────────────────────────────────────

/// In-memory grant store.
///
/// Backs tests and single-process deployments, and doubles as the write
/// surface for the legacy migration. Identifiers are store-assigned.
pub struct MemoryStore {
    config: RealmConfig,
    permissions: DashMap<PermissionId, Permission>,
    groups: DashMap<GroupId, Group>,
    realms: DashMap<RealmId, Realm>,
    next_id: AtomicU64,
}

impl MemoryStore {
    pub fn new(config: RealmConfig) -> Self {
        Self {
            config,
            permissions: DashMap::new(),
            groups: DashMap::new(),
            realms: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    // ── Permissions ────────────────────────────────────────────────────

    pub fn create_permission(&self, permission: Permission) -> PermissionId {
        let id = self.allocate_id();
        self.permissions.insert(id, permission);
        id
    }

    /// Find a record equal on (kind, effect, target, condition) or create
    /// one. Returns the id and whether it was created.
    pub fn get_or_create_permission(&self, permission: &Permission) -> (PermissionId, bool) {
        if let Some(existing) = self
            .permissions
            .iter()
            .find(|entry| entry.value() == permission)
        {
            return (*existing.key(), false);
        }
        (self.create_permission(permission.clone()), true)
    }

    pub fn permission(&self, id: PermissionId) -> Option<Permission> {
        self.permissions.get(&id).map(|p| p.clone())
    }

    pub fn delete_permission(&self, id: PermissionId) {
        self.permissions.remove(&id);
        for mut group in self.groups.iter_mut() {
            group.permissions.retain(|p| *p != id);
        }
        for mut realm in self.realms.iter_mut() {
            realm.grants.retain(|p| *p != id);
        }
    }

    // ── Groups ─────────────────────────────────────────────────────────

    pub fn create_group(&self, name: impl Into<String>) -> GroupId {
        let id = self.allocate_id();
        self.groups.insert(id, Group::new(name));
        id
    }

    pub fn get_or_create_group(&self, name: &str) -> (GroupId, bool) {
        if let Some((id, _)) = self.group_by_name(name) {
            return (id, false);
        }
        (self.create_group(name), true)
    }

    /// Natural-key lookup by group name.
    pub fn group_by_name(&self, name: &str) -> Option<(GroupId, Group)> {
        self.groups
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| (*entry.key(), entry.value().clone()))
    }

    pub fn grant_to_group(&self, group: GroupId, permission: PermissionId) -> Result<(), RealmError> {
        let mut entry = self
            .groups
            .get_mut(&group)
            .ok_or_else(|| RealmError::Store(format!("no group {group}")))?;
        if !entry.permissions.contains(&permission) {
            entry.permissions.push(permission);
        }
        Ok(())
    }

    // ── Realms ─────────────────────────────────────────────────────────

    /// Persist a realm, enforcing the workspace/organization requirements
    /// from the config. Assigns an id on first save.
    pub fn save_realm(&self, mut realm: Realm) -> Result<RealmId, RealmError> {
        if self.config.require_workspace && realm.workspace.is_none() {
            return Err(RealmError::MissingWorkspace);
        }
        if self.config.require_organization && realm.organization.is_none() {
            return Err(RealmError::MissingOrganization);
        }
        if realm.id == 0 {
            realm.id = self.allocate_id();
        }
        let id = realm.id;
        self.realms.insert(id, realm);
        Ok(id)
    }

    pub fn get_or_create_realm(&self, user: RealmUser) -> Result<(RealmId, bool), RealmError> {
        if let Some(existing) = self.realms.iter().find(|entry| entry.user.id == user.id) {
            return Ok((*existing.key(), false));
        }
        Ok((self.save_realm(Realm::new(user))?, true))
    }

    pub fn realm(&self, id: RealmId) -> Option<Realm> {
        self.realms.get(&id).map(|r| r.clone())
    }

    pub fn grant_to_realm(&self, realm: RealmId, permission: PermissionId) -> Result<(), RealmError> {
        let mut entry = self
            .realms
            .get_mut(&realm)
            .ok_or_else(|| RealmError::Store(format!("no realm {realm}")))?;
        if !entry.grants.contains(&permission) {
            entry.grants.push(permission);
        }
        Ok(())
    }

    pub fn add_to_group(&self, realm: RealmId, group: GroupId) -> Result<(), RealmError> {
        if !self.groups.contains_key(&group) {
            return Err(RealmError::Store(format!("no group {group}")));
        }
        let mut entry = self
            .realms
            .get_mut(&realm)
            .ok_or_else(|| RealmError::Store(format!("no realm {realm}")))?;
        if !entry.groups.contains(&group) {
            entry.groups.push(group);
        }
        Ok(())
    }

    fn collect_permissions(&self, ids: &[PermissionId]) -> Vec<Permission> {
        ids.iter()
            .filter_map(|id| self.permission(*id))
            .collect()
    }
}

impl GrantStore for MemoryStore {
    fn realm_for_user(&self, user_id: &str) -> StoreFuture<'_, Option<Realm>> {
        let realm = self
            .realms
            .iter()
            .find(|entry| entry.user.id == user_id)
            .map(|entry| entry.value().clone());
        Box::pin(std::future::ready(Ok(realm)))
    }

    fn direct_permissions(&self, realm: RealmId) -> StoreFuture<'_, Vec<Permission>> {
        let permissions = match self.realm(realm) {
            Some(record) => self.collect_permissions(&record.grants),
            None => Vec::new(),
        };
        Box::pin(std::future::ready(Ok(permissions)))
    }

    fn group_permissions(&self, realm: RealmId) -> StoreFuture<'_, Vec<Permission>> {
        let mut permissions = Vec::new();
        if let Some(record) = self.realm(realm) {
            let mut seen: HashSet<PermissionId> = HashSet::new();
            for group_id in &record.groups {
                if let Some(group) = self.groups.get(group_id) {
                    for permission_id in &group.permissions {
                        if seen.insert(*permission_id) {
                            if let Some(permission) = self.permission(*permission_id) {
                                permissions.push(permission);
                            }
                        }
                    }
                }
            }
        }
        Box::pin(std::future::ready(Ok(permissions)))
    }
}
