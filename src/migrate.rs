//! One-shot migration from a legacy coarse-grained permission model.
//!
//! The legacy model knows only model-level codenames (`add_widget`,
//! `change_widget`, `view_widget`, ...) attached to users and groups.
//! Each codename becomes a wildcard grant: `add_`/`change_`/`delete_`
//! prefixes map to edit, everything else to view. Group and user
//! associations carry over 1:1. The whole run is idempotent — records are
//! matched by (kind, effect, target, condition) and users/groups by
//! natural key, so re-running changes nothing.

use crate::error::RealmError;
use crate::permission::{Permission, PermissionKind};
use crate::realm::RealmUser;
use crate::store::MemoryStore;
use crate::target::Target;

const EDIT_PREFIXES: [&str; 3] = ["add_", "change_", "delete_"];

/// A legacy model-level permission plus its holders.
#[derive(Clone, Debug)]
pub struct LegacyPermission {
    pub codename: String,
    pub app_label: String,
    pub model: String,
    /// Users holding the permission directly.
    pub users: Vec<String>,
    /// Groups holding the permission.
    pub groups: Vec<String>,
}

/// A legacy group and its members.
#[derive(Clone, Debug)]
pub struct LegacyGroup {
    pub name: String,
    pub members: Vec<String>,
}

/// Everything the legacy system knows, captured for one migration run.
#[derive(Clone, Debug, Default)]
pub struct LegacySnapshot {
    pub groups: Vec<LegacyGroup>,
    pub permissions: Vec<LegacyPermission>,
}

/// Counts of records created (not merely found) during a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub permissions_created: usize,
    pub groups_created: usize,
    pub realms_created: usize,
}

/// Map a legacy codename to its permission kind.
fn legacy_kind(codename: &str) -> PermissionKind {
    if EDIT_PREFIXES.iter().any(|p| codename.starts_with(p)) {
        PermissionKind::Edit
    } else {
        PermissionKind::View
    }
}

/// Run the migration against a store. Safe to re-run.
pub fn migrate_legacy(
    store: &MemoryStore,
    snapshot: &LegacySnapshot,
) -> Result<MigrationReport, RealmError> {
    let mut report = MigrationReport::default();

    // Groups first, so permission associations can look them up by name.
    for legacy_group in &snapshot.groups {
        let (_, created) = store.get_or_create_group(&legacy_group.name);
        if created {
            report.groups_created += 1;
        }
    }

    for legacy in &snapshot.permissions {
        let permission = Permission::allow(
            legacy_kind(&legacy.codename),
            Target::wildcard(legacy.app_label.clone(), legacy.model.clone()),
        );
        let (permission_id, created) = store.get_or_create_permission(&permission);
        if created {
            report.permissions_created += 1;
        }

        for user in &legacy.users {
            let (realm_id, created) = store.get_or_create_realm(RealmUser::new(user))?;
            if created {
                report.realms_created += 1;
            }
            store.grant_to_realm(realm_id, permission_id)?;
        }

        for group_name in &legacy.groups {
            let (group_id, created) = store.get_or_create_group(group_name);
            if created {
                report.groups_created += 1;
            }
            store.grant_to_group(group_id, permission_id)?;

            let members = snapshot
                .groups
                .iter()
                .find(|g| &g.name == group_name)
                .map(|g| g.members.as_slice())
                .unwrap_or(&[]);
            for user in members {
                let (realm_id, created) = store.get_or_create_realm(RealmUser::new(user))?;
                if created {
                    report.realms_created += 1;
                }
                store.add_to_group(realm_id, group_id)?;
            }
        }
    }

    tracing::info!(
        permissions = report.permissions_created,
        groups = report.groups_created,
        realms = report.realms_created,
        "legacy permission migration finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RealmConfig;
    use crate::permission::PermissionEffect;

    fn snapshot() -> LegacySnapshot {
        LegacySnapshot {
            groups: vec![LegacyGroup {
                name: "editors".to_string(),
                members: vec!["bob".to_string()],
            }],
            permissions: vec![
                LegacyPermission {
                    codename: "change_widget".to_string(),
                    app_label: "app".to_string(),
                    model: "widget".to_string(),
                    users: vec!["alice".to_string()],
                    groups: vec!["editors".to_string()],
                },
                LegacyPermission {
                    codename: "view_widget".to_string(),
                    app_label: "app".to_string(),
                    model: "widget".to_string(),
                    users: Vec::new(),
                    groups: Vec::new(),
                },
            ],
        }
    }

    #[test]
    fn test_legacy_kind_mapping() {
        assert_eq!(legacy_kind("add_widget"), PermissionKind::Edit);
        assert_eq!(legacy_kind("change_widget"), PermissionKind::Edit);
        assert_eq!(legacy_kind("delete_widget"), PermissionKind::Edit);
        assert_eq!(legacy_kind("view_widget"), PermissionKind::View);
        assert_eq!(legacy_kind("publish_widget"), PermissionKind::View);
    }

    #[test]
    fn test_migrate_creates_grants() {
        let store = MemoryStore::new(RealmConfig::default());
        let report = migrate_legacy(&store, &snapshot()).unwrap();
        assert_eq!(
            report,
            MigrationReport {
                permissions_created: 2,
                groups_created: 1,
                realms_created: 2,
            }
        );

        // alice holds the edit wildcard directly.
        let (realm_id, created) = store.get_or_create_realm(RealmUser::new("alice")).unwrap();
        assert!(!created);
        let realm = store.realm(realm_id).unwrap();
        assert_eq!(realm.grants.len(), 1);
        let granted = store.permission(realm.grants[0]).unwrap();
        assert_eq!(granted.kind, PermissionKind::Edit);
        assert_eq!(granted.effect, PermissionEffect::Allow);
        assert_eq!(granted.target.to_string(), "app.widget.*");

        // bob gets the group membership.
        let (bob_id, created) = store.get_or_create_realm(RealmUser::new("bob")).unwrap();
        assert!(!created);
        let bob = store.realm(bob_id).unwrap();
        assert_eq!(bob.groups.len(), 1);
        let (editors_id, _) = store.group_by_name("editors").unwrap();
        assert_eq!(bob.groups[0], editors_id);
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let store = MemoryStore::new(RealmConfig::default());
        migrate_legacy(&store, &snapshot()).unwrap();
        let second = migrate_legacy(&store, &snapshot()).unwrap();
        assert_eq!(second, MigrationReport::default());
    }
}
