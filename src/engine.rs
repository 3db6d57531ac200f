//! Permission resolution engine.
//!
//! [`Resolver::apply_permissions`] decides which of the requested targets a
//! candidate permission set allows:
//!
//! 1. Every candidate is cascaded down the entity extension graph — a
//!    permission declared on a base entity is mirrored onto each extending
//!    entity as a synthesized record one `image_level` deeper. Expansion
//!    runs on a work queue to fixpoint, with a per-source visited set so a
//!    miswired registry cannot loop it.
//! 2. Candidates sort ascending by `(image_level, -condition_len,
//!    is_wildcard)`: records on the concrete entity beat inherited ones,
//!    more conditions beat fewer, exact fields beat wildcards.
//! 3. A single pass walks the sorted list against the undecided targets.
//!    The first record to claim a target decides it for good; a disallow
//!    claims without emitting, shadowing anything below it. Whatever no
//!    record claims stays denied.

use crate::permission::{Permission, PermissionKind};
use crate::schema::SchemaRegistry;
use crate::target::Target;
use std::cmp::Reverse;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

/// A candidate permission plus its inheritance-synthesis depth.
#[derive(Clone, Debug)]
struct Ranked {
    permission: Permission,
    image_level: u32,
}

/// Pure resolution engine over a schema registry.
#[derive(Clone)]
pub struct Resolver {
    registry: Arc<dyn SchemaRegistry>,
}

impl Resolver {
    pub fn new(registry: Arc<dyn SchemaRegistry>) -> Self {
        Self { registry }
    }

    /// Resolve the allowed subset of `targets` for the requested `kind`.
    ///
    /// `permissions` is the candidate set, already filtered by context.
    /// Targets with no matching permission are denied by default. The
    /// output preserves decision order and is always a subset of `targets`.
    pub fn apply_permissions(
        &self,
        permissions: &[Permission],
        targets: &[Target],
        kind: PermissionKind,
    ) -> Vec<Target> {
        let ranked = self.expand(permissions);

        let mut undecided: Vec<Target> = Vec::with_capacity(targets.len());
        for target in targets {
            if !undecided.contains(target) {
                undecided.push(target.clone());
            }
        }

        let mut allowed: Vec<Target> = Vec::new();
        for candidate in &ranked {
            if !candidate.permission.kind.qualifies(kind) {
                continue;
            }

            let affected: Vec<Target> = undecided
                .iter()
                .filter(|t| candidate.permission.target.covers(t))
                .cloned()
                .collect();
            if affected.is_empty() {
                continue;
            }

            tracing::trace!(
                permission = %candidate.permission,
                image_level = candidate.image_level,
                claimed = affected.len(),
                "permission claims targets"
            );
            if candidate.permission.is_allow() {
                allowed.extend(affected.iter().cloned());
            }
            undecided.retain(|t| !affected.contains(t));
            if undecided.is_empty() {
                break;
            }
        }

        allowed
    }

    /// Cascade permissions down the extension graph and sort by precedence.
    fn expand(&self, permissions: &[Permission]) -> Vec<Ranked> {
        let mut children_cache: HashMap<String, Vec<String>> = HashMap::new();
        let mut expanded: Vec<Ranked> = Vec::with_capacity(permissions.len());
        // (source index, candidate) pairs; the visited set is per source so
        // diamond-shaped graphs still mirror through every path's entities
        // exactly once.
        let mut queue: VecDeque<(usize, Ranked)> = VecDeque::new();
        let mut visited: Vec<HashSet<String>> = Vec::with_capacity(permissions.len());

        for (index, permission) in permissions.iter().enumerate() {
            let mut seen = HashSet::new();
            seen.insert(permission.target.entity_key());
            visited.push(seen);
            queue.push_back((
                index,
                Ranked {
                    permission: permission.clone(),
                    image_level: 0,
                },
            ));
        }

        while let Some((source, candidate)) = queue.pop_front() {
            let entity_key = candidate.permission.target.entity_key();
            let children = children_cache
                .entry(entity_key.clone())
                .or_insert_with(|| self.registry.collect_children(&entity_key, Some(1)))
                .clone();

            for child in children {
                if !visited[source].insert(child.clone()) {
                    continue;
                }
                match candidate.permission.target.on_entity(&child) {
                    Ok(target) => {
                        let mut mirrored = candidate.permission.clone();
                        mirrored.target = target;
                        queue.push_back((
                            source,
                            Ranked {
                                permission: mirrored,
                                image_level: candidate.image_level + 1,
                            },
                        ));
                    }
                    Err(err) => {
                        tracing::warn!(child = %child, error = %err,
                            "skipping inheritance expansion");
                    }
                }
            }
            expanded.push(candidate);
        }

        expanded.sort_by_key(|r| {
            (
                r.image_level,
                Reverse(r.permission.condition.len()),
                r.permission.target.is_wildcard(),
            )
        });
        expanded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ModelRegistry;

    fn resolver_with(registry: ModelRegistry) -> Resolver {
        Resolver::new(Arc::new(registry))
    }

    fn resolver() -> Resolver {
        resolver_with(
            ModelRegistry::builder()
                .entity(
                    "realm",
                    "permission",
                    ["permission", "permission_type", "target"],
                )
                .entity("app", "widget", ["name", "price"])
                .build()
                .unwrap(),
        )
    }

    fn target(path: &str) -> Target {
        Target::parse(path).unwrap()
    }

    fn targets(paths: &[&str]) -> Vec<Target> {
        paths.iter().map(|p| target(p)).collect()
    }

    #[test]
    fn test_apply_permissions_different_kinds() {
        let permissions = vec![
            Permission::allow(PermissionKind::View, target("realm.permission.permission")),
            Permission::allow(PermissionKind::Edit, target("realm.permission.target")),
        ];
        let requested = targets(&[
            "realm.permission.permission",
            "realm.permission.permission_type",
            "realm.permission.target",
        ]);

        let resolver = resolver();
        let allowed = resolver.apply_permissions(&permissions, &requested, PermissionKind::View);
        assert_eq!(
            allowed,
            targets(&["realm.permission.permission", "realm.permission.target"])
        );

        let allowed = resolver.apply_permissions(&permissions, &requested, PermissionKind::Edit);
        assert_eq!(allowed, targets(&["realm.permission.target"]));
    }

    #[test]
    fn test_apply_permissions_precedence_order() {
        let mut permissions = vec![
            Permission::allow(PermissionKind::View, target("realm.permission.*")),
            Permission::disallow(PermissionKind::View, target("realm.permission.target")),
            Permission::disallow(PermissionKind::View, target("realm.permission.permission_type"))
                .with_condition(["condition1"]),
        ];
        let requested = targets(&[
            "realm.permission.permission",
            "realm.permission.permission_type",
            "realm.permission.target",
        ]);

        let resolver = resolver();
        let allowed = resolver.apply_permissions(&permissions, &requested, PermissionKind::View);
        assert_eq!(allowed, targets(&["realm.permission.permission"]));

        // A more conditional allow on the disallowed field outranks it.
        permissions.push(
            Permission::allow(PermissionKind::View, target("realm.permission.target"))
                .with_condition(["condition1", "condition2"]),
        );
        let allowed = resolver.apply_permissions(&permissions, &requested, PermissionKind::View);
        assert_eq!(
            allowed,
            targets(&["realm.permission.target", "realm.permission.permission"])
        );
    }

    #[test]
    fn test_deny_by_default() {
        let resolver = resolver();
        let requested = targets(&["app.widget.name"]);
        assert!(resolver
            .apply_permissions(&[], &requested, PermissionKind::View)
            .is_empty());

        let unrelated = vec![Permission::allow(
            PermissionKind::View,
            target("realm.permission.*"),
        )];
        assert!(resolver
            .apply_permissions(&unrelated, &requested, PermissionKind::View)
            .is_empty());
    }

    #[test]
    fn test_result_is_subset_of_requested() {
        let permissions = vec![Permission::allow(
            PermissionKind::View,
            target("app.widget.*"),
        )];
        let requested = targets(&["app.widget.name"]);
        let resolver = resolver();
        let allowed = resolver.apply_permissions(&permissions, &requested, PermissionKind::View);
        assert_eq!(allowed, requested);
    }

    #[test]
    fn test_wildcard_shadowed_by_exact_disallow() {
        let permissions = vec![
            Permission::allow(PermissionKind::View, target("app.widget.*")),
            Permission::disallow(PermissionKind::View, target("app.widget.price")),
        ];
        let requested = targets(&["app.widget.name", "app.widget.price"]);
        let resolver = resolver();
        let allowed = resolver.apply_permissions(&permissions, &requested, PermissionKind::View);
        assert_eq!(allowed, targets(&["app.widget.name"]));
    }

    #[test]
    fn test_wildcard_allows_whole_batch() {
        let permissions = vec![Permission::allow(
            PermissionKind::View,
            target("app.widget.*"),
        )];
        let requested = targets(&["app.widget.name", "app.widget.price"]);
        let resolver = resolver();
        let allowed = resolver.apply_permissions(&permissions, &requested, PermissionKind::View);
        assert_eq!(allowed, requested);
    }

    #[test]
    fn test_inheritance_propagates_to_extension() {
        let resolver = resolver_with(
            ModelRegistry::builder()
                .entity("app", "widget", ["name", "price"])
                .extension("app", "premium_widget", ["discount"], "app.widget")
                .entity("app", "sidecar", ["name"])
                .build()
                .unwrap(),
        );
        let permissions = vec![Permission::allow(
            PermissionKind::View,
            target("app.widget.name"),
        )];

        // Honored one level down for the is-a extension...
        let allowed = resolver.apply_permissions(
            &permissions,
            &targets(&["app.premium_widget.name"]),
            PermissionKind::View,
        );
        assert_eq!(allowed, targets(&["app.premium_widget.name"]));

        // ...but not for an unrelated entity.
        let allowed = resolver.apply_permissions(
            &permissions,
            &targets(&["app.sidecar.name"]),
            PermissionKind::View,
        );
        assert!(allowed.is_empty());
    }

    #[test]
    fn test_inheritance_is_transitive() {
        let resolver = resolver_with(
            ModelRegistry::builder()
                .entity("app", "base", ["name"])
                .extension("app", "middle", ["extra"], "app.base")
                .extension("app", "leaf", ["detail"], "app.middle")
                .build()
                .unwrap(),
        );
        let permissions = vec![Permission::allow(
            PermissionKind::View,
            target("app.base.name"),
        )];
        let allowed = resolver.apply_permissions(
            &permissions,
            &targets(&["app.leaf.name"]),
            PermissionKind::View,
        );
        assert_eq!(allowed, targets(&["app.leaf.name"]));
    }

    #[test]
    fn test_child_declaration_outranks_inherited() {
        let resolver = resolver_with(
            ModelRegistry::builder()
                .entity("app", "widget", ["name"])
                .extension("app", "premium_widget", ["discount"], "app.widget")
                .build()
                .unwrap(),
        );
        // The parent wildcard would allow the child field, but a level-0
        // disallow declared on the child itself wins.
        let permissions = vec![
            Permission::allow(PermissionKind::View, target("app.widget.*")),
            Permission::disallow(PermissionKind::View, target("app.premium_widget.name")),
        ];
        let allowed = resolver.apply_permissions(
            &permissions,
            &targets(&["app.premium_widget.name"]),
            PermissionKind::View,
        );
        assert!(allowed.is_empty());
    }

    #[test]
    fn test_edit_implies_view() {
        let permissions = vec![Permission::allow(
            PermissionKind::Edit,
            target("app.widget.name"),
        )];
        let resolver = resolver();
        let requested = targets(&["app.widget.name"]);
        assert_eq!(
            resolver.apply_permissions(&permissions, &requested, PermissionKind::View),
            requested
        );
        assert_eq!(
            resolver.apply_permissions(&permissions, &requested, PermissionKind::Edit),
            requested
        );
    }

    #[test]
    fn test_view_does_not_imply_edit() {
        let permissions = vec![Permission::allow(
            PermissionKind::View,
            target("app.widget.name"),
        )];
        let resolver = resolver();
        assert!(resolver
            .apply_permissions(&permissions, &targets(&["app.widget.name"]), PermissionKind::Edit)
            .is_empty());
    }

    #[test]
    fn test_unknown_entity_still_matches_literally() {
        // A stored grant on an entity the registry has never heard of
        // cannot cascade, but still decides its exact target.
        let resolver = resolver();
        let permissions = vec![Permission::allow(
            PermissionKind::View,
            target("ghost.entity.field"),
        )];
        let requested = targets(&["ghost.entity.field"]);
        assert_eq!(
            resolver.apply_permissions(&permissions, &requested, PermissionKind::View),
            requested
        );
    }

    #[test]
    fn test_duplicate_requested_targets_decided_once() {
        let permissions = vec![Permission::allow(
            PermissionKind::View,
            target("app.widget.name"),
        )];
        let resolver = resolver();
        let requested = targets(&["app.widget.name", "app.widget.name"]);
        let allowed = resolver.apply_permissions(&permissions, &requested, PermissionKind::View);
        assert_eq!(allowed, targets(&["app.widget.name"]));
    }
}
