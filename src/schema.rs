//! Schema registry — the collaborator that resolves target paths to
//! entities and exposes their inheritance links.
//!
//! [`SchemaRegistry`] is the abstraction the resolution engine and the
//! grant-store query layer walk. Entities are addressed by their qualified
//! `namespace.entity` key. Parent links model single-table inheritance;
//! child links are the inverse, and only cover true is-a extension (the
//! child's primary key doubles as a foreign key to the parent), never
//! generic one-to-one associations.
//!
//! [`ModelRegistry`] is the provided in-memory implementation, built once at
//! startup from the host's model metadata.

use crate::error::RealmError;
use crate::target::Target;
use std::collections::{HashMap, HashSet, VecDeque};

/// Description of one registered entity.
#[derive(Clone, Debug)]
pub struct EntityDescriptor {
    /// Qualified `namespace.entity` key.
    pub key: String,
    /// Declared field names.
    pub fields: Vec<String>,
    /// Single-table-inheritance parent, if any.
    pub parent: Option<String>,
    /// Entities extending this one (is-a one-to-one extension only).
    pub children: Vec<String>,
}

/// Resolves qualified entity keys and enumerates inheritance links.
pub trait SchemaRegistry: Send + Sync + 'static {
    /// Look up an entity by its qualified `namespace.entity` key.
    fn entity(&self, key: &str) -> Option<EntityDescriptor>;

    /// Resolve a target against the registry, failing when the entity is
    /// unknown.
    fn resolve(&self, target: &Target) -> Result<EntityDescriptor, RealmError> {
        self.entity(&target.entity_key())
            .ok_or_else(|| RealmError::UnknownEntity(target.entity_key()))
    }

    /// Walk the parent chain upward, nearest parent first.
    ///
    /// `levels` bounds the number of hops: `None` walks to the root,
    /// `Some(0)` returns nothing.
    fn collect_parents(&self, key: &str, levels: Option<usize>) -> Vec<String> {
        let mut parents = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        seen.insert(key.to_string());

        let mut current = key.to_string();
        let mut remaining = levels;
        loop {
            if remaining == Some(0) {
                break;
            }
            let Some(parent) = self.entity(&current).and_then(|e| e.parent) else {
                break;
            };
            if !seen.insert(parent.clone()) {
                break;
            }
            parents.push(parent.clone());
            current = parent;
            if let Some(n) = remaining.as_mut() {
                *n -= 1;
            }
        }
        parents
    }

    /// Walk extension links downward in level order, direct children first.
    ///
    /// Same `levels` semantics as [`collect_parents`](Self::collect_parents).
    fn collect_children(&self, key: &str, levels: Option<usize>) -> Vec<String> {
        let mut children = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        seen.insert(key.to_string());

        let mut queue: VecDeque<(String, usize)> = VecDeque::new();
        queue.push_back((key.to_string(), 0));
        while let Some((current, depth)) = queue.pop_front() {
            if let Some(max) = levels {
                if depth >= max {
                    continue;
                }
            }
            let Some(descriptor) = self.entity(&current) else {
                continue;
            };
            for child in descriptor.children {
                if seen.insert(child.clone()) {
                    children.push(child.clone());
                    queue.push_back((child, depth + 1));
                }
            }
        }
        children
    }

    /// Build the target for a declared field of an entity.
    ///
    /// Fails when the entity is unknown or the field is neither declared
    /// nor the wildcard.
    fn target(&self, key: &str, field: &str) -> Result<Target, RealmError> {
        let descriptor = self
            .entity(key)
            .ok_or_else(|| RealmError::UnknownEntity(key.to_string()))?;
        if field != crate::target::WILDCARD && !descriptor.fields.iter().any(|f| f == field) {
            return Err(RealmError::InvalidTarget(format!("{key}.{field}")));
        }
        Target::for_entity(key, field)
    }
}

/// In-memory schema registry built from the host's model metadata.
///
/// # Example
///
/// ```
/// use realm_authz::ModelRegistry;
///
/// let registry = ModelRegistry::builder()
///     .entity("app", "widget", ["name", "price"])
///     .extension("app", "premium_widget", ["discount"], "app.widget")
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Default)]
pub struct ModelRegistry {
    entities: HashMap<String, EntityDescriptor>,
}

impl ModelRegistry {
    pub fn builder() -> ModelRegistryBuilder {
        ModelRegistryBuilder::default()
    }
}

impl SchemaRegistry for ModelRegistry {
    fn entity(&self, key: &str) -> Option<EntityDescriptor> {
        self.entities.get(key).cloned()
    }
}

/// Builder for [`ModelRegistry`].
#[derive(Debug, Default)]
pub struct ModelRegistryBuilder {
    entities: Vec<EntityDescriptor>,
}

impl ModelRegistryBuilder {
    /// Register a root entity.
    pub fn entity<I, S>(self, namespace: &str, name: &str, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(namespace, name, fields, None)
    }

    /// Register an entity extending `parent` (is-a one-to-one extension).
    pub fn extension<I, S>(self, namespace: &str, name: &str, fields: I, parent: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(namespace, name, fields, Some(parent.to_string()))
    }

    fn push<I, S>(
        mut self,
        namespace: &str,
        name: &str,
        fields: I,
        parent: Option<String>,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entities.push(EntityDescriptor {
            key: format!("{namespace}.{name}"),
            fields: fields.into_iter().map(Into::into).collect(),
            parent,
            children: Vec::new(),
        });
        self
    }

    /// Validate parent references and wire up child links.
    pub fn build(self) -> Result<ModelRegistry, RealmError> {
        let mut entities: HashMap<String, EntityDescriptor> = HashMap::new();
        for descriptor in self.entities {
            if entities.insert(descriptor.key.clone(), descriptor).is_some() {
                return Err(RealmError::InvalidConfig(
                    "duplicate entity registration".into(),
                ));
            }
        }

        let links: Vec<(String, String)> = entities
            .values()
            .filter_map(|e| e.parent.clone().map(|p| (p, e.key.clone())))
            .collect();
        for (parent, child) in links {
            let Some(descriptor) = entities.get_mut(&parent) else {
                return Err(RealmError::UnknownEntity(parent));
            };
            descriptor.children.push(child);
        }
        for descriptor in entities.values_mut() {
            descriptor.children.sort();
        }

        Ok(ModelRegistry { entities })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ModelRegistry {
        ModelRegistry::builder()
            .entity("app", "base", ["id", "name"])
            .extension("app", "middle", ["extra"], "app.base")
            .extension("app", "leaf", ["detail"], "app.middle")
            .entity("app", "unrelated", ["id"])
            .build()
            .unwrap()
    }

    #[test]
    fn test_collect_parents_unbounded() {
        let registry = registry();
        assert_eq!(
            registry.collect_parents("app.leaf", None),
            vec!["app.middle".to_string(), "app.base".to_string()]
        );
    }

    #[test]
    fn test_collect_parents_levels() {
        let registry = registry();
        assert_eq!(
            registry.collect_parents("app.leaf", Some(1)),
            vec!["app.middle".to_string()]
        );
        assert!(registry.collect_parents("app.leaf", Some(0)).is_empty());
        assert!(registry.collect_parents("app.base", None).is_empty());
    }

    #[test]
    fn test_collect_children_levels() {
        let registry = registry();
        assert_eq!(
            registry.collect_children("app.base", Some(1)),
            vec!["app.middle".to_string()]
        );
        assert_eq!(
            registry.collect_children("app.base", None),
            vec!["app.middle".to_string(), "app.leaf".to_string()]
        );
        assert!(registry.collect_children("app.leaf", None).is_empty());
    }

    #[test]
    fn test_target_checks_fields() {
        let registry = registry();
        assert_eq!(
            registry.target("app.base", "name").unwrap().to_string(),
            "app.base.name"
        );
        assert_eq!(
            registry.target("app.base", "*").unwrap().to_string(),
            "app.base.*"
        );
        assert!(registry.target("app.base", "missing").is_err());
        assert!(registry.target("app.nope", "name").is_err());
    }

    #[test]
    fn test_resolve_unknown_entity() {
        let registry = registry();
        let target = Target::new("app", "ghost", "name");
        assert!(matches!(
            registry.resolve(&target),
            Err(RealmError::UnknownEntity(_))
        ));
    }

    #[test]
    fn test_build_rejects_unknown_parent() {
        let result = ModelRegistry::builder()
            .extension("app", "orphan", ["id"], "app.missing")
            .build();
        assert!(result.is_err());
    }
}
