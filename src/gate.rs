//! Request gating — HTTP verb mapping and field-tree target collection.
//!
//! The gate is the piece the host framework calls before a handler runs:
//! map the verb to a permission kind, collect the targets a serializer
//! would touch (walking its nested field descriptors to a bounded depth),
//! and require every one of them.

use crate::config::RealmConfig;
use crate::error::RealmError;
use crate::permission::PermissionKind;
use crate::realm::RealmSession;
use crate::store::Context;
use crate::target::{AccessRequest, Target};
use http::Method;
use std::collections::VecDeque;

/// Map an HTTP verb to the permission kind it requires.
///
/// `Ok(None)` means the verb needs no permission check (OPTIONS, HEAD).
/// Unknown verbs surface as [`RealmError::UnsupportedMethod`].
pub fn kind_for_method(method: &Method) -> Result<Option<PermissionKind>, RealmError> {
    match *method {
        Method::GET => Ok(Some(PermissionKind::View)),
        Method::OPTIONS | Method::HEAD => Ok(None),
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE => {
            Ok(Some(PermissionKind::Edit))
        }
        _ => Err(RealmError::UnsupportedMethod(method.to_string())),
    }
}

/// One declared serializer field, possibly expanding into a nested entity.
#[derive(Clone, Debug)]
pub struct FieldSpec {
    pub name: String,
    /// Read-only fields (and their nested subtrees) only ever need view
    /// access, even on a write request.
    pub read_only: bool,
    pub nested: Option<FieldNode>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            read_only: false,
            nested: None,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn with_nested(mut self, node: FieldNode) -> Self {
        self.nested = Some(node);
        self
    }
}

/// The field descriptors one serializer exposes for one entity.
#[derive(Clone, Debug)]
pub struct FieldNode {
    /// Qualified `namespace.entity` key.
    pub entity: String,
    pub fields: Vec<FieldSpec>,
}

impl FieldNode {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.fields.push(FieldSpec::new(name));
        self
    }

    pub fn with(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }
}

/// Collect the access requests a field tree requires, breadth-first,
/// descending at most `max_depth` nesting levels.
pub fn collect_requests(
    root: &FieldNode,
    kind: PermissionKind,
    max_depth: usize,
) -> Result<Vec<AccessRequest>, RealmError> {
    let mut requests = Vec::new();
    let mut queue: VecDeque<(&FieldNode, PermissionKind, usize)> = VecDeque::new();
    queue.push_back((root, kind, 0));

    while let Some((node, node_kind, depth)) = queue.pop_front() {
        for spec in &node.fields {
            let field_kind = if spec.read_only {
                PermissionKind::View
            } else {
                node_kind
            };
            let target = Target::for_entity(&node.entity, spec.name.clone())?;
            requests.push(AccessRequest::new(field_kind, target));

            if let Some(nested) = &spec.nested {
                if depth + 1 < max_depth {
                    queue.push_back((nested, field_kind, depth + 1));
                }
            }
        }
    }
    Ok(requests)
}

/// Gates a request on the full set of fields its serializer would touch.
pub struct RequestGate {
    config: RealmConfig,
}

impl RequestGate {
    pub fn new(config: RealmConfig) -> Self {
        Self { config }
    }

    /// Whether the session's principal may perform `method` against the
    /// serializer described by `root`.
    pub async fn check(
        &self,
        session: &RealmSession,
        method: &Method,
        root: &FieldNode,
        context: &Context,
    ) -> Result<bool, RealmError> {
        let Some(kind) = kind_for_method(method)? else {
            return Ok(true);
        };
        let requests = collect_requests(root, kind, self.config.max_field_depth)?;
        tracing::debug!(
            method = %method,
            kind = %kind,
            targets = requests.len(),
            "gating request"
        );
        session.has_requests(&requests, context).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RealmRegistry;
    use crate::permission::Permission;
    use crate::realm::{Realm, RealmUser};
    use crate::schema::ModelRegistry;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    #[test]
    fn test_kind_for_method() {
        assert_eq!(
            kind_for_method(&Method::GET).unwrap(),
            Some(PermissionKind::View)
        );
        assert_eq!(kind_for_method(&Method::OPTIONS).unwrap(), None);
        assert_eq!(kind_for_method(&Method::HEAD).unwrap(), None);
        for method in [Method::POST, Method::PUT, Method::PATCH, Method::DELETE] {
            assert_eq!(
                kind_for_method(&method).unwrap(),
                Some(PermissionKind::Edit)
            );
        }
        assert!(matches!(
            kind_for_method(&Method::TRACE),
            Err(RealmError::UnsupportedMethod(_))
        ));
    }

    fn order_tree() -> FieldNode {
        FieldNode::new("shop.order")
            .field("number")
            .with(
                FieldSpec::new("customer").with_nested(
                    FieldNode::new("shop.customer").field("name").with(
                        FieldSpec::new("address")
                            .with_nested(FieldNode::new("shop.address").field("city")),
                    ),
                ),
            )
            .with(FieldSpec::new("total").read_only())
    }

    #[test]
    fn test_collect_requests_walks_nested_fields() {
        let requests = collect_requests(&order_tree(), PermissionKind::Edit, 3).unwrap();
        let rendered: Vec<String> = requests.iter().map(|r| r.to_string()).collect();
        assert_eq!(
            rendered,
            vec![
                "edit.shop.order.number",
                "edit.shop.order.customer",
                "view.shop.order.total",
                "edit.shop.customer.name",
                "edit.shop.customer.address",
                "edit.shop.address.city",
            ]
        );
    }

    #[test]
    fn test_collect_requests_depth_bound() {
        let requests = collect_requests(&order_tree(), PermissionKind::Edit, 2).unwrap();
        let rendered: Vec<String> = requests.iter().map(|r| r.to_string()).collect();
        // Depth 2 stops before shop.address.
        assert!(!rendered.iter().any(|r| r.contains("shop.address")));
        assert!(rendered.iter().any(|r| r.contains("shop.customer.name")));
    }

    #[test]
    fn test_read_only_subtree_downgrades_to_view() {
        let tree = FieldNode::new("shop.order").with(
            FieldSpec::new("customer")
                .read_only()
                .with_nested(FieldNode::new("shop.customer").field("name")),
        );
        let requests = collect_requests(&tree, PermissionKind::Edit, 3).unwrap();
        let rendered: Vec<String> = requests.iter().map(|r| r.to_string()).collect();
        assert_eq!(
            rendered,
            vec!["view.shop.order.customer", "view.shop.customer.name"]
        );
    }

    #[tokio::test]
    async fn test_gate_check() {
        let schema = Arc::new(
            ModelRegistry::builder()
                .entity("shop", "order", ["number", "total"])
                .build()
                .unwrap(),
        );
        let store = MemoryStore::new(RealmConfig::default());
        let realm_id = store.save_realm(Realm::new(RealmUser::new("alice"))).unwrap();
        let permission = store.create_permission(Permission::allow(
            PermissionKind::View,
            Target::wildcard("shop", "order"),
        ));
        store.grant_to_realm(realm_id, permission).unwrap();
        let registry = RealmRegistry::new(Arc::new(store), schema);
        let session = registry.session("alice");

        let gate = RequestGate::new(RealmConfig::default());
        let tree = FieldNode::new("shop.order").field("number").field("total");

        assert!(gate
            .check(&session, &Method::GET, &tree, &Context::new())
            .await
            .unwrap());
        // View-only grant does not let a write through.
        assert!(!gate
            .check(&session, &Method::POST, &tree, &Context::new())
            .await
            .unwrap());
        // OPTIONS needs no permissions at all.
        assert!(gate
            .check(&session, &Method::OPTIONS, &tree, &Context::new())
            .await
            .unwrap());
    }
}
