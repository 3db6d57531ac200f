//! Field-level permissions for multi-tenant applications.
//!
//! This crate resolves whether a principal may view, edit, or act on
//! individual entity fields, addressed by dotted `namespace.entity.field`
//! target paths with wildcard support.
//!
//! # Overview
//!
//! Authorization is grant-based with explicit allow and disallow records:
//!
//! - **Permissions** pair a kind (view / edit / action) and an effect
//!   (allow / disallow) with a target path and optional condition tags.
//! - **Realms** bind an authenticated user to its tenancy context and
//!   carry the user's direct grants and group memberships.
//! - The **resolution engine** expands grants down the entity inheritance
//!   hierarchy, sorts them by precedence, and lets the first decision per
//!   target win. Anything undecided at the end is denied.
//!
//! # Setup
//!
//! ```ignore
//! use realm_authz::{
//!     Context, MemoryStore, ModelRegistry, Permission, PermissionKind,
//!     Realm, RealmConfig, RealmRegistry, RealmUser, Target,
//! };
//! use std::sync::Arc;
//!
//! let schema = Arc::new(
//!     ModelRegistry::builder()
//!         .entity("shop", "widget", ["name", "price"])
//!         .build()?,
//! );
//!
//! let store = MemoryStore::new(RealmConfig::default());
//! let realm_id = store.save_realm(Realm::new(RealmUser::new("alice")))?;
//! let grant = store.create_permission(Permission::allow(
//!     PermissionKind::View,
//!     Target::wildcard("shop", "widget"),
//! ));
//! store.grant_to_realm(realm_id, grant)?;
//!
//! let registry = RealmRegistry::new(Arc::new(store), schema);
//!
//! // One session per request.
//! let session = registry.session("alice");
//! assert!(session.has_perm("shop.widget.price", &Context::new()).await?);
//! ```
//!
//! # Architecture
//!
//! The crate is split into layered concerns:
//!
//! - **[`RealmRegistry`]** — clonable entry point holding the grant store,
//!   the schema registry, and the ordered [`AuthorizationBackend`] chain.
//!   Opens a [`RealmSession`] per request.
//! - **[`RealmSession`]** — request-scoped handle; memoizes the principal's
//!   realm record and resolved permission sets, and exposes `has_perm` /
//!   `has_perms`.
//! - **[`Resolver`]** — the pure resolution engine: inheritance expansion,
//!   precedence sort, first-decision-wins pass.
//! - **[`GrantStore`]** — async boundary to the host's persistent store;
//!   [`MemoryStore`] is the provided implementation.
//! - **[`FieldFilter`]** and **[`RequestGate`]** — the REST-facing
//!   adapters: prune serializer field lists, and gate a request on every
//!   field its serializer would touch.
//!
//! # Custom Backends
//!
//! Implement [`AuthorizationBackend`] to add an authorization strategy
//! ahead of or after the grant store:
//!
//! ```ignore
//! use realm_authz::{AuthorizationBackend, Decision, StoreFuture};
//!
//! struct AuditBackend { /* ... */ }
//!
//! impl AuthorizationBackend for AuditBackend {
//!     fn resolve<'a>(
//!         &'a self,
//!         session: &'a RealmSession,
//!         request: &'a AccessRequest,
//!         context: &'a Context,
//!     ) -> StoreFuture<'a, Decision> {
//!         Box::pin(async move { /* your logic */ Ok(Decision::Abstain) })
//!     }
//! }
//!
//! let registry = RealmRegistry::with_backends(store, schema, vec![
//!     Arc::new(AuditBackend { /* ... */ }),
//!     Arc::new(GrantBackend),
//! ]);
//! ```
//!
//! # Testing
//!
//! [`MemoryStore`] plus [`ModelRegistry::builder`] give a fully in-process
//! setup; every check in the examples above runs without external
//! services.

pub mod backend;
pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod gate;
pub mod migrate;
pub mod permission;
pub mod realm;
pub mod schema;
pub mod store;
pub mod target;

pub use backend::{AuthorizationBackend, Decision, GrantBackend, RealmRegistry};
pub use config::RealmConfig;
pub use engine::Resolver;
pub use error::RealmError;
pub use filter::FieldFilter;
pub use gate::{collect_requests, kind_for_method, FieldNode, FieldSpec, RequestGate};
pub use migrate::{
    migrate_legacy, LegacyGroup, LegacyPermission, LegacySnapshot, MigrationReport,
};
pub use permission::{Permission, PermissionEffect, PermissionKind};
pub use realm::{Group, GroupId, PermissionId, Realm, RealmId, RealmSession, RealmUser};
pub use schema::{EntityDescriptor, ModelRegistry, SchemaRegistry};
pub use store::{
    filter_by_context, filter_by_targets, Context, ContextValue, GrantStore, MemoryStore,
    StoreFuture,
};
pub use target::{AccessRequest, Target, WILDCARD};

/// Common imports for applications using the crate.
pub mod prelude {
    pub use crate::backend::{AuthorizationBackend, Decision, GrantBackend, RealmRegistry};
    pub use crate::config::RealmConfig;
    pub use crate::error::RealmError;
    pub use crate::filter::FieldFilter;
    pub use crate::gate::RequestGate;
    pub use crate::permission::{Permission, PermissionEffect, PermissionKind};
    pub use crate::realm::{Realm, RealmSession, RealmUser};
    pub use crate::schema::{ModelRegistry, SchemaRegistry};
    pub use crate::store::{Context, GrantStore, MemoryStore};
    pub use crate::target::{AccessRequest, Target};
}
