//! Authorization backends and the registry entry point.
//!
//! Instead of a runtime-discovered backend list, the chain is an explicit
//! ordered set of [`AuthorizationBackend`] implementations held by
//! [`RealmRegistry`]. The session iterates it with early exit: the first
//! [`Decision::Allow`] grants, the first [`Decision::Deny`] refuses
//! outright, and a backend with nothing to say abstains.
//!
//! [`GrantBackend`] is the default chain: grant store + resolution engine.

use crate::engine::Resolver;
use crate::error::RealmError;
use crate::realm::RealmSession;
use crate::schema::SchemaRegistry;
use crate::store::{filter_by_context, Context, GrantStore, StoreFuture};
use crate::target::AccessRequest;
use std::sync::Arc;

/// Outcome of one backend's resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    /// Grant the request; later backends are not consulted.
    Allow,
    /// Refuse the request outright; later backends are not consulted.
    Deny,
    /// No opinion; the next backend decides.
    Abstain,
}

/// One authorization strategy in the registry's chain.
pub trait AuthorizationBackend: Send + Sync + 'static {
    fn resolve<'a>(
        &'a self,
        session: &'a RealmSession,
        request: &'a AccessRequest,
        context: &'a Context,
    ) -> StoreFuture<'a, Decision>;
}

/// Default backend: resolves the session's stored grants through the
/// permission engine.
///
/// A principal without a realm record is a hard deny — the chain stops
/// rather than falling through to a more permissive backend.
pub struct GrantBackend;

impl AuthorizationBackend for GrantBackend {
    fn resolve<'a>(
        &'a self,
        session: &'a RealmSession,
        request: &'a AccessRequest,
        context: &'a Context,
    ) -> StoreFuture<'a, Decision> {
        Box::pin(async move {
            if session.realm().await?.is_none() {
                tracing::debug!(user = %session.user_id(), "no realm record");
                return Ok(Decision::Deny);
            }

            let permissions = session.get_all_permissions().await?;
            let candidates = filter_by_context(permissions, context);
            let allowed = session.registry().resolver().apply_permissions(
                &candidates,
                std::slice::from_ref(&request.target),
                request.kind,
            );
            if allowed.contains(&request.target) {
                Ok(Decision::Allow)
            } else {
                Ok(Decision::Abstain)
            }
        })
    }
}

/// Clonable entry point: grant store, schema registry, and the ordered
/// backend chain.
///
/// # Usage pattern
///
/// ```ignore
/// let registry = RealmRegistry::new(store, schema);
///
/// // One session per request.
/// let session = registry.session("alice");
/// if session.has_perm("edit.app.widget.price", &context).await? {
///     // ...
/// }
/// ```
#[derive(Clone)]
pub struct RealmRegistry {
    store: Arc<dyn GrantStore>,
    schema: Arc<dyn SchemaRegistry>,
    backends: Arc<[Arc<dyn AuthorizationBackend>]>,
}

impl RealmRegistry {
    /// Create a registry with the default chain (just [`GrantBackend`]).
    pub fn new(store: Arc<dyn GrantStore>, schema: Arc<dyn SchemaRegistry>) -> Self {
        Self::with_backends(store, schema, vec![Arc::new(GrantBackend)])
    }

    /// Create a registry with a custom ordered backend chain.
    pub fn with_backends(
        store: Arc<dyn GrantStore>,
        schema: Arc<dyn SchemaRegistry>,
        backends: Vec<Arc<dyn AuthorizationBackend>>,
    ) -> Self {
        Self {
            store,
            schema,
            backends: backends.into(),
        }
    }

    /// Open a request-scoped session for a principal.
    pub fn session(&self, user_id: impl Into<String>) -> RealmSession {
        RealmSession::new(self.clone(), user_id.into())
    }

    /// A resolution engine over this registry's schema.
    pub fn resolver(&self) -> Resolver {
        Resolver::new(self.schema.clone())
    }

    pub fn schema(&self) -> &Arc<dyn SchemaRegistry> {
        &self.schema
    }

    pub(crate) fn store(&self) -> &Arc<dyn GrantStore> {
        &self.store
    }

    pub(crate) fn backends(&self) -> &[Arc<dyn AuthorizationBackend>] {
        &self.backends
    }
}
