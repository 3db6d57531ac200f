//! Field-filtering adapter for REST serializers.
//!
//! Given the field lists a serializer would expose, [`FieldFilter`] prunes
//! them down to what the session's principal may see or change. Each list
//! goes through one batched [`apply_permissions`] call — deciding the whole
//! set together is what lets a wildcard grant and a higher-precedence
//! field-level disallow interact correctly; per-field `has_perm` calls
//! would give each field its own undecided set and break that.
//!
//! [`apply_permissions`]: crate::Resolver::apply_permissions

use crate::error::RealmError;
use crate::permission::PermissionKind;
use crate::realm::RealmSession;
use crate::store::{filter_by_context, Context};
use crate::target::Target;
use std::collections::HashSet;

/// Prunes serializer field lists by the principal's permissions.
pub struct FieldFilter<'a> {
    session: &'a RealmSession,
    context: Context,
}

impl<'a> FieldFilter<'a> {
    pub fn new(session: &'a RealmSession) -> Self {
        Self {
            session,
            context: Context::new(),
        }
    }

    /// Scope the filter to a request context.
    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    /// The subset of `fields` the principal may read (kind = view).
    pub async fn readable_fields<I, S>(
        &self,
        entity_key: &str,
        fields: I,
    ) -> Result<Vec<String>, RealmError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_fields(entity_key, fields, PermissionKind::View)
            .await
    }

    /// The subset of `fields` the principal may write (kind = edit).
    pub async fn writable_fields<I, S>(
        &self,
        entity_key: &str,
        fields: I,
    ) -> Result<Vec<String>, RealmError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_fields(entity_key, fields, PermissionKind::Edit)
            .await
    }

    async fn allowed_fields<I, S>(
        &self,
        entity_key: &str,
        fields: I,
        kind: PermissionKind,
    ) -> Result<Vec<String>, RealmError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();

        let Some(realm) = self.session.realm().await? else {
            return Ok(Vec::new());
        };
        if !realm.user.active {
            return Ok(Vec::new());
        }
        if realm.user.superuser {
            return Ok(fields);
        }

        let mut targets = Vec::with_capacity(fields.len());
        for field in &fields {
            targets.push(Target::for_entity(entity_key, field.clone())?);
        }

        let permissions = self.session.get_all_permissions().await?;
        let candidates = filter_by_context(permissions, &self.context);
        let allowed: HashSet<Target> = self
            .session
            .registry()
            .resolver()
            .apply_permissions(&candidates, &targets, kind)
            .into_iter()
            .collect();

        Ok(fields
            .into_iter()
            .zip(targets)
            .filter(|(_, target)| allowed.contains(target))
            .map(|(field, _)| field)
            .collect())
    }
}
