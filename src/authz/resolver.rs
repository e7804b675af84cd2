use std::collections::HashSet;

use tokio::sync::{OnceCell, RwLock};

use crate::authz::engine::{self, fingerprint, FingerprintIndex};
use crate::authz::errors::AuthzError;
use crate::authz::predicate::{self, Predicate};
use crate::authz::store::{AuthzStore, GrantStore, GroupMembership};
use crate::authz::types::{
    ActionSpec, AuthorizationRequest, Grant, NormalizedGrant, SubjectKind, SubjectRef,
};

/// Every grant effective for `subject`, before normalization.
///
/// Users get their direct grants followed by the grants of each group they
/// belong to; groups get their own grants.
pub async fn load_grants<S>(store: &S, subject: &SubjectRef) -> Result<Vec<Grant>, AuthzError>
where
    S: GrantStore + GroupMembership + ?Sized,
{
    if !store.subject_exists(subject).await? {
        return Err(AuthzError::SubjectNotFound(subject.to_string()));
    }

    let mut grants = store.direct_grants_of(subject).await?;

    if subject.kind == SubjectKind::User {
        let groups = store.groups_of(&subject.id).await?;
        if !groups.is_empty() {
            grants.extend(store.group_grants_of(&groups).await?);
        }
    }

    Ok(grants)
}

/// Load every grant effective for `subject`. Duplicates collapse to the
/// first occurrence.
pub async fn resolve<S>(store: &S, subject: &SubjectRef) -> Result<Vec<NormalizedGrant>, AuthzError>
where
    S: GrantStore + GroupMembership + ?Sized,
{
    let grants = load_grants(store, subject).await?;
    let loaded = grants.len();
    let resolved = normalize(grants);

    tracing::debug!(
        subject = %subject,
        loaded,
        resolved = resolved.len(),
        "Resolved grants"
    );

    Ok(resolved)
}

/// Project grants onto [`NormalizedGrant`], dropping repeated
/// (permission, parameter values) pairs.
pub fn normalize<I>(grants: I) -> Vec<NormalizedGrant>
where
    I: IntoIterator<Item = Grant>,
{
    let mut seen = HashSet::new();
    grants
        .into_iter()
        .map(Grant::into_normalized)
        .filter(|g| seen.insert(fingerprint(g.code(), &g.parameter_values)))
        .collect()
}

#[derive(Debug)]
struct ResolvedGrants {
    grants: Vec<NormalizedGrant>,
    index: Option<FingerprintIndex>,
}

impl ResolvedGrants {
    fn new(grants: Vec<NormalizedGrant>, fingerprint_threshold: usize) -> Self {
        let index = (grants.len() >= fingerprint_threshold).then(|| FingerprintIndex::build(&grants));
        Self { grants, index }
    }

    fn check(&self, request: &AuthorizationRequest) -> bool {
        match &self.index {
            Some(index) => index.contains(request),
            None => engine::has_permission(&self.grants, request),
        }
    }
}

/// One authorization session for one subject, e.g. an inbound request.
///
/// Grants are resolved lazily on first use and reused for every later
/// check in the session. Action codes found in the catalog are remembered
/// the same way.
pub struct GrantSession<'a, S: ?Sized> {
    store: &'a S,
    subject: SubjectRef,
    fingerprint_threshold: usize,
    resolved: OnceCell<ResolvedGrants>,
    defined_codes: RwLock<HashSet<String>>,
}

impl<'a, S> GrantSession<'a, S>
where
    S: AuthzStore + ?Sized,
{
    pub fn new(store: &'a S, subject: SubjectRef, fingerprint_threshold: usize) -> Self {
        Self {
            store,
            subject,
            fingerprint_threshold,
            resolved: OnceCell::new(),
            defined_codes: RwLock::new(HashSet::new()),
        }
    }

    pub fn subject(&self) -> &SubjectRef {
        &self.subject
    }

    async fn resolved(&self) -> Result<&ResolvedGrants, AuthzError> {
        self.resolved
            .get_or_try_init(|| async {
                let grants = resolve(self.store, &self.subject).await?;
                Ok::<_, AuthzError>(ResolvedGrants::new(grants, self.fingerprint_threshold))
            })
            .await
    }

    /// The memoized grant collection.
    pub async fn grants(&self) -> Result<&[NormalizedGrant], AuthzError> {
        Ok(&self.resolved().await?.grants)
    }

    /// Whether the grants are being answered through a [`FingerprintIndex`].
    pub async fn is_indexed(&self) -> Result<bool, AuthzError> {
        Ok(self.resolved().await?.index.is_some())
    }

    /// Drop the memoized grants and action codes, e.g. after mutating them
    /// in this session.
    pub fn invalidate(&mut self) {
        self.resolved = OnceCell::new();
        self.defined_codes.get_mut().clear();
    }

    async fn ensure_defined(&self, action_code: &str) -> Result<(), AuthzError> {
        if self.defined_codes.read().await.contains(action_code) {
            return Ok(());
        }

        if self.store.lookup_permission(action_code).await?.is_none() {
            return Err(AuthzError::PermissionUndefined(action_code.to_string()));
        }

        self.defined_codes
            .write()
            .await
            .insert(action_code.to_string());
        Ok(())
    }

    pub async fn has_permission(&self, request: &AuthorizationRequest) -> Result<bool, AuthzError> {
        self.ensure_defined(&request.action_code).await?;

        let allowed = self.resolved().await?.check(request);

        tracing::debug!(
            subject = %self.subject,
            code = %request.action_code,
            allowed,
            "Checked permission"
        );

        Ok(allowed)
    }

    /// True if any request is authorized; stops at the first that is.
    pub async fn has_any(&self, requests: &[AuthorizationRequest]) -> Result<bool, AuthzError> {
        for request in requests {
            if self.has_permission(request).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub async fn compile_predicate(&self, specs: &[ActionSpec]) -> Result<Predicate, AuthzError> {
        let resolved = self.resolved().await?;
        Ok(predicate::compile(&resolved.grants, specs))
    }
}
