use crate::authz::engine::{self, complies};
use crate::authz::errors::AuthzError;
use crate::authz::resolver::{load_grants, normalize};
use crate::authz::store::AuthzStore;
use crate::authz::types::{
    AuthorizationRequest, Grant, ParameterValues, Permission, SubjectRef,
};
use crate::authz::validation::validate_grant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantOutcome {
    /// A new grant row was stored.
    Created,
    /// The subject already holds this exact grant or a blanket grant of the
    /// same permission; nothing was stored.
    AlreadyImplied,
}

async fn lookup<S>(store: &S, action_code: &str) -> Result<Permission, AuthzError>
where
    S: AuthzStore + ?Sized,
{
    store
        .lookup_permission(action_code)
        .await?
        .ok_or_else(|| AuthzError::PermissionUndefined(action_code.to_string()))
}

/// Give `subject` the permission `action_code` bound to `parameter_values`.
///
/// Idempotent: a call is a no-op when an identical or blanket direct grant
/// already exists. The storage layer's unique index covers concurrent
/// callers racing past that check.
pub async fn grant<S>(
    store: &S,
    subject: &SubjectRef,
    action_code: &str,
    parameter_values: ParameterValues,
) -> Result<GrantOutcome, AuthzError>
where
    S: AuthzStore + ?Sized,
{
    let permission = lookup(store, action_code).await?;
    let candidate = Grant::new(subject.clone(), permission, parameter_values);
    validate_grant(&candidate)?;

    if !store.subject_exists(subject).await? {
        return Err(AuthzError::SubjectNotFound(subject.to_string()));
    }

    let request = AuthorizationRequest::new(action_code, candidate.parameter_values.clone());
    let implied = store
        .direct_grants_of(subject)
        .await?
        .iter()
        .any(|existing| complies(&existing.normalize(), &request));

    if implied {
        tracing::debug!(subject = %subject, code = action_code, "Grant already implied");
        return Ok(GrantOutcome::AlreadyImplied);
    }

    if !store.create_grant(&candidate).await? {
        // Lost a race against an identical insert
        return Ok(GrantOutcome::AlreadyImplied);
    }

    tracing::info!(
        subject = %subject,
        code = action_code,
        blanket = candidate.is_blanket(),
        "Granted permission"
    );

    Ok(GrantOutcome::Created)
}

/// Remove the direct grant of `action_code` with exactly `parameter_values`.
///
/// Succeeds only when the subject is left without the access. Fails with
/// [`AuthzError::PermissionNotRevocable`], deleting nothing, when another
/// grant (blanket, group or both) would still authorize the request, and
/// with [`AuthzError::GrantNotFound`] when the subject has no such access.
pub async fn revoke<S>(
    store: &S,
    subject: &SubjectRef,
    action_code: &str,
    parameter_values: ParameterValues,
) -> Result<(), AuthzError>
where
    S: AuthzStore + ?Sized,
{
    let permission = lookup(store, action_code).await?;
    let request = AuthorizationRequest::new(action_code, parameter_values);

    let mut grants = load_grants(store, subject).await?;
    let target = grants
        .iter()
        .position(|g| {
            g.subject == *subject
                && g.permission.code == permission.code
                && g.parameter_values == request.parameter_values
        })
        .map(|pos| grants.remove(pos));

    if engine::has_permission(&normalize(grants), &request) {
        tracing::warn!(
            subject = %subject,
            code = action_code,
            "Revocation refused: access is held through a broader or inherited grant"
        );
        return Err(AuthzError::PermissionNotRevocable {
            subject: subject.to_string(),
            code: action_code.to_string(),
        });
    }

    if let Some(target) = target {
        // False only when a concurrent revoke removed it first
        if store.delete_grant(&target).await? {
            tracing::info!(subject = %subject, code = action_code, "Revoked permission");
            return Ok(());
        }
    }

    Err(AuthzError::GrantNotFound {
        subject: subject.to_string(),
        code: action_code.to_string(),
    })
}
