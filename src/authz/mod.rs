pub mod engine;
pub mod errors;
pub mod mutator;
pub mod predicate;
pub mod resolver;
pub mod store;
pub mod types;
pub mod validation;

use crate::settings;
use errors::AuthzError;
use mutator::GrantOutcome;
use predicate::Predicate;
use resolver::GrantSession;
use store::AuthzStore;
use types::{ActionSpec, AuthorizationRequest, ParameterValues, SubjectRef};

/// Entry point for hosts: point checks, grant mutation and predicate
/// compilation against one store.
///
/// Every call resolves the subject's grants afresh. Hosts that run several
/// checks per request should open a [`GrantSession`] instead.
#[derive(Debug, Clone)]
pub struct Authorizer<S> {
    store: S,
    settings: settings::Authz,
}

impl<S: AuthzStore> Authorizer<S> {
    pub fn new(store: S, settings: settings::Authz) -> Self {
        Self { store, settings }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn session(&self, subject: SubjectRef) -> GrantSession<'_, S> {
        GrantSession::new(&self.store, subject, self.settings.fingerprint_threshold)
    }

    pub async fn has_permission(
        &self,
        subject: &SubjectRef,
        action_code: &str,
        parameter_values: &ParameterValues,
    ) -> Result<bool, AuthzError> {
        let request = AuthorizationRequest::new(action_code, parameter_values.clone());
        self.session(subject.clone()).has_permission(&request).await
    }

    pub async fn has_any(
        &self,
        subject: &SubjectRef,
        requests: &[AuthorizationRequest],
    ) -> Result<bool, AuthzError> {
        self.session(subject.clone()).has_any(requests).await
    }

    pub async fn grant(
        &self,
        subject: &SubjectRef,
        action_code: &str,
        parameter_values: ParameterValues,
    ) -> Result<GrantOutcome, AuthzError> {
        mutator::grant(&self.store, subject, action_code, parameter_values).await
    }

    pub async fn revoke(
        &self,
        subject: &SubjectRef,
        action_code: &str,
        parameter_values: ParameterValues,
    ) -> Result<(), AuthzError> {
        mutator::revoke(&self.store, subject, action_code, parameter_values).await
    }

    pub async fn compile_predicate(
        &self,
        subject: &SubjectRef,
        specs: &[ActionSpec],
    ) -> Result<Predicate, AuthzError> {
        self.session(subject.clone()).compile_predicate(specs).await
    }
}
