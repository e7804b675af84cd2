//! Collaborators the engine consumes. `storage` implements all of them for
//! a `sea_orm::DatabaseConnection`.

use async_trait::async_trait;

use crate::authz::types::{Grant, Permission, SubjectRef};
use crate::errors::PrbacError;

#[async_trait]
pub trait PermissionCatalog: Send + Sync {
    async fn lookup_permission(&self, code: &str) -> Result<Option<Permission>, PrbacError>;
}

#[async_trait]
pub trait GroupMembership: Send + Sync {
    async fn subject_exists(&self, subject: &SubjectRef) -> Result<bool, PrbacError>;

    /// Ids of the groups a user belongs to.
    async fn groups_of(&self, user_id: &str) -> Result<Vec<String>, PrbacError>;
}

#[async_trait]
pub trait GrantStore: Send + Sync {
    /// Grants held by the subject itself, not through groups.
    async fn direct_grants_of(&self, subject: &SubjectRef) -> Result<Vec<Grant>, PrbacError>;

    async fn group_grants_of(&self, group_ids: &[String]) -> Result<Vec<Grant>, PrbacError>;

    /// Persist a grant. Returns false when an identical
    /// (subject, permission, parameter values) row already exists.
    async fn create_grant(&self, grant: &Grant) -> Result<bool, PrbacError>;

    /// Delete the exactly matching grant. Returns false when none existed.
    async fn delete_grant(&self, grant: &Grant) -> Result<bool, PrbacError>;
}

/// Everything the engine needs from its host.
pub trait AuthzStore: PermissionCatalog + GroupMembership + GrantStore {}

impl<T> AuthzStore for T where T: PermissionCatalog + GroupMembership + GrantStore + ?Sized {}
