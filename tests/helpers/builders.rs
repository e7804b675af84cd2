use prbac::authz::types::{Grant, ParamValue, ParameterValues, Permission, SubjectRef};
use prbac::storage::{self, NewPermission};
use sea_orm::DatabaseConnection;

/// Builder for catalog permissions
pub struct PermissionBuilder {
    code: String,
    scope: String,
    parameters: Vec<String>,
    description: String,
}

impl PermissionBuilder {
    pub fn new(code: &str) -> Self {
        Self {
            code: code.to_string(),
            scope: "global".to_string(),
            parameters: Vec::new(),
            description: String::new(),
        }
    }

    pub fn scope(mut self, scope: &str) -> Self {
        self.scope = scope.to_string();
        self
    }

    pub fn parameter(mut self, name: &str) -> Self {
        self.parameters.push(name.to_string());
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub async fn create(self, db: &DatabaseConnection) -> Permission {
        storage::create_permission(
            db,
            NewPermission {
                code: self.code,
                description: self.description,
                scope: self.scope,
                parameters: self.parameters,
            },
        )
        .await
        .expect("Failed to create test permission")
    }
}

/// Builder for grants inserted straight into storage, bypassing the
/// idempotence checks of `Authorizer::grant`
pub struct GrantBuilder {
    subject: SubjectRef,
    permission: Permission,
    values: ParameterValues,
}

impl GrantBuilder {
    pub fn new(subject: SubjectRef, permission: &Permission) -> Self {
        Self {
            subject,
            permission: permission.clone(),
            values: ParameterValues::new(),
        }
    }

    pub fn value(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
        self.values.insert(name.to_string(), value.into());
        self
    }

    pub async fn create(self, db: &DatabaseConnection) -> Grant {
        let grant = Grant::new(self.subject, self.permission, self.values);
        storage::insert_grant(db, &grant)
            .await
            .expect("Failed to insert test grant");
        grant
    }
}
