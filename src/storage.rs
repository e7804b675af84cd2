use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Database, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use sea_orm_migration::MigratorTrait;
use serde::{Deserialize, Serialize};

use crate::authz::errors::AuthzError;
use crate::authz::store::{GrantStore, GroupMembership, PermissionCatalog};
use crate::authz::types::{Grant, ParameterValues, Permission, SubjectKind, SubjectRef};
use crate::authz::validation::validate_grant;
use crate::entities;
use crate::errors::PrbacError;
use crate::settings::Database as DbCfg;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPermission {
    pub code: String,
    #[serde(default)]
    pub description: String,
    pub scope: String,
    #[serde(default)]
    pub parameters: Vec<String>,
}

pub async fn init(cfg: &DbCfg) -> Result<DatabaseConnection, PrbacError> {
    let db = Database::connect(&cfg.url).await?;
    if cfg.auto_migrate {
        migrate(&db).await?;
    }
    Ok(db)
}

pub async fn migrate(db: &DatabaseConnection) -> Result<(), PrbacError> {
    migration::Migrator::up(db, None).await?;
    tracing::info!("Database schema is up to date");
    Ok(())
}

fn permission_from_model(model: entities::permission::Model) -> Result<Permission, PrbacError> {
    let parameters: Vec<String> = serde_json::from_str(&model.parameters)?;
    Ok(Permission {
        code: model.code,
        description: model.description,
        scope: model.scope,
        parameters: parameters.into_iter().collect(),
    })
}

fn encode_values(values: &ParameterValues) -> Result<String, PrbacError> {
    Ok(serde_json::to_string(values)?)
}

fn decode_values(json: &str) -> Result<ParameterValues, PrbacError> {
    Ok(serde_json::from_str(json)?)
}

// ============================================================================
// Permission catalog
// ============================================================================

pub async fn create_permission(
    db: &DatabaseConnection,
    input: NewPermission,
) -> Result<Permission, PrbacError> {
    if input.code.trim().is_empty() {
        return Err(PrbacError::BadRequest("permission code must not be empty".into()));
    }

    let permission = Permission::new(input.code, input.scope, input.parameters)
        .with_description(input.description);
    let parameters: Vec<&String> = permission.parameters.iter().collect();

    let model = entities::permission::ActiveModel {
        id: Default::default(),
        code: Set(permission.code.clone()),
        description: Set(permission.description.clone()),
        scope: Set(permission.scope.clone()),
        parameters: Set(serde_json::to_string(&parameters)?),
        created_at: Set(Utc::now().timestamp()),
    };
    model.insert(db).await?;

    tracing::info!(code = %permission.code, "Created permission");
    Ok(permission)
}

async fn permission_model_by_code(
    db: &DatabaseConnection,
    code: &str,
) -> Result<Option<entities::permission::Model>, PrbacError> {
    use entities::permission::{Column, Entity};

    Ok(Entity::find().filter(Column::Code.eq(code)).one(db).await?)
}

pub async fn get_permission_by_code(
    db: &DatabaseConnection,
    code: &str,
) -> Result<Option<Permission>, PrbacError> {
    permission_model_by_code(db, code)
        .await?
        .map(permission_from_model)
        .transpose()
}

pub async fn list_permissions(db: &DatabaseConnection) -> Result<Vec<Permission>, PrbacError> {
    use entities::permission::{Column, Entity};

    Entity::find()
        .order_by_asc(Column::Code)
        .all(db)
        .await?
        .into_iter()
        .map(permission_from_model)
        .collect()
}

async fn permissions_by_id(
    db: &DatabaseConnection,
    ids: impl IntoIterator<Item = i32>,
) -> Result<HashMap<i32, Permission>, PrbacError> {
    use entities::permission::{Column, Entity};

    let ids: Vec<i32> = ids.into_iter().collect();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    Entity::find()
        .filter(Column::Id.is_in(ids))
        .all(db)
        .await?
        .into_iter()
        .map(|model| Ok::<_, PrbacError>((model.id, permission_from_model(model)?)))
        .collect()
}

// ============================================================================
// Users and groups
// ============================================================================

pub async fn create_user(
    db: &DatabaseConnection,
    id: &str,
    username: &str,
) -> Result<entities::user::Model, PrbacError> {
    let user = entities::user::ActiveModel {
        id: Set(id.to_string()),
        username: Set(username.to_string()),
        is_active: Set(true),
        created_at: Set(Utc::now().timestamp()),
    };
    Ok(user.insert(db).await?)
}

pub async fn get_user(
    db: &DatabaseConnection,
    id: &str,
) -> Result<Option<entities::user::Model>, PrbacError> {
    Ok(entities::User::find_by_id(id.to_string()).one(db).await?)
}

pub async fn set_user_active(
    db: &DatabaseConnection,
    id: &str,
    is_active: bool,
) -> Result<(), PrbacError> {
    if let Some(user) = get_user(db, id).await? {
        let mut active: entities::user::ActiveModel = user.into();
        active.is_active = Set(is_active);
        active.update(db).await?;
    }
    Ok(())
}

pub async fn create_group(
    db: &DatabaseConnection,
    id: &str,
    name: &str,
) -> Result<entities::group::Model, PrbacError> {
    let group = entities::group::ActiveModel {
        id: Set(id.to_string()),
        name: Set(name.to_string()),
        created_at: Set(Utc::now().timestamp()),
    };
    Ok(group.insert(db).await?)
}

pub async fn add_user_to_group(
    db: &DatabaseConnection,
    group_id: &str,
    user_id: &str,
) -> Result<(), PrbacError> {
    use entities::group_member::{ActiveModel, Column, Entity};

    let member = ActiveModel {
        group_id: Set(group_id.to_string()),
        user_id: Set(user_id.to_string()),
    };

    Entity::insert(member)
        .on_conflict(
            OnConflict::columns([Column::GroupId, Column::UserId])
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

    Ok(())
}

pub async fn remove_user_from_group(
    db: &DatabaseConnection,
    group_id: &str,
    user_id: &str,
) -> Result<(), PrbacError> {
    use entities::group_member::{Column, Entity};

    Entity::delete_many()
        .filter(Column::GroupId.eq(group_id))
        .filter(Column::UserId.eq(user_id))
        .exec(db)
        .await?;

    Ok(())
}

// ============================================================================
// Grants
// ============================================================================

/// Administrative insertion of a grant, validated like every other entry
/// point. Returns false when the identical grant already exists.
pub async fn insert_grant(db: &DatabaseConnection, grant: &Grant) -> Result<bool, AuthzError> {
    validate_grant(grant)?;
    Ok(db.create_grant(grant).await?)
}

/// Grants held directly by `subject`, for display.
pub async fn list_grants(
    db: &DatabaseConnection,
    subject: &SubjectRef,
) -> Result<Vec<Grant>, PrbacError> {
    db.direct_grants_of(subject).await
}

/// Rows as (permission id, parameter values json) plus the subject they belong to.
async fn grants_from_rows(
    db: &DatabaseConnection,
    rows: Vec<(SubjectRef, i32, String)>,
) -> Result<Vec<Grant>, PrbacError> {
    let permissions = permissions_by_id(db, rows.iter().map(|(_, id, _)| *id)).await?;

    rows.into_iter()
        .map(|(subject, permission_id, values)| {
            let permission = permissions.get(&permission_id).cloned().ok_or_else(|| {
                PrbacError::CorruptRecord(format!(
                    "grant of {subject} references missing permission {permission_id}"
                ))
            })?;
            Ok::<_, PrbacError>(Grant::new(subject, permission, decode_values(&values)?))
        })
        .collect()
}

fn ignore_duplicate(result: Result<u64, DbErr>) -> Result<bool, PrbacError> {
    match result {
        Ok(rows) => Ok(rows > 0),
        Err(DbErr::RecordNotInserted) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl PermissionCatalog for DatabaseConnection {
    async fn lookup_permission(&self, code: &str) -> Result<Option<Permission>, PrbacError> {
        get_permission_by_code(self, code).await
    }
}

#[async_trait]
impl GroupMembership for DatabaseConnection {
    async fn subject_exists(&self, subject: &SubjectRef) -> Result<bool, PrbacError> {
        let exists = match subject.kind {
            SubjectKind::User => entities::User::find_by_id(subject.id.clone())
                .one(self)
                .await?
                .is_some(),
            SubjectKind::Group => entities::Group::find_by_id(subject.id.clone())
                .one(self)
                .await?
                .is_some(),
        };
        Ok(exists)
    }

    async fn groups_of(&self, user_id: &str) -> Result<Vec<String>, PrbacError> {
        use entities::group_member::{Column, Entity};

        Ok(Entity::find()
            .filter(Column::UserId.eq(user_id))
            .order_by_asc(Column::GroupId)
            .all(self)
            .await?
            .into_iter()
            .map(|m| m.group_id)
            .collect())
    }
}

#[async_trait]
impl GrantStore for DatabaseConnection {
    async fn direct_grants_of(&self, subject: &SubjectRef) -> Result<Vec<Grant>, PrbacError> {
        let rows: Vec<(SubjectRef, i32, String)> = match subject.kind {
            SubjectKind::User => {
                use entities::user_grant::{Column, Entity};

                Entity::find()
                    .filter(Column::UserId.eq(subject.id.as_str()))
                    .order_by_asc(Column::Id)
                    .all(self)
                    .await?
                    .into_iter()
                    .map(|m| (subject.clone(), m.permission_id, m.parameter_values))
                    .collect()
            }
            SubjectKind::Group => {
                use entities::group_grant::{Column, Entity};

                Entity::find()
                    .filter(Column::GroupId.eq(subject.id.as_str()))
                    .order_by_asc(Column::Id)
                    .all(self)
                    .await?
                    .into_iter()
                    .map(|m| (subject.clone(), m.permission_id, m.parameter_values))
                    .collect()
            }
        };

        grants_from_rows(self, rows).await
    }

    async fn group_grants_of(&self, group_ids: &[String]) -> Result<Vec<Grant>, PrbacError> {
        use entities::group_grant::{Column, Entity};

        if group_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<(SubjectRef, i32, String)> = Entity::find()
            .filter(Column::GroupId.is_in(group_ids.iter().cloned()))
            .order_by_asc(Column::Id)
            .all(self)
            .await?
            .into_iter()
            .map(|m| (SubjectRef::group(m.group_id), m.permission_id, m.parameter_values))
            .collect();

        grants_from_rows(self, rows).await
    }

    async fn create_grant(&self, grant: &Grant) -> Result<bool, PrbacError> {
        let permission = permission_model_by_code(self, &grant.permission.code)
            .await?
            .ok_or_else(|| {
                PrbacError::BadRequest(format!("unknown permission `{}`", grant.permission.code))
            })?;
        let values = encode_values(&grant.parameter_values)?;
        let now = Utc::now().timestamp();

        let result = match grant.subject.kind {
            SubjectKind::User => {
                use entities::user_grant::{ActiveModel, Column, Entity};

                let row = ActiveModel {
                    id: Default::default(),
                    user_id: Set(grant.subject.id.clone()),
                    permission_id: Set(permission.id),
                    parameter_values: Set(values),
                    created_at: Set(now),
                };
                Entity::insert(row)
                    .on_conflict(
                        OnConflict::columns([
                            Column::UserId,
                            Column::PermissionId,
                            Column::ParameterValues,
                        ])
                        .do_nothing()
                        .to_owned(),
                    )
                    .exec_without_returning(self)
                    .await
            }
            SubjectKind::Group => {
                use entities::group_grant::{ActiveModel, Column, Entity};

                let row = ActiveModel {
                    id: Default::default(),
                    group_id: Set(grant.subject.id.clone()),
                    permission_id: Set(permission.id),
                    parameter_values: Set(values),
                    created_at: Set(now),
                };
                Entity::insert(row)
                    .on_conflict(
                        OnConflict::columns([
                            Column::GroupId,
                            Column::PermissionId,
                            Column::ParameterValues,
                        ])
                        .do_nothing()
                        .to_owned(),
                    )
                    .exec_without_returning(self)
                    .await
            }
        };

        ignore_duplicate(result)
    }

    async fn delete_grant(&self, grant: &Grant) -> Result<bool, PrbacError> {
        let Some(permission) = permission_model_by_code(self, &grant.permission.code).await? else {
            return Ok(false);
        };
        let values = encode_values(&grant.parameter_values)?;

        let deleted = match grant.subject.kind {
            SubjectKind::User => {
                use entities::user_grant::{Column, Entity};

                Entity::delete_many()
                    .filter(Column::UserId.eq(grant.subject.id.as_str()))
                    .filter(Column::PermissionId.eq(permission.id))
                    .filter(Column::ParameterValues.eq(values))
                    .exec(self)
                    .await?
                    .rows_affected
            }
            SubjectKind::Group => {
                use entities::group_grant::{Column, Entity};

                Entity::delete_many()
                    .filter(Column::GroupId.eq(grant.subject.id.as_str()))
                    .filter(Column::PermissionId.eq(permission.id))
                    .filter(Column::ParameterValues.eq(values))
                    .exec(self)
                    .await?
                    .rows_affected
            }
        };

        Ok(deleted > 0)
    }
}
