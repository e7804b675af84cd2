use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create user_grants table
        manager
            .create_table(
                Table::create()
                    .table(UserGrants::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UserGrants::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(string(UserGrants::UserId))
                    .col(integer(UserGrants::PermissionId))
                    // Canonical (key-sorted) JSON object, `{}` for blanket grants
                    .col(ColumnDef::new(UserGrants::ParameterValues).text().not_null().default("{}"))
                    .col(big_integer(UserGrants::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_grants_user")
                            .from(UserGrants::Table, UserGrants::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_grants_permission")
                            .from(UserGrants::Table, UserGrants::PermissionId)
                            .to(Permissions::Table, Permissions::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One row per (user, permission, parameter assignment)
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("uq_user_grants_subject_permission_values")
                    .table(UserGrants::Table)
                    .col(UserGrants::UserId)
                    .col(UserGrants::PermissionId)
                    .col(UserGrants::ParameterValues)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Create group_grants table
        manager
            .create_table(
                Table::create()
                    .table(GroupGrants::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(GroupGrants::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(string(GroupGrants::GroupId))
                    .col(integer(GroupGrants::PermissionId))
                    .col(ColumnDef::new(GroupGrants::ParameterValues).text().not_null().default("{}"))
                    .col(big_integer(GroupGrants::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_group_grants_group")
                            .from(GroupGrants::Table, GroupGrants::GroupId)
                            .to(Groups::Table, Groups::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_group_grants_permission")
                            .from(GroupGrants::Table, GroupGrants::PermissionId)
                            .to(Permissions::Table, Permissions::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("uq_group_grants_subject_permission_values")
                    .table(GroupGrants::Table)
                    .col(GroupGrants::GroupId)
                    .col(GroupGrants::PermissionId)
                    .col(GroupGrants::ParameterValues)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(GroupGrants::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(UserGrants::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Permissions {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Groups {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum UserGrants {
    Table,
    Id,
    UserId,
    PermissionId,
    ParameterValues,
    CreatedAt,
}

#[derive(DeriveIden)]
enum GroupGrants {
    Table,
    Id,
    GroupId,
    PermissionId,
    ParameterValues,
    CreatedAt,
}
