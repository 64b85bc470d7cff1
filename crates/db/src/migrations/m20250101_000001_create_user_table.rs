//! Create user table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(User::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(User::Id).string_len(32).not_null().primary_key())
                    .col(ColumnDef::new(User::Email).string_len(256).not_null().unique_key())
                    .col(ColumnDef::new(User::PasswordHash).string_len(256).not_null())
                    .col(ColumnDef::new(User::Role).string_len(16).not_null())
                    .col(ColumnDef::new(User::Hostel).string_len(64))
                    .col(ColumnDef::new(User::Block).string_len(8))
                    .col(ColumnDef::new(User::RoomNumber).string_len(16))
                    .col(ColumnDef::new(User::IsApproved).boolean().not_null().default(false))
                    .col(ColumnDef::new(User::IsAdmin).boolean().not_null().default(false))
                    .col(ColumnDef::new(User::ManagementRole).string_len(16))
                    .col(ColumnDef::new(User::Specialization).string_len(16))
                    .col(ColumnDef::new(User::RefreshToken).string_len(1024))
                    .col(
                        ColumnDef::new(User::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(User::UpdatedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        // Index: role (staff listings)
        manager
            .create_index(
                Index::create()
                    .name("idx_user_role")
                    .table(User::Table)
                    .col(User::Role)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(User::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum User {
    Table,
    Id,
    Email,
    PasswordHash,
    Role,
    Hostel,
    Block,
    RoomNumber,
    IsApproved,
    IsAdmin,
    ManagementRole,
    Specialization,
    RefreshToken,
    CreatedAt,
    UpdatedAt,
}
