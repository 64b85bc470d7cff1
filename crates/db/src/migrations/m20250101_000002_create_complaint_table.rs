//! Create complaint table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Complaint::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Complaint::Id).string_len(32).not_null().primary_key())
                    .col(ColumnDef::new(Complaint::StudentId).string_len(32).not_null())
                    .col(ColumnDef::new(Complaint::Category).string_len(16).not_null())
                    .col(
                        ColumnDef::new(Complaint::Priority)
                            .string_len(16)
                            .not_null()
                            .default("medium"),
                    )
                    .col(ColumnDef::new(Complaint::Description).text().not_null())
                    .col(
                        ColumnDef::new(Complaint::Media)
                            .json_binary()
                            .not_null()
                            .default(Expr::cust("'[]'::jsonb")),
                    )
                    .col(ColumnDef::new(Complaint::IsPublic).boolean().not_null().default(false))
                    .col(ColumnDef::new(Complaint::Hostel).string_len(64).not_null())
                    .col(ColumnDef::new(Complaint::Block).string_len(8).not_null())
                    .col(ColumnDef::new(Complaint::RoomNumber).string_len(16).not_null())
                    .col(
                        ColumnDef::new(Complaint::Status)
                            .string_len(16)
                            .not_null()
                            .default("reported"),
                    )
                    .col(ColumnDef::new(Complaint::MergedInto).string_len(32))
                    .col(
                        ColumnDef::new(Complaint::MergedIssues)
                            .json_binary()
                            .not_null()
                            .default(Expr::cust("'[]'::jsonb")),
                    )
                    .col(ColumnDef::new(Complaint::Caretaker).string_len(128))
                    .col(ColumnDef::new(Complaint::CaretakerId).string_len(32))
                    .col(
                        ColumnDef::new(Complaint::Timeline)
                            .json_binary()
                            .not_null()
                            .default(Expr::cust("'[]'::jsonb")),
                    )
                    .col(
                        ColumnDef::new(Complaint::Upvotes)
                            .json_binary()
                            .not_null()
                            .default(Expr::cust("'[]'::jsonb")),
                    )
                    .col(
                        ColumnDef::new(Complaint::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Complaint::UpdatedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_complaint_student")
                            .from(Complaint::Table, Complaint::StudentId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: student_id (the "my issues" view)
        manager
            .create_index(
                Index::create()
                    .name("idx_complaint_student_id")
                    .table(Complaint::Table)
                    .col(Complaint::StudentId)
                    .to_owned(),
            )
            .await?;

        // Index: status + category (the caretaker "available" view)
        manager
            .create_index(
                Index::create()
                    .name("idx_complaint_status_category")
                    .table(Complaint::Table)
                    .col(Complaint::Status)
                    .col(Complaint::Category)
                    .to_owned(),
            )
            .await?;

        // Index: caretaker_id
        manager
            .create_index(
                Index::create()
                    .name("idx_complaint_caretaker_id")
                    .table(Complaint::Table)
                    .col(Complaint::CaretakerId)
                    .to_owned(),
            )
            .await?;

        // Index: is_public (community feed)
        manager
            .create_index(
                Index::create()
                    .name("idx_complaint_is_public")
                    .table(Complaint::Table)
                    .col(Complaint::IsPublic)
                    .to_owned(),
            )
            .await?;

        // Index: created_at (newest-first ordering)
        manager
            .create_index(
                Index::create()
                    .name("idx_complaint_created_at")
                    .table(Complaint::Table)
                    .col(Complaint::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Complaint::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Complaint {
    Table,
    Id,
    StudentId,
    Category,
    Priority,
    Description,
    Media,
    IsPublic,
    Hostel,
    Block,
    RoomNumber,
    Status,
    MergedInto,
    MergedIssues,
    Caretaker,
    CaretakerId,
    Timeline,
    Upvotes,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
