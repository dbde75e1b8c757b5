use sea_orm_migration::prelude::*;

use super::m20250601_000001_users_table::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UserScores::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UserScores::UserId)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(UserScores::Rating).integer().not_null())
                    .col(
                        ColumnDef::new(UserScores::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(UserScores::Table, UserScores::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UserScores::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum UserScores {
    Table,
    UserId,
    Rating,
    UpdatedAt,
}
