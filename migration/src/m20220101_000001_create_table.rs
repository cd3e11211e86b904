use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // channel_id is the primary key so reconfiguring a channel is a
        // single-row upsert
        manager
            .create_table(
                Table::create()
                    .table(PurgeConfigs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PurgeConfigs::ChannelId)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(PurgeConfigs::GuildId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PurgeConfigs::IntervalMs)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PurgeConfigs::MediaTypes)
                            .text()
                            .not_null()
                            .default("all"),
                    )
                    .col(ColumnDef::new(PurgeConfigs::UserId).big_integer().null())
                    .col(
                        ColumnDef::new(PurgeConfigs::LogChannelId)
                            .big_integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(PurgeConfigs::Active)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(PurgeConfigs::LastRun)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(PurgeConfigs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(PurgeConfigs::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_purge_configs_guild_active")
                    .table(PurgeConfigs::Table)
                    .col(PurgeConfigs::GuildId)
                    .col(PurgeConfigs::Active)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PurgeConfigs::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum PurgeConfigs {
    Table,
    ChannelId,
    GuildId,
    IntervalMs,
    MediaTypes,
    UserId,
    LogChannelId,
    Active,
    LastRun,
    CreatedAt,
    UpdatedAt,
}
