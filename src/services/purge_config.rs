use chrono::{DateTime, Utc};
use entities::purge_configs::*;
use sea_orm::{
    ActiveValue::Set,
    QueryOrder,
    prelude::*,
    sea_query::{Expr, OnConflict},
};
use serenity::{
    all::{ChannelId, GuildId},
    async_trait,
};
use snafu::OptionExt;
use tracing::warn;

use crate::{database::BotDatabase, error::BotError, purge::PurgeConfig};

/// Durable storage for purge schedules, one row per channel.
#[async_trait]
pub trait PurgeConfigService: Send + Sync {
    /// Insert or replace the schedule for `config.channel_id` and mark it
    /// active. `last_run` of an existing row is preserved.
    async fn upsert(&self, config: &PurgeConfig) -> Result<PurgeConfig, BotError>;

    async fn get(&self, channel_id: ChannelId) -> Result<Option<PurgeConfig>, BotError>;

    /// Every active schedule across all guilds. Rows that no longer decode
    /// are skipped.
    async fn active_configs(&self) -> Result<Vec<PurgeConfig>, BotError>;

    async fn guild_configs(
        &self,
        guild_id: GuildId,
        active_only: bool,
    ) -> Result<Vec<PurgeConfig>, BotError>;

    /// Mark the schedule inactive, keeping the row. Returns whether it was
    /// active before.
    async fn deactivate(&self, channel_id: ChannelId) -> Result<bool, BotError>;

    async fn touch_last_run(&self, channel_id: ChannelId, at: DateTime<Utc>)
    -> Result<(), BotError>;
}

fn decode_all(models: Vec<Model>) -> Vec<PurgeConfig> {
    models
        .into_iter()
        .filter_map(|model| match PurgeConfig::try_from(model) {
            Ok(config) => Some(config),
            Err(e) => {
                warn!("Skipping purge config: {e}");
                None
            }
        })
        .collect()
}

#[async_trait]
impl PurgeConfigService for BotDatabase {
    async fn upsert(&self, config: &PurgeConfig) -> Result<PurgeConfig, BotError> {
        let now = Utc::now();
        let channel_id = config.channel_id.get() as i64;
        let model = ActiveModel {
            channel_id: Set(channel_id),
            guild_id: Set(config.guild_id.get() as i64),
            interval_ms: Set(config.interval_ms()),
            media_types: Set(config.media.to_stored()),
            user_id: Set(config.user_id.map(|id| id.get() as i64)),
            log_channel_id: Set(config.log_channel_id.map(|id| id.get() as i64)),
            active: Set(true),
            last_run: Set(config.last_run),
            created_at: Set(now),
            updated_at: Set(now),
        };
        Entity::insert(model)
            .on_conflict(
                OnConflict::column(Column::ChannelId)
                    .update_columns([
                        Column::GuildId,
                        Column::IntervalMs,
                        Column::MediaTypes,
                        Column::UserId,
                        Column::LogChannelId,
                        Column::Active,
                        Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(self.inner())
            .await?;
        Entity::find_by_id(channel_id)
            .one(self.inner())
            .await?
            .whatever_context::<&str, BotError>("Purge config vanished right after upsert")?
            .try_into()
    }

    async fn get(&self, channel_id: ChannelId) -> Result<Option<PurgeConfig>, BotError> {
        Entity::find_by_id(channel_id.get() as i64)
            .one(self.inner())
            .await?
            .map(PurgeConfig::try_from)
            .transpose()
    }

    async fn active_configs(&self) -> Result<Vec<PurgeConfig>, BotError> {
        let models = Entity::find()
            .filter(Column::Active.eq(true))
            .order_by_asc(Column::ChannelId)
            .all(self.inner())
            .await?;
        Ok(decode_all(models))
    }

    async fn guild_configs(
        &self,
        guild_id: GuildId,
        active_only: bool,
    ) -> Result<Vec<PurgeConfig>, BotError> {
        let mut query = Entity::find().filter(Column::GuildId.eq(guild_id.get() as i64));
        if active_only {
            query = query.filter(Column::Active.eq(true));
        }
        let models = query
            .order_by_asc(Column::ChannelId)
            .all(self.inner())
            .await?;
        Ok(decode_all(models))
    }

    async fn deactivate(&self, channel_id: ChannelId) -> Result<bool, BotError> {
        // single conditional update, so concurrent stops agree on who
        // flipped the flag
        let result = Entity::update_many()
            .col_expr(Column::Active, Expr::value(false))
            .col_expr(Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(Column::ChannelId.eq(channel_id.get() as i64))
            .filter(Column::Active.eq(true))
            .exec(self.inner())
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn touch_last_run(
        &self,
        channel_id: ChannelId,
        at: DateTime<Utc>,
    ) -> Result<(), BotError> {
        Entity::update_many()
            .col_expr(Column::LastRun, Expr::value(at))
            .filter(Column::ChannelId.eq(channel_id.get() as i64))
            .exec(self.inner())
            .await?;
        Ok(())
    }
}
