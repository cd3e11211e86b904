use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One purge schedule per channel. `channel_id` is the upsert key.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "purge_configs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub channel_id: i64,
    pub guild_id: i64,
    pub interval_ms: i64,
    /// Comma separated media type names, e.g. `attachments,gifs`.
    pub media_types: String,
    pub user_id: Option<i64>,
    pub log_channel_id: Option<i64>,
    pub active: bool,
    pub last_run: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
