use std::time::Duration;

use chrono::{DateTime, Utc};
use entities::purge_configs::Model;
use serenity::all::{ChannelId, GuildId, UserId};

use super::media::MediaSet;
use crate::error::BotError;

/// A fully validated purge schedule for one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeConfig {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub interval: Duration,
    pub media: MediaSet,
    pub user_id: Option<UserId>,
    pub log_channel_id: Option<ChannelId>,
    pub active: bool,
    pub last_run: Option<DateTime<Utc>>,
}

impl PurgeConfig {
    pub fn new(
        guild_id: GuildId,
        channel_id: ChannelId,
        interval: Duration,
        media: MediaSet,
        user_id: Option<UserId>,
    ) -> Self {
        Self {
            guild_id,
            channel_id,
            interval,
            media,
            user_id,
            log_channel_id: None,
            active: true,
            last_run: None,
        }
    }

    pub fn with_log_channel(mut self, log_channel_id: Option<ChannelId>) -> Self {
        self.log_channel_id = log_channel_id;
        self
    }

    pub fn interval_ms(&self) -> i64 {
        i64::try_from(self.interval.as_millis()).unwrap_or(i64::MAX)
    }
}

impl TryFrom<Model> for PurgeConfig {
    type Error = BotError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let channel_id = model.channel();
        let invalid = |reason: String| BotError::InvalidConfig { channel_id, reason };
        if model.interval_ms <= 0 {
            return Err(invalid(format!("interval {}ms is not positive", model.interval_ms)));
        }
        let media = model
            .media_types
            .parse::<MediaSet>()
            .map_err(|e| invalid(e.to_string()))?;
        Ok(Self {
            guild_id: model.guild(),
            channel_id,
            interval: model.interval(),
            media,
            user_id: model.user(),
            log_channel_id: model.log_channel(),
            active: model.active,
            last_run: model.last_run,
        })
    }
}

/// Human readable interval such as `30s`, `2h` or `1d 6h`.
pub fn format_interval(interval: Duration) -> String {
    let mut secs = interval.as_secs();
    if secs == 0 {
        return format!("{}ms", interval.as_millis());
    }
    let mut parts = Vec::new();
    for (unit, size) in [("d", 86_400), ("h", 3_600), ("m", 60), ("s", 1)] {
        if secs >= size {
            parts.push(format!("{}{unit}", secs / size));
            secs %= size;
        }
    }
    parts.join(" ")
}
