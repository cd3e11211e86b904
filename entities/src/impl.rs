use serenity::all::*;

use crate::purge_configs::Model as PurgeConfigs;

impl PurgeConfigs {
    pub fn channel(&self) -> ChannelId {
        ChannelId::new(self.channel_id as u64)
    }
    pub fn guild(&self) -> GuildId {
        GuildId::new(self.guild_id as u64)
    }
    pub fn user(&self) -> Option<UserId> {
        self.user_id.map(|id| UserId::new(id as u64))
    }
    pub fn log_channel(&self) -> Option<ChannelId> {
        self.log_channel_id.map(|id| ChannelId::new(id as u64))
    }
    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.interval_ms.max(0) as u64)
    }
}
