use serenity::all::ChannelId;
use tracing::debug;

use crate::{commands::Data, error::BotError};

/// A deleted channel can never be purged again, so its schedule goes too.
pub async fn channel_deleted(data: &Data, channel_id: ChannelId) -> Result<(), BotError> {
    debug!("Channel {channel_id} was deleted");
    data.purge.forget_channel(channel_id).await
}
