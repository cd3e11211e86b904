use std::sync::Arc;

use serenity::{
    all::{
        Channel, ChannelId, ChannelType, CreateEmbed, CreateEmbedFooter, CreateMessage,
        GetMessages, GuildChannel, GuildId, Http, Mentionable, MessageId, UserId,
    },
    async_trait,
    http::HttpError,
};

use super::{filter::MessageView, media::MediaSet};
use crate::error::BotError;

const DELETE_REASON: &str = "Scheduled purge";

/// A text channel messages can be read from and deleted in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChannel {
    pub id: ChannelId,
    pub guild_id: GuildId,
    pub name: String,
}

/// What a purge pass posts to the log channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeSummary {
    pub channel_id: ChannelId,
    pub deleted: usize,
    pub failed: usize,
    pub media: MediaSet,
    pub user_id: Option<UserId>,
}

/// Everything the purge core needs from the chat platform. Each call may
/// fail on its own; callers decide whether a failure is fatal.
#[async_trait]
pub trait PurgeGateway: Send + Sync {
    /// `Ok(None)` when the channel is gone, inaccessible or not text based.
    async fn text_channel(&self, channel_id: ChannelId) -> Result<Option<TextChannel>, BotError>;

    async fn find_text_channel(
        &self,
        guild_id: GuildId,
        name: &str,
    ) -> Result<Option<TextChannel>, BotError>;

    async fn is_member(&self, guild_id: GuildId, user_id: UserId) -> Result<bool, BotError>;

    /// Up to `limit` of the newest messages, newest first.
    async fn recent_messages(
        &self,
        channel_id: ChannelId,
        limit: u8,
    ) -> Result<Vec<MessageView>, BotError>;

    async fn delete_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
    ) -> Result<(), BotError>;

    async fn send_summary(
        &self,
        log_channel: ChannelId,
        summary: &PurgeSummary,
    ) -> Result<(), BotError>;
}

pub struct SerenityGateway {
    http: Arc<Http>,
}

impl SerenityGateway {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

/// Discord answers 403/404 for channels and members we cannot see.
fn is_missing(err: &serenity::Error) -> bool {
    matches!(
        err,
        serenity::Error::Http(HttpError::UnsuccessfulRequest(resp))
            if matches!(resp.status_code.as_u16(), 403 | 404)
    )
}

fn as_text_channel(channel: GuildChannel) -> Option<TextChannel> {
    matches!(
        channel.kind,
        ChannelType::Text
            | ChannelType::News
            | ChannelType::PublicThread
            | ChannelType::PrivateThread
            | ChannelType::NewsThread
    )
    .then(|| TextChannel {
        id: channel.id,
        guild_id: channel.guild_id,
        name: channel.name,
    })
}

#[async_trait]
impl PurgeGateway for SerenityGateway {
    async fn text_channel(&self, channel_id: ChannelId) -> Result<Option<TextChannel>, BotError> {
        match channel_id.to_channel(&*self.http).await {
            Ok(Channel::Guild(channel)) => Ok(as_text_channel(channel)),
            Ok(_) => Ok(None),
            Err(e) if is_missing(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_text_channel(
        &self,
        guild_id: GuildId,
        name: &str,
    ) -> Result<Option<TextChannel>, BotError> {
        let channels = guild_id.channels(&*self.http).await?;
        Ok(channels
            .into_values()
            .filter(|c| c.name.eq_ignore_ascii_case(name))
            .find_map(as_text_channel))
    }

    async fn is_member(&self, guild_id: GuildId, user_id: UserId) -> Result<bool, BotError> {
        match guild_id.member(&*self.http, user_id).await {
            Ok(_) => Ok(true),
            Err(e) if is_missing(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn recent_messages(
        &self,
        channel_id: ChannelId,
        limit: u8,
    ) -> Result<Vec<MessageView>, BotError> {
        let messages = channel_id
            .messages(&*self.http, GetMessages::new().limit(limit))
            .await?;
        Ok(messages.iter().map(MessageView::from).collect())
    }

    async fn delete_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
    ) -> Result<(), BotError> {
        self.http
            .delete_message(channel_id, message_id, Some(DELETE_REASON))
            .await?;
        Ok(())
    }

    async fn send_summary(
        &self,
        log_channel: ChannelId,
        summary: &PurgeSummary,
    ) -> Result<(), BotError> {
        let mut embed = CreateEmbed::new()
            .title("🧹 Purge complete")
            .color(0xFF0000)
            .field("Channel", summary.channel_id.mention().to_string(), true)
            .field("Deleted", summary.deleted.to_string(), true)
            .field("Media", summary.media.to_string(), true)
            .timestamp(chrono::Utc::now());
        if let Some(user) = summary.user_id {
            embed = embed.field("User", user.mention().to_string(), true);
        }
        if summary.failed > 0 {
            embed = embed.footer(CreateEmbedFooter::new(format!(
                "{} message(s) could not be deleted",
                summary.failed
            )));
        }
        log_channel
            .send_message(&*self.http, CreateMessage::new().embed(embed))
            .await?;
        Ok(())
    }
}
