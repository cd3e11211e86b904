use std::time::Duration;

use futures::{Stream, StreamExt, stream::BoxStream};
use itertools::Itertools;
use poise::{CreateReply, command};
use serenity::{
    all::{
        ChannelId, CreateEmbed, CreateEmbedFooter, GuildChannel, Mentionable, Message,
        MessageCollector,
    },
    async_trait,
};
use tokio::sync::Mutex;
use tracing::info;

use super::Context;
use crate::{
    error::BotError,
    purge::{
        DialogueTransport, PurgeOutcome, PurgeStatus, Reply, WizardOutcome, format_interval,
    },
};

/// Runs the setup dialogue in the channel the command was used in. One
/// collector lives for the whole dialogue so no reply falls between steps.
struct PoiseDialogue<'a> {
    ctx: Context<'a>,
    replies: Mutex<BoxStream<'static, Message>>,
}

impl<'a> PoiseDialogue<'a> {
    fn new(ctx: Context<'a>, channel_id: ChannelId) -> Self {
        let replies = MessageCollector::new(ctx.serenity_context())
            .channel_id(channel_id)
            .filter(|m| !m.author.bot)
            .stream()
            .boxed();
        Self {
            ctx,
            replies: Mutex::new(replies),
        }
    }
}

/// Next item of `stream`, or `None` once `timeout` passes.
async fn next_within<S: Stream + Unpin>(stream: &mut S, timeout: Duration) -> Option<S::Item> {
    tokio::time::timeout(timeout, stream.next())
        .await
        .ok()
        .flatten()
}

#[async_trait]
impl DialogueTransport for PoiseDialogue<'_> {
    async fn say(&self, text: String) -> Result<(), BotError> {
        self.ctx.say(text).await?;
        Ok(())
    }

    async fn next_reply(&self, timeout: Duration) -> Result<Option<Reply>, BotError> {
        let mut replies = self.replies.lock().await;
        let message = next_within(&mut *replies, timeout).await;
        Ok(message.map(|m| Reply {
            author: m.author.id,
            content: m.content,
        }))
    }
}

#[command(
    slash_command,
    guild_only,
    subcommands("setup", "stop", "status", "now"),
    subcommand_required,
    required_permissions = "MANAGE_MESSAGES",
    default_member_permissions = "MANAGE_MESSAGES"
)]
/// Recurring media purges for this server's channels.
pub async fn purge(_: Context<'_>) -> Result<(), BotError> {
    Ok(())
}

#[command(slash_command, guild_only, required_permissions = "MANAGE_MESSAGES")]
/// Set up or replace the recurring purge of a channel.
pub async fn setup(
    ctx: Context<'_>,
    #[description = "Where to post a summary after each purge"]
    #[channel_types("Text")]
    log_channel: Option<GuildChannel>,
) -> Result<(), BotError> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };
    let dialogue = PoiseDialogue::new(ctx, ctx.channel_id());
    let outcome = ctx
        .data()
        .purge
        .configure(
            &dialogue,
            guild_id,
            ctx.author().id,
            log_channel.map(|c| c.id),
        )
        .await?;
    if let WizardOutcome::Aborted { step } = outcome {
        info!("Purge setup by {} aborted at the {step} step", ctx.author().id);
    }
    Ok(())
}

#[command(
    slash_command,
    guild_only,
    required_permissions = "MANAGE_MESSAGES",
    ephemeral
)]
/// Stop purging a channel. Its settings are kept.
pub async fn stop(
    ctx: Context<'_>,
    #[description = "Channel to stop, defaults to this one"] channel: Option<GuildChannel>,
) -> Result<(), BotError> {
    let channel_id = channel.map_or_else(|| ctx.channel_id(), |c| c.id);
    let report = ctx.data().purge.stop(channel_id).await?;
    let message = if report.was_active {
        format!("🛑 Stopped purging {}.", channel_id.mention())
    } else {
        format!("{} has no active purge.", channel_id.mention())
    };
    ctx.say(message).await?;
    Ok(())
}

fn describe(status: &PurgeStatus) -> String {
    let config = &status.config;
    let mut lines = vec![
        format!("Every **{}**", format_interval(config.interval)),
        format!("Media: {}", config.media),
        format!(
            "From: {}",
            config
                .user_id
                .map_or_else(|| "everyone".to_owned(), |u| u.mention().to_string())
        ),
        match config.last_run {
            Some(at) => format!("Last run: <t:{}:R>", at.timestamp()),
            None => "Last run: never".to_owned(),
        },
    ];
    if let Some(log) = config.log_channel_id {
        lines.push(format!("Log: {}", log.mention()));
    }
    if !status.running {
        lines.push("⚠️ not running, reconfigure to restart".to_owned());
    }
    lines.join("\n")
}

#[command(
    slash_command,
    guild_only,
    required_permissions = "MANAGE_MESSAGES",
    ephemeral
)]
/// List the active purges of this server.
pub async fn status(ctx: Context<'_>) -> Result<(), BotError> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };
    let statuses = ctx.data().purge.status(guild_id).await?;
    if statuses.is_empty() {
        ctx.say("No active purges in this server.").await?;
        return Ok(());
    }
    let channel_name = |id: ChannelId| {
        ctx.guild()
            .and_then(|g| g.channels.get(&id).map(|c| format!("#{}", c.name)))
            .unwrap_or_else(|| id.to_string())
    };
    // an embed holds at most 25 fields
    let mut embed = statuses.iter().take(25).fold(
        CreateEmbed::new()
            .title("🧹 Active purges")
            .color(0xFF0000)
            .description(format!("{} channel(s)", statuses.len())),
        |embed, status| {
            embed.field(
                channel_name(status.config.channel_id),
                describe(status),
                false,
            )
        },
    );
    if statuses.len() > 25 {
        embed = embed.footer(CreateEmbedFooter::new(format!(
            "and {} more",
            statuses.len() - 25
        )));
    }
    ctx.send(CreateReply::default().embed(embed)).await?;
    Ok(())
}

#[command(
    slash_command,
    guild_only,
    required_permissions = "MANAGE_MESSAGES",
    ephemeral
)]
/// Run a channel's purge right now.
pub async fn now(
    ctx: Context<'_>,
    #[description = "Channel to purge, defaults to this one"] channel: Option<GuildChannel>,
) -> Result<(), BotError> {
    let channel_id = channel.map_or_else(|| ctx.channel_id(), |c| c.id);
    ctx.defer_ephemeral().await?;
    let message = match ctx.data().purge.purge_now(channel_id).await? {
        None => format!("{} has no active purge.", channel_id.mention()),
        Some(PurgeOutcome::ChannelUnavailable) => {
            format!("I can't read {} right now.", channel_id.mention())
        }
        Some(PurgeOutcome::Completed(report)) => {
            let mut parts = vec![format!(
                "Deleted {} of {} scanned message(s) in {}",
                report.deleted,
                report.scanned,
                channel_id.mention()
            )];
            if report.failed > 0 {
                parts.push(format!("{} could not be deleted", report.failed));
            }
            parts.iter().join(", ")
        }
    };
    ctx.say(message).await?;
    Ok(())
}
