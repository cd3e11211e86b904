use std::{fmt, future::Future, sync::LazyLock, time::Duration};

use itertools::Itertools;
use regex::Regex;
use serenity::{
    all::{ChannelId, GuildId, Mentionable, UserId},
    async_trait,
};
use snafu::Snafu;
use tokio::time::Instant;
use tracing::{debug, info};

use super::{
    PurgeManager,
    gateway::{PurgeGateway, TextChannel},
    media::{MediaSet, MediaType, ParseMediaError},
    model::{PurgeConfig, format_interval},
};
use crate::{config::PurgeSettings, error::BotError};

/// Intervals longer than this are rejected so timer deadlines stay sane.
pub const MAX_INTERVAL: Duration = Duration::from_secs(365 * 86_400);

static INTERVAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(\d+)\s*([smhd])$").unwrap());

/// A message posted in the dialogue channel while the wizard is waiting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub author: UserId,
    pub content: String,
}

/// Where the wizard sends prompts and reads replies from.
#[async_trait]
pub trait DialogueTransport: Send + Sync {
    async fn say(&self, text: String) -> Result<(), BotError>;

    /// Next message in the dialogue channel, from anyone. `Ok(None)` when
    /// nothing arrives within `timeout`.
    async fn next_reply(&self, timeout: Duration) -> Result<Option<Reply>, BotError>;
}

/// Why a reply was rejected. Shown to the caller before the re-prompt.
#[derive(Debug, Snafu)]
pub enum InvalidReply {
    #[snafu(display("I can't find a text channel `{input}` in this server."))]
    UnknownChannel { input: String },
    #[snafu(display("`{input}` is not an interval. Use a number followed by s, m, h or d."))]
    MalformedInterval { input: String },
    #[snafu(display("The interval must be longer than zero."))]
    ZeroInterval,
    #[snafu(display("The interval must be at least {}.", format_interval(min.to_owned())))]
    IntervalTooShort { min: Duration },
    #[snafu(display("The interval can be at most {}.", format_interval(max.to_owned())))]
    IntervalTooLong { max: Duration },
    #[snafu(display("{source}."))]
    BadMedia { source: ParseMediaError },
    #[snafu(display("`{input}` is not a member of this server."))]
    UnknownUser { input: String },
    #[snafu(display("No reply within {}.", format_interval(timeout.to_owned())))]
    NoReply { timeout: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardStep {
    Channel,
    Interval,
    MediaTypes,
    User,
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WizardStep::Channel => "channel",
            WizardStep::Interval => "interval",
            WizardStep::MediaTypes => "media types",
            WizardStep::User => "user",
        })
    }
}

/// How a setup dialogue ended. Only `Done` has persisted anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardOutcome {
    Done(PurgeConfig),
    Cancelled,
    Aborted { step: WizardStep },
}

enum WizardState {
    AwaitingChannel,
    AwaitingInterval {
        channel: TextChannel,
    },
    AwaitingMediaTypes {
        channel: TextChannel,
        interval: Duration,
    },
    AwaitingUser {
        channel: TextChannel,
        interval: Duration,
        media: MediaSet,
    },
    Committing(PurgeConfig),
}

enum Answer<T> {
    Given(T),
    Cancelled,
    Exhausted,
}

type Validation<T> = Result<Result<T, InvalidReply>, BotError>;

/// One guided setup dialogue with a single caller.
pub struct SetupWizard<'a> {
    pub(super) settings: PurgeSettings,
    pub(super) gateway: &'a dyn PurgeGateway,
    pub(super) manager: &'a PurgeManager,
    pub(super) transport: &'a dyn DialogueTransport,
    pub(super) guild_id: GuildId,
    pub(super) caller: UserId,
    pub(super) log_channel: Option<ChannelId>,
}

impl SetupWizard<'_> {
    /// Runs the dialogue to a terminal outcome and acknowledges it once.
    ///
    /// The config is written in a single upsert after the last answer, and
    /// the task only starts once that write succeeded. A failed write is
    /// returned as `Err` with no task started.
    pub async fn run(&self) -> Result<WizardOutcome, BotError> {
        let mut state = WizardState::AwaitingChannel;
        let outcome = loop {
            state = match state {
                WizardState::AwaitingChannel => {
                    let prompt = format!(
                        "Which channel should be purged? Mention it or type its name. \
                         Type `{}` at any time to stop.",
                        self.settings.cancel_keyword
                    );
                    match self.ask(&prompt, |text| self.channel_reply(text)).await? {
                        Answer::Given(channel) => WizardState::AwaitingInterval { channel },
                        Answer::Cancelled => break WizardOutcome::Cancelled,
                        Answer::Exhausted => {
                            break WizardOutcome::Aborted {
                                step: WizardStep::Channel,
                            };
                        }
                    }
                }
                WizardState::AwaitingInterval { channel } => {
                    let min = self.settings.min_interval;
                    let validate =
                        move |text: String| async move { Ok(parse_interval(&text, min)) };
                    let prompt = "How often? Use a number followed by s, m, h or d, \
                                  for example `30s` or `2h`.";
                    match self.ask(prompt, validate).await? {
                        Answer::Given(interval) => {
                            WizardState::AwaitingMediaTypes { channel, interval }
                        }
                        Answer::Cancelled => break WizardOutcome::Cancelled,
                        Answer::Exhausted => {
                            break WizardOutcome::Aborted {
                                step: WizardStep::Interval,
                            };
                        }
                    }
                }
                WizardState::AwaitingMediaTypes { channel, interval } => {
                    let validate = |text: String| async move {
                        Ok(text
                            .parse::<MediaSet>()
                            .map_err(|source| InvalidReply::BadMedia { source }))
                    };
                    let prompt = format!(
                        "Which media types? Comma separated, from: {}.",
                        MediaType::VARIANTS.iter().join(", ")
                    );
                    match self.ask(&prompt, validate).await? {
                        Answer::Given(media) => WizardState::AwaitingUser {
                            channel,
                            interval,
                            media,
                        },
                        Answer::Cancelled => break WizardOutcome::Cancelled,
                        Answer::Exhausted => {
                            break WizardOutcome::Aborted {
                                step: WizardStep::MediaTypes,
                            };
                        }
                    }
                }
                WizardState::AwaitingUser {
                    channel,
                    interval,
                    media,
                } => {
                    let prompt = format!(
                        "Only purge messages from one user? Mention them or type `{}`.",
                        self.settings.none_keyword
                    );
                    let user_id = match self.ask(&prompt, |text| self.user_reply(text)).await? {
                        Answer::Given(user_id) => user_id,
                        Answer::Cancelled => break WizardOutcome::Cancelled,
                        Answer::Exhausted => {
                            self.transport
                                .say("No usable user given, purging messages from everyone.".into())
                                .await?;
                            None
                        }
                    };
                    WizardState::Committing(
                        PurgeConfig::new(self.guild_id, channel.id, interval, media, user_id)
                            .with_log_channel(self.log_channel),
                    )
                }
                WizardState::Committing(config) => {
                    let saved = self.manager.commit(&config).await?;
                    info!(
                        "{} configured purge for channel {} in guild {}",
                        self.caller, saved.channel_id, saved.guild_id
                    );
                    break WizardOutcome::Done(saved);
                }
            };
        };
        self.transport.say(acknowledgement(&outcome)).await?;
        Ok(outcome)
    }

    /// Prompts until `validate` accepts a reply, the caller cancels, or the
    /// attempt budget runs out. A missing reply costs an attempt like an
    /// invalid one.
    async fn ask<T, F, Fut>(&self, prompt: &str, validate: F) -> Result<Answer<T>, BotError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Validation<T>>,
    {
        let attempts = self.settings.attempts();
        let mut rejection: Option<InvalidReply> = None;
        for attempt in 1..=attempts {
            let text = match rejection.take() {
                Some(why) => format!("{why} {prompt} (attempt {attempt}/{attempts})"),
                None => prompt.to_owned(),
            };
            self.transport.say(text).await?;

            let Some(reply) = self.caller_reply().await? else {
                rejection = Some(InvalidReply::NoReply {
                    timeout: self.settings.reply_timeout,
                });
                continue;
            };
            let reply = reply.trim();
            if reply.eq_ignore_ascii_case(&self.settings.cancel_keyword) {
                return Ok(Answer::Cancelled);
            }
            match validate(reply.to_owned()).await? {
                Ok(value) => return Ok(Answer::Given(value)),
                Err(why) => {
                    debug!("Rejected setup reply from {}: {why}", self.caller);
                    rejection = Some(why);
                }
            }
        }
        Ok(Answer::Exhausted)
    }

    /// Waits for the caller's next message, skipping everyone else's.
    async fn caller_reply(&self) -> Result<Option<String>, BotError> {
        let deadline = Instant::now() + self.settings.reply_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            match self.transport.next_reply(remaining).await? {
                Some(reply) if reply.author == self.caller => return Ok(Some(reply.content)),
                Some(reply) => debug!("Ignoring setup reply from {}", reply.author),
                None => return Ok(None),
            }
        }
    }

    async fn channel_reply(&self, text: String) -> Validation<TextChannel> {
        let unknown = || InvalidReply::UnknownChannel {
            input: text.clone(),
        };
        let channel = match parse_mention(&text, "<#", ">") {
            Some(id) => self
                .gateway
                .text_channel(ChannelId::new(id))
                .await?
                .filter(|c| c.guild_id == self.guild_id),
            None => {
                let name = text.trim_start_matches('#');
                self.gateway.find_text_channel(self.guild_id, name).await?
            }
        };
        Ok(channel.ok_or_else(unknown))
    }

    async fn user_reply(&self, text: String) -> Validation<Option<UserId>> {
        if text.eq_ignore_ascii_case(&self.settings.none_keyword) {
            return Ok(Ok(None));
        }
        let id = parse_mention(&text, "<@!", ">").or_else(|| parse_mention(&text, "<@", ">"));
        let Some(user_id) = id.map(UserId::new) else {
            return Ok(UnknownUserSnafu { input: text }.fail());
        };
        if self.gateway.is_member(self.guild_id, user_id).await? {
            Ok(Ok(Some(user_id)))
        } else {
            Ok(UnknownUserSnafu { input: text }.fail())
        }
    }
}

/// Accepts `<prefix>id<suffix>` or a bare id. Zero is never a valid id.
fn parse_mention(text: &str, prefix: &str, suffix: &str) -> Option<u64> {
    let inner = text
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_suffix(suffix))
        .unwrap_or(text);
    inner.parse::<u64>().ok().filter(|id| *id != 0)
}

/// Parses `30s`, `15m`, `2h`, `1d`.
pub fn parse_interval(text: &str, min: Duration) -> Result<Duration, InvalidReply> {
    let malformed = || InvalidReply::MalformedInterval {
        input: text.to_owned(),
    };
    let caps = INTERVAL.captures(text.trim()).ok_or_else(malformed)?;
    let amount = caps[1].parse::<u64>().map_err(|_| malformed())?;
    let unit = match caps[2].to_ascii_lowercase().as_str() {
        "s" => 1,
        "m" => 60,
        "h" => 3_600,
        _ => 86_400,
    };
    let Some(secs) = amount.checked_mul(unit) else {
        return IntervalTooLongSnafu { max: MAX_INTERVAL }.fail();
    };
    let interval = Duration::from_secs(secs);
    if interval.is_zero() {
        return ZeroIntervalSnafu.fail();
    }
    if interval < min {
        return IntervalTooShortSnafu { min }.fail();
    }
    if interval > MAX_INTERVAL {
        return IntervalTooLongSnafu { max: MAX_INTERVAL }.fail();
    }
    Ok(interval)
}

fn acknowledgement(outcome: &WizardOutcome) -> String {
    match outcome {
        WizardOutcome::Done(config) => {
            let user = config
                .user_id
                .map_or_else(|| "everyone".to_owned(), |u| u.mention().to_string());
            format!(
                "✅ Purging {} in {} every {}, from {user}.",
                config.media,
                config.channel_id.mention(),
                format_interval(config.interval)
            )
        }
        WizardOutcome::Cancelled => "Setup cancelled. Nothing was changed.".to_owned(),
        WizardOutcome::Aborted { step } => {
            format!("❌ Too many invalid answers for the {step}. Setup aborted, nothing was changed.")
        }
    }
}
