//! In-memory stand-ins for the platform, the store and the dialogue.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serenity::{
    all::{ChannelId, GuildId, MessageId, UserId},
    async_trait,
};
use snafu::whatever;

use super::{
    MessageView, PurgeConfig,
    gateway::{PurgeGateway, PurgeSummary, TextChannel},
    wizard::{DialogueTransport, Reply},
};
use crate::{
    config::{BotCfg, SharedCfg},
    error::BotError,
    services::PurgeConfigService,
};

pub fn shared_cfg() -> SharedCfg {
    Arc::new(ArcSwap::from_pointee(BotCfg::default()))
}

#[derive(Default)]
pub struct FakeGateway {
    channels: Mutex<HashMap<ChannelId, TextChannel>>,
    members: Mutex<HashSet<(GuildId, UserId)>>,
    messages: Mutex<HashMap<ChannelId, Vec<MessageView>>>,
    deleted: Mutex<Vec<(ChannelId, MessageId)>>,
    failing_deletes: Mutex<HashSet<MessageId>>,
    summaries: Mutex<Vec<(ChannelId, PurgeSummary)>>,
    fail_summaries: AtomicBool,
    fetch_delay: Mutex<Option<Duration>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    fetches: AtomicUsize,
}

impl FakeGateway {
    pub fn add_channel(&self, id: ChannelId, guild_id: GuildId, name: &str) {
        self.channels.lock().unwrap().insert(
            id,
            TextChannel {
                id,
                guild_id,
                name: name.into(),
            },
        );
    }

    pub fn add_member(&self, guild_id: GuildId, user_id: UserId) {
        self.members.lock().unwrap().insert((guild_id, user_id));
    }

    pub fn set_messages(&self, channel_id: ChannelId, messages: Vec<MessageView>) {
        self.messages.lock().unwrap().insert(channel_id, messages);
    }

    pub fn fail_delete(&self, message_id: MessageId) {
        self.failing_deletes.lock().unwrap().insert(message_id);
    }

    pub fn fail_summaries(&self) {
        self.fail_summaries.store(true, Ordering::SeqCst);
    }

    /// Makes every fetch take `delay`, to hold a tick in flight.
    pub fn set_fetch_delay(&self, delay: Duration) {
        *self.fetch_delay.lock().unwrap() = Some(delay);
    }

    pub fn deleted(&self, channel_id: ChannelId) -> Vec<MessageId> {
        self.deleted
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| *c == channel_id)
            .map(|(_, m)| *m)
            .collect()
    }

    pub fn summaries(&self) -> Vec<(ChannelId, PurgeSummary)> {
        self.summaries.lock().unwrap().clone()
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PurgeGateway for FakeGateway {
    async fn text_channel(&self, channel_id: ChannelId) -> Result<Option<TextChannel>, BotError> {
        Ok(self.channels.lock().unwrap().get(&channel_id).cloned())
    }

    async fn find_text_channel(
        &self,
        guild_id: GuildId,
        name: &str,
    ) -> Result<Option<TextChannel>, BotError> {
        Ok(self
            .channels
            .lock()
            .unwrap()
            .values()
            .find(|c| c.guild_id == guild_id && c.name.eq_ignore_ascii_case(name))
            .cloned())
    }

    async fn is_member(&self, guild_id: GuildId, user_id: UserId) -> Result<bool, BotError> {
        Ok(self.members.lock().unwrap().contains(&(guild_id, user_id)))
    }

    async fn recent_messages(
        &self,
        channel_id: ChannelId,
        limit: u8,
    ) -> Result<Vec<MessageView>, BotError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let delay = *self.fetch_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let deleted = self
            .deleted
            .lock()
            .unwrap()
            .iter()
            .map(|(_, m)| *m)
            .collect::<HashSet<_>>();
        Ok(self
            .messages
            .lock()
            .unwrap()
            .get(&channel_id)
            .map(|msgs| {
                msgs.iter()
                    .filter(|m| !deleted.contains(&m.id))
                    .take(limit as usize)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn delete_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
    ) -> Result<(), BotError> {
        if self.failing_deletes.lock().unwrap().contains(&message_id) {
            whatever!("Missing permissions to delete {message_id}");
        }
        self.deleted.lock().unwrap().push((channel_id, message_id));
        Ok(())
    }

    async fn send_summary(
        &self,
        log_channel: ChannelId,
        summary: &PurgeSummary,
    ) -> Result<(), BotError> {
        if self.fail_summaries.load(Ordering::SeqCst) {
            whatever!("Log channel {log_channel} rejected the summary");
        }
        self.summaries
            .lock()
            .unwrap()
            .push((log_channel, summary.clone()));
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<HashMap<ChannelId, PurgeConfig>>,
    fail_writes: AtomicBool,
    write_delay: Mutex<Option<Duration>>,
}

impl MemoryStore {
    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    /// Upserts return only after `delay`, with the row already written.
    pub fn set_write_delay(&self, delay: Duration) {
        *self.write_delay.lock().unwrap() = Some(delay);
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn insert(&self, config: PurgeConfig) {
        self.rows.lock().unwrap().insert(config.channel_id, config);
    }

    fn check_writable(&self) -> Result<(), BotError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            whatever!("database is locked");
        }
        Ok(())
    }
}

#[async_trait]
impl PurgeConfigService for MemoryStore {
    async fn upsert(&self, config: &PurgeConfig) -> Result<PurgeConfig, BotError> {
        self.check_writable()?;
        let saved = {
            let mut rows = self.rows.lock().unwrap();
            let last_run = rows.get(&config.channel_id).and_then(|c| c.last_run);
            let saved = PurgeConfig {
                active: true,
                last_run: last_run.or(config.last_run),
                ..config.clone()
            };
            rows.insert(config.channel_id, saved.clone());
            saved
        };
        let delay = *self.write_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(saved)
    }

    async fn get(&self, channel_id: ChannelId) -> Result<Option<PurgeConfig>, BotError> {
        Ok(self.rows.lock().unwrap().get(&channel_id).cloned())
    }

    async fn active_configs(&self) -> Result<Vec<PurgeConfig>, BotError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.active)
            .cloned()
            .collect())
    }

    async fn guild_configs(
        &self,
        guild_id: GuildId,
        active_only: bool,
    ) -> Result<Vec<PurgeConfig>, BotError> {
        let mut configs = self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.guild_id == guild_id && (c.active || !active_only))
            .cloned()
            .collect::<Vec<_>>();
        configs.sort_by_key(|c| c.channel_id);
        Ok(configs)
    }

    async fn deactivate(&self, channel_id: ChannelId) -> Result<bool, BotError> {
        self.check_writable()?;
        Ok(self
            .rows
            .lock()
            .unwrap()
            .get_mut(&channel_id)
            .map(|c| std::mem::replace(&mut c.active, false))
            .unwrap_or(false))
    }

    async fn touch_last_run(
        &self,
        channel_id: ChannelId,
        at: DateTime<Utc>,
    ) -> Result<(), BotError> {
        self.check_writable()?;
        if let Some(config) = self.rows.lock().unwrap().get_mut(&channel_id) {
            config.last_run = Some(at);
        }
        Ok(())
    }
}

/// Plays back a fixed list of replies. `None` entries, and running out of
/// script, behave like the caller staying silent until the timeout.
pub struct ScriptedDialogue {
    replies: Mutex<VecDeque<Option<Reply>>>,
    said: Mutex<Vec<String>>,
}

impl ScriptedDialogue {
    pub fn new(caller: UserId, replies: &[Option<&str>]) -> Self {
        Self {
            replies: Mutex::new(
                replies
                    .iter()
                    .map(|r| {
                        r.map(|content| Reply {
                            author: caller,
                            content: content.into(),
                        })
                    })
                    .collect(),
            ),
            said: Mutex::new(Vec::new()),
        }
    }

    /// Queues a reply from someone other than the caller.
    pub fn interject(&self, author: UserId, content: &str) {
        self.replies.lock().unwrap().push_front(Some(Reply {
            author,
            content: content.into(),
        }));
    }

    pub fn said(&self) -> Vec<String> {
        self.said.lock().unwrap().clone()
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().unwrap().len()
    }
}

#[async_trait]
impl DialogueTransport for ScriptedDialogue {
    async fn say(&self, text: String) -> Result<(), BotError> {
        self.said.lock().unwrap().push(text);
        Ok(())
    }

    async fn next_reply(&self, timeout: Duration) -> Result<Option<Reply>, BotError> {
        let next = self.replies.lock().unwrap().pop_front().flatten();
        if next.is_none() {
            tokio::time::sleep(timeout).await;
        }
        Ok(next)
    }
}
