//! Recurring media purges: the message filter, one-shot executor, per-channel
//! scheduler and the setup dialogue, tied together by [`PurgeManager`].

pub mod executor;
pub mod filter;
pub mod gateway;
pub mod media;
pub mod model;
pub mod scheduler;
#[cfg(test)]
mod testing;
pub mod wizard;

use std::{collections::HashMap, sync::Arc};

pub use executor::{PurgeExecutor, PurgeOutcome, PurgeReport};
pub use filter::MessageView;
pub use gateway::{PurgeGateway, SerenityGateway};
pub use media::{MediaSet, MediaType};
pub use model::{PurgeConfig, format_interval};
pub use scheduler::PurgeScheduler;
use serenity::all::{ChannelId, GuildId, UserId};
use tokio::sync::Mutex;
use tracing::info;
pub use wizard::{DialogueTransport, Reply, SetupWizard, WizardOutcome, WizardStep};

use crate::{config::SharedCfg, error::BotError, services::PurgeConfigService};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopReport {
    pub was_active: bool,
}

/// An active schedule and whether its task is currently running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeStatus {
    pub config: PurgeConfig,
    pub running: bool,
}

/// Entry point for everything the bot does with purge schedules.
pub struct PurgeManager {
    cfg: SharedCfg,
    store: Arc<dyn PurgeConfigService>,
    gateway: Arc<dyn PurgeGateway>,
    scheduler: PurgeScheduler,
    /// Serializes writes to a channel's row with starting or stopping its task.
    channel_locks: Mutex<HashMap<ChannelId, Arc<Mutex<()>>>>,
}

impl PurgeManager {
    pub fn new(
        cfg: SharedCfg,
        store: Arc<dyn PurgeConfigService>,
        gateway: Arc<dyn PurgeGateway>,
    ) -> Self {
        let executor = PurgeExecutor::new(cfg.clone(), gateway.clone(), store.clone());
        Self {
            cfg,
            store,
            gateway,
            scheduler: PurgeScheduler::new(Arc::new(executor)),
            channel_locks: Mutex::default(),
        }
    }

    async fn channel_lock(&self, channel_id: ChannelId) -> Arc<Mutex<()>> {
        let mut locks = self.channel_locks.lock().await;
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks.entry(channel_id).or_default().clone()
    }

    pub fn scheduler(&self) -> &PurgeScheduler {
        &self.scheduler
    }

    /// Walks `caller` through the setup dialogue over `transport`.
    pub async fn configure(
        &self,
        transport: &dyn DialogueTransport,
        guild_id: GuildId,
        caller: UserId,
        log_channel: Option<ChannelId>,
    ) -> Result<WizardOutcome, BotError> {
        SetupWizard {
            settings: self.cfg.load().purge.clone(),
            gateway: self.gateway.as_ref(),
            manager: self,
            transport,
            guild_id,
            caller,
            log_channel,
        }
        .run()
        .await
    }

    /// Saves `config` as the channel's active schedule and (re)starts its
    /// task. Nothing is started if the save fails.
    pub async fn commit(&self, config: &PurgeConfig) -> Result<PurgeConfig, BotError> {
        let lock = self.channel_lock(config.channel_id).await;
        let _guard = lock.lock().await;
        let saved = self.store.upsert(config).await?;
        self.scheduler.start(saved.clone()).await;
        Ok(saved)
    }

    /// Deactivates the schedule, then cancels its task. If the store cannot
    /// be updated the task keeps running.
    pub async fn stop(&self, channel_id: ChannelId) -> Result<StopReport, BotError> {
        let lock = self.channel_lock(channel_id).await;
        let _guard = lock.lock().await;
        let was_active = self.store.deactivate(channel_id).await?;
        self.scheduler.stop(channel_id).await;
        Ok(StopReport { was_active })
    }

    pub async fn status(&self, guild_id: GuildId) -> Result<Vec<PurgeStatus>, BotError> {
        let mut statuses = Vec::new();
        for config in self.store.guild_configs(guild_id, true).await? {
            let running = self.scheduler.is_scheduled(config.channel_id).await;
            statuses.push(PurgeStatus { config, running });
        }
        Ok(statuses)
    }

    /// Starts a task for every active config. Returns how many were started.
    pub async fn on_startup(&self, configs: Vec<PurgeConfig>) -> usize {
        let started = self.scheduler.rehydrate(configs).await;
        info!("Resumed {started} purge schedule(s)");
        started
    }

    pub async fn resume_from_store(&self) -> Result<usize, BotError> {
        let configs = self.store.active_configs().await?;
        Ok(self.on_startup(configs).await)
    }

    /// Runs one pass right away. `None` when the channel has no active
    /// schedule.
    pub async fn purge_now(&self, channel_id: ChannelId) -> Result<Option<PurgeOutcome>, BotError> {
        let Some(config) = self.store.get(channel_id).await?.filter(|c| c.active) else {
            return Ok(None);
        };
        self.scheduler.run_now(&config).await.map(Some)
    }

    /// Drops the schedule of a channel that no longer exists. Like
    /// [`Self::stop`], the task survives a failed store update.
    pub async fn forget_channel(&self, channel_id: ChannelId) -> Result<(), BotError> {
        let lock = self.channel_lock(channel_id).await;
        let _guard = lock.lock().await;
        let deactivated = self.store.deactivate(channel_id).await?;
        let stopped = self.scheduler.stop(channel_id).await;
        if stopped || deactivated {
            info!("Channel {channel_id} was deleted, its purge schedule is gone");
        }
        Ok(())
    }

    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
    }
}
