use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::Utc;
use serenity::all::ChannelId;
use tokio::{
    spawn,
    sync::{Mutex, RwLock, oneshot},
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval_at},
};
use tracing::{debug, error, info, warn};

use super::{
    executor::{PurgeExecutor, PurgeOutcome},
    model::{PurgeConfig, format_interval},
};
use crate::error::BotError;

/// `interval_at` panics on a zero period.
const MIN_PERIOD: Duration = Duration::from_millis(1);

struct PurgeTask {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Owns one recurring purge task per active channel.
///
/// Ticks of one channel never overlap: the task awaits each pass before
/// waiting for the next firing, and manual passes share the same per-channel
/// lock. Different channels run independently.
pub struct PurgeScheduler {
    executor: Arc<PurgeExecutor>,
    tasks: RwLock<HashMap<ChannelId, PurgeTask>>,
    run_locks: Mutex<HashMap<ChannelId, Arc<Mutex<()>>>>,
}

impl PurgeScheduler {
    pub fn new(executor: Arc<PurgeExecutor>) -> Self {
        Self {
            executor,
            tasks: RwLock::default(),
            run_locks: Mutex::default(),
        }
    }

    async fn run_lock(&self, channel_id: ChannelId) -> Arc<Mutex<()>> {
        self.run_locks
            .lock()
            .await
            .entry(channel_id)
            .or_default()
            .clone()
    }

    /// (Re)starts the recurring task for `config.channel_id`, replacing any
    /// task already running for that channel.
    pub async fn start(&self, config: PurgeConfig) {
        let channel_id = config.channel_id;
        let lock = self.run_lock(channel_id).await;
        let (stop, stopped) = oneshot::channel();
        let interval = config.interval;
        let handle = spawn(run_task(self.executor.clone(), lock, config, stopped));

        let previous = self
            .tasks
            .write()
            .await
            .insert(channel_id, PurgeTask { stop, handle });
        if let Some(previous) = previous {
            let _ = previous.stop.send(());
            info!("Replaced purge task for channel {channel_id}");
        }
        info!(
            "Scheduled purge for channel {channel_id} every {}",
            format_interval(interval)
        );
    }

    /// Cancels the task for `channel_id`. A pass already running finishes,
    /// but no further pass starts. Returns whether a task existed.
    pub async fn stop(&self, channel_id: ChannelId) -> bool {
        let task = self.tasks.write().await.remove(&channel_id);
        let existed = task.is_some();
        if let Some(task) = task {
            let _ = task.stop.send(());
            info!("Stopped purge task for channel {channel_id}");
        }
        self.prune_run_locks().await;
        existed
    }

    /// Drops run locks nobody holds. Running tasks and manual passes keep a
    /// clone, so only locks of finished work go away.
    async fn prune_run_locks(&self) {
        self.run_locks
            .lock()
            .await
            .retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    #[cfg(test)]
    async fn run_lock_count(&self) -> usize {
        self.run_locks.lock().await.len()
    }

    /// Starts a task for every active config. Returns how many were started.
    pub async fn rehydrate(&self, configs: impl IntoIterator<Item = PurgeConfig>) -> usize {
        let mut started = 0;
        for config in configs.into_iter().filter(|c| c.active) {
            self.start(config).await;
            started += 1;
        }
        started
    }

    /// One pass outside the schedule, serialized with scheduled ticks.
    pub async fn run_now(&self, config: &PurgeConfig) -> Result<PurgeOutcome, BotError> {
        let lock = self.run_lock(config.channel_id).await;
        let _guard = lock.lock().await;
        self.executor.run_once(config).await
    }

    pub async fn is_scheduled(&self, channel_id: ChannelId) -> bool {
        self.tasks.read().await.contains_key(&channel_id)
    }

    pub async fn scheduled(&self) -> Vec<ChannelId> {
        let mut channels = self.tasks.read().await.keys().copied().collect::<Vec<_>>();
        channels.sort();
        channels
    }

    /// Stops every task and waits for in-flight passes to finish.
    pub async fn shutdown(&self) {
        let tasks = self.tasks.write().await.drain().collect::<Vec<_>>();
        for (channel_id, task) in tasks {
            let _ = task.stop.send(());
            if let Err(e) = task.handle.await {
                warn!("Purge task for channel {channel_id} ended abnormally: {e}");
            }
        }
    }
}

/// Delay before the first pass so a restart does not reset the cadence.
fn first_delay(config: &PurgeConfig, period: Duration) -> Duration {
    let Some(last_run) = config.last_run else {
        return period;
    };
    let elapsed = (Utc::now() - last_run).to_std().unwrap_or_default();
    period.saturating_sub(elapsed)
}

async fn run_task(
    executor: Arc<PurgeExecutor>,
    lock: Arc<Mutex<()>>,
    config: PurgeConfig,
    mut stopped: oneshot::Receiver<()>,
) {
    let channel_id = config.channel_id;
    let period = config.interval.max(MIN_PERIOD);
    let mut ticker = interval_at(Instant::now() + first_delay(&config, period), period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = &mut stopped => break,
            _ = ticker.tick() => {}
        }
        let _guard = tokio::select! {
            biased;
            _ = &mut stopped => break,
            guard = lock.lock() => guard,
        };
        debug!("Purge tick for channel {channel_id}");
        match executor.run_once(&config).await {
            Ok(PurgeOutcome::Completed(report)) if report.deleted > 0 || report.failed > 0 => {
                info!(
                    "Purged {} message(s) in channel {channel_id} ({} failed)",
                    report.deleted, report.failed
                );
            }
            Ok(PurgeOutcome::Completed(_)) => {}
            Ok(PurgeOutcome::ChannelUnavailable) => {
                warn!("Channel {channel_id} is unavailable, will retry next tick");
            }
            Err(e) => error!("Purge tick for channel {channel_id} failed: {e}"),
        }
    }
    debug!("Purge task for channel {channel_id} exited");
}
