use std::sync::Arc;

use chrono::Utc;
use futures::{StreamExt, stream};
use tracing::{debug, warn};

use super::{
    filter::matches,
    gateway::{PurgeGateway, PurgeSummary},
    model::PurgeConfig,
};
use crate::{config::SharedCfg, error::BotError, services::PurgeConfigService};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub scanned: usize,
    pub matched: usize,
    pub deleted: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurgeOutcome {
    Completed(PurgeReport),
    /// The channel was deleted or can no longer be read. Nothing was done.
    ChannelUnavailable,
}

/// Runs a single purge pass over the newest window of a channel.
pub struct PurgeExecutor {
    cfg: SharedCfg,
    gateway: Arc<dyn PurgeGateway>,
    store: Arc<dyn PurgeConfigService>,
}

impl PurgeExecutor {
    pub fn new(
        cfg: SharedCfg,
        gateway: Arc<dyn PurgeGateway>,
        store: Arc<dyn PurgeConfigService>,
    ) -> Self {
        Self {
            cfg,
            gateway,
            store,
        }
    }

    /// Deletes every matching, unpinned message in the window.
    ///
    /// Individual deletions fail independently. `Err` is only returned when
    /// the window cannot be fetched or `last_run` cannot be stored.
    pub async fn run_once(&self, config: &PurgeConfig) -> Result<PurgeOutcome, BotError> {
        let channel_id = config.channel_id;
        if self.gateway.text_channel(channel_id).await?.is_none() {
            warn!("Purge channel {channel_id} is unavailable, skipping");
            return Ok(PurgeOutcome::ChannelUnavailable);
        }

        let (window, concurrency) = {
            let cfg = self.cfg.load();
            (cfg.purge.window(), cfg.purge.concurrency())
        };
        let messages = self.gateway.recent_messages(channel_id, window).await?;
        let targets = messages
            .iter()
            .filter(|m| !m.pinned && matches(m, config))
            .map(|m| m.id)
            .collect::<Vec<_>>();
        debug!(
            "Purge channel {channel_id}: {} of {} messages match",
            targets.len(),
            messages.len()
        );

        let gateway = self.gateway.as_ref();
        let results = stream::iter(targets.iter().copied())
            .map(|message_id| async move {
                (
                    message_id,
                    gateway.delete_message(channel_id, message_id).await,
                )
            })
            .buffer_unordered(concurrency)
            .collect::<Vec<_>>()
            .await;
        let mut report = PurgeReport {
            scanned: messages.len(),
            matched: targets.len(),
            ..Default::default()
        };
        for (message_id, result) in results {
            match result {
                Ok(()) => report.deleted += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!("Failed to delete message {message_id} in channel {channel_id}: {e}");
                }
            }
        }

        self.store.touch_last_run(channel_id, Utc::now()).await?;

        if report.deleted > 0
            && let Some(log_channel) = config.log_channel_id
        {
            let summary = PurgeSummary {
                channel_id,
                deleted: report.deleted,
                failed: report.failed,
                media: config.media.clone(),
                user_id: config.user_id,
            };
            if let Err(e) = self.gateway.send_summary(log_channel, &summary).await {
                warn!("Failed to send purge summary to {log_channel}: {e}");
            }
        }
        Ok(PurgeOutcome::Completed(report))
    }
}
