use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use arc_swap::ArcSwap;
use figment::{
    Figment,
    providers::{Env, Format, Json},
};
use serde::{Deserialize, Serialize};
use serde_with::{DurationSeconds, serde_as};
use snafu::ResultExt;

use crate::error::BotError;

/// Largest page the message history endpoint returns.
pub const MAX_WINDOW_SIZE: u8 = 100;

#[derive(Deserialize, Serialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct BotCfg {
    pub token: String,
    #[serde(default)]
    pub purge: PurgeSettings,
    #[serde(skip)]
    pub path: PathBuf,
}

/// Tunables for the purge scheduler and the setup dialogue.
#[serde_as]
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct PurgeSettings {
    /// Messages fetched per tick, newest first.
    pub window_size: u8,
    #[serde_as(as = "DurationSeconds")]
    pub reply_timeout: Duration,
    pub max_attempts: u8,
    #[serde_as(as = "DurationSeconds")]
    pub min_interval: Duration,
    pub delete_concurrency: usize,
    pub cancel_keyword: String,
    pub none_keyword: String,
}

impl Default for PurgeSettings {
    fn default() -> Self {
        Self {
            window_size: MAX_WINDOW_SIZE,
            reply_timeout: Duration::from_secs(60),
            max_attempts: 3,
            min_interval: Duration::from_secs(5),
            delete_concurrency: 4,
            cancel_keyword: "cancel".into(),
            none_keyword: "none".into(),
        }
    }
}

impl PurgeSettings {
    pub fn window(&self) -> u8 {
        self.window_size.clamp(1, MAX_WINDOW_SIZE)
    }

    pub fn attempts(&self) -> u8 {
        self.max_attempts.max(1)
    }

    pub fn concurrency(&self) -> usize {
        self.delete_concurrency.max(1)
    }
}

pub type SharedCfg = Arc<ArcSwap<BotCfg>>;

impl BotCfg {
    pub fn read(path: impl AsRef<Path>) -> Result<Self, BotError> {
        Ok(Self {
            path: path.as_ref().to_owned(),
            ..Figment::new()
                .merge(Json::file(path))
                .merge(Env::prefixed("PURGE_BOT_"))
                .extract()
                .whatever_context::<&str, BotError>("Failed to read bot configuration")?
        })
    }

    /// Re-reads the file this configuration was loaded from.
    pub fn reload(&self) -> Result<Self, BotError> {
        Self::read(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_fill_missing_keys_with_defaults() {
        let settings: PurgeSettings = Figment::new()
            .merge(Json::string(r#"{"windowSize": 50, "replyTimeout": 30}"#))
            .extract()
            .unwrap();
        assert_eq!(settings.window(), 50);
        assert_eq!(settings.reply_timeout, Duration::from_secs(30));
        assert_eq!(settings.attempts(), 3);
        assert_eq!(settings.cancel_keyword, "cancel");
    }

    #[test]
    fn window_is_clamped_to_page_size() {
        let settings = PurgeSettings {
            window_size: 0,
            ..Default::default()
        };
        assert_eq!(settings.window(), 1);
        let settings = PurgeSettings {
            window_size: u8::MAX,
            ..Default::default()
        };
        assert_eq!(settings.window(), MAX_WINDOW_SIZE);
    }
}
