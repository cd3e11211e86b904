use std::sync::Arc;

use arc_swap::ArcSwap;
use clap::Parser;
use owo_colors::OwoColorize as _;
use purge_bot::{
    Args,
    commands::framework,
    config::{BotCfg, SharedCfg},
    database::BotDatabase,
    purge::{PurgeManager, SerenityGateway},
};
use serenity::{
    Client,
    all::{GatewayIntents, Http},
};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt::time::ChronoLocal};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_ansi(true)
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S%.3f".to_owned()))
        .init();

    let args = Args::parse();
    let cfg = match BotCfg::read(&args.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load {}: {e}", args.config.display());
            return;
        }
    };
    info!("Loaded configuration from {}", args.config.display().green());

    let db = BotDatabase::new(&args.db)
        .await
        .expect("Failed to open database");
    db.migrate().await.expect("Failed to migrate database");

    let token = cfg.token.clone();
    let cfg: SharedCfg = Arc::new(ArcSwap::from_pointee(cfg));
    let http = Arc::new(Http::new(&token));
    let purge = Arc::new(PurgeManager::new(
        cfg.clone(),
        Arc::new(db),
        Arc::new(SerenityGateway::new(http)),
    ));

    // message content is needed to read wizard replies
    let intents = GatewayIntents::non_privileged() | GatewayIntents::MESSAGE_CONTENT;
    let mut client = Client::builder(&token, intents)
        .framework(framework(cfg, purge.clone()))
        .await
        .expect("Err creating client");

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutting down");
            shard_manager.shutdown_all().await;
        }
    });

    if let Err(why) = client.start().await {
        error!("Client error: {why:?}");
    }
    purge.shutdown().await;
}
