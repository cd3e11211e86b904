mod admin;
mod purge;

use std::sync::Arc;

use owo_colors::OwoColorize as _;
use serenity::all::FullEvent;
use tracing::{error, info};

use crate::{config::SharedCfg, error::BotError, handlers, purge::PurgeManager};
use admin::*;
use purge::*;

pub type Context<'a> = poise::Context<'a, Data, BotError>;

pub struct Data {
    pub cfg: SharedCfg,
    pub purge: Arc<PurgeManager>,
}

async fn on_error(error: poise::FrameworkError<'_, Data, BotError>) {
    match error {
        poise::FrameworkError::Setup { error, .. } => panic!("Failed to start bot: {error}"),
        poise::FrameworkError::Command { error, ctx, .. } => {
            error!("Error in command `{}`: {}", ctx.command().name, error);
            if let Err(e) = ctx.say(format!("❌ {error}")).await {
                error!("Failed to report command error: {e}");
            }
        }
        error => {
            if let Err(e) = poise::builtins::on_error(error).await {
                error!("Error while handling error: {}", e)
            }
        }
    }
}

fn options() -> poise::FrameworkOptions<Data, BotError> {
    poise::FrameworkOptions {
        commands: vec![purge(), register(), reload()],
        on_error: |error| {
            Box::pin(async {
                on_error(error).await;
            })
        },
        pre_command: |ctx| {
            Box::pin(async move { info!("Invoke Command: {}", ctx.invocation_string()) })
        },
        event_handler: |_ctx, event, _, data| {
            Box::pin(async move {
                match event {
                    FullEvent::ChannelDelete { channel, .. } => {
                        handlers::channel_deleted(data, channel.id).await?;
                    }
                    FullEvent::ThreadDelete { thread, .. } => {
                        handlers::channel_deleted(data, thread.id).await?;
                    }
                    _ => {}
                }
                Ok(())
            })
        },
        ..Default::default()
    }
}

/// Builds the command framework. Resuming stored schedules happens once the
/// gateway is ready, so the first ticks never race the login.
pub fn framework(cfg: SharedCfg, purge: Arc<PurgeManager>) -> poise::Framework<Data, BotError> {
    poise::Framework::builder()
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                let resumed = purge.resume_from_store().await?;
                info!(
                    "{} is connected, {} purge schedule(s) running",
                    ready.user.name.green(),
                    resumed.to_string().green()
                );
                Ok(Data { cfg, purge })
            })
        })
        .options(options())
        .build()
}
