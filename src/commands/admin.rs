use std::sync::Arc;

use poise::command;
use tracing::info;

use super::Context;
use crate::error::BotError;

#[command(prefix_command, owners_only)]
pub async fn register(ctx: Context<'_>) -> Result<(), BotError> {
    Ok(poise::builtins::register_application_commands_buttons(ctx).await?)
}

#[command(slash_command, prefix_command, owners_only, ephemeral)]
/// Re-read the configuration file. The token only changes after a restart.
pub async fn reload(ctx: Context<'_>) -> Result<(), BotError> {
    let cfg = &ctx.data().cfg;
    let fresh = cfg.load().reload()?;
    info!("Reloaded configuration from {}", fresh.path.display());
    cfg.store(Arc::new(fresh));
    ctx.say("🔄 Configuration reloaded.").await?;
    Ok(())
}
