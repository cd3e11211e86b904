use serenity::all::ChannelId;
use snafu::Snafu;

#[derive(Snafu, Debug)]
#[snafu(visibility(pub(crate)))]
pub enum BotError {
    #[snafu(transparent)]
    SerenityError { source: serenity::Error },
    #[snafu(transparent)]
    DatabaseError { source: sea_orm::DbErr },
    #[snafu(display("Channel {channel_id} is unavailable"))]
    ChannelUnavailable { channel_id: ChannelId },
    #[snafu(display("Stored purge config for channel {channel_id} is invalid: {reason}"))]
    InvalidConfig { channel_id: ChannelId, reason: String },
    #[snafu(whatever, display("{message}"))]
    GenericError {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error + Send + Sync>, Some)))]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}
