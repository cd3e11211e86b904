mod channel;

pub use channel::channel_deleted;
