pub mod purge_config;

pub use purge_config::PurgeConfigService;
