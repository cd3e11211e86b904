pub use super::purge_configs::Entity as PurgeConfigs;
