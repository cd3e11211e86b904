pub mod prelude;

pub mod purge_configs;

mod r#impl;
