//! Configuration loading for mirrorlink.
//!
//! Supports TOML, YAML, and JSON config files with `${ENV}` substitution.

pub mod env_subst;
pub mod loader;
pub mod schema;

pub use {
    loader::{
        clear_config_dir, config_dir, data_dir, discover_and_load, find_or_default_config_path,
        load_config, set_config_dir,
    },
    schema::{DiscordConfig, HealthConfig, LinksConfig, MirrorlinkConfig, TOKEN_ENV_VAR},
};
