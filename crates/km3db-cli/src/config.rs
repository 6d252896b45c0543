//! CLI configuration: TOML file + `KM3NET_DB_`-prefixed environment
//! overrides, resolved via platform config-path conventions.

use std::path::PathBuf;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Database base URL.
    pub url: String,

    /// Request timeout in seconds; 0 keeps the transport default.
    pub timeout: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: km3db_api::BASE_URL.into(),
            timeout: 0,
        }
    }
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("org", "km3net", "km3db").map_or_else(
        || PathBuf::from(".km3db.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Load the config from file + environment.
pub fn load_config() -> Result<Config, figment::Error> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(config_path()))
        .merge(Env::prefixed("KM3NET_DB_").only(&["url", "timeout"]));

    figment.extract()
}

/// Load the config, falling back to defaults on any problem.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_else(|e| {
        warn!("could not load config, using defaults: {e}");
        Config::default()
    })
}
