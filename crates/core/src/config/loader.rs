use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Prefix of environment overrides; `REELSYNC_STREAM__BATCH_SIZE=8` sets
/// `stream.batch_size`.
const ENV_PREFIX: &str = "REELSYNC_";

/// Load configuration from a TOML file, then apply environment overrides.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }
    extract(Figment::new().merge(Toml::file(path)))
}

/// Load configuration from a TOML string (useful for testing).
///
/// Environment overrides are not applied.
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    Figment::new()
        .merge(Toml::string(toml_str))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

fn extract(figment: Figment) -> Result<Config, ConfigError> {
    // REELSYNC_CONFIG names the file itself and is not a setting.
    let env = Env::prefixed(ENV_PREFIX).ignore(&["config"]).split("__");
    figment
        .merge(env)
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}
