//! YAML configuration loading, following the `CONFIG_PATH` environment
//! convention used across this codebase's services.

use crate::error::{ConfigError, Result};
use crate::types::DeviceConfig;

pub const DEFAULT_CONFIG_PATH: &str = "config/device.yaml";

/// Loads a [`DeviceConfig`] from the path named by `CONFIG_PATH`, or
/// [`DEFAULT_CONFIG_PATH`] if the variable isn't set. Values in the YAML
/// file can be overridden by environment variables prefixed `RTU_SIM_`
/// (e.g. `RTU_SIM_GUID=7`), with `__` as the nesting separator.
pub fn load() -> Result<DeviceConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    load_from(&path)
}

pub fn load_from(path: &str) -> Result<DeviceConfig> {
    let raw = config::Config::builder()
        .add_source(config::File::with_name(path))
        .add_source(config::Environment::with_prefix("RTU_SIM").separator("__"))
        .build()
        .map_err(|source| ConfigError::Load {
            path: path.to_string(),
            source,
        })?;

    raw.try_deserialize().map_err(|source| ConfigError::Shape {
        path: path.to_string(),
        source,
    })
}
