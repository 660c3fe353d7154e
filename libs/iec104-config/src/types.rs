//! The typed configuration document a simulated device is built from.

use std::net::SocketAddr;

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceVariant {
    Source,
    Transmission,
    Load,
}

impl DeviceVariant {
    pub fn label(self) -> &'static str {
        match self {
            DeviceVariant::Source => "source",
            DeviceVariant::Transmission => "transmission",
            DeviceVariant::Load => "load",
        }
    }
}

/// Per-variant physical parameters (§4.2.2 / §6).
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum VariantParams {
    Source {
        /// Fixed output voltage, volts.
        voltage: f32,
    },
    Transmission {
        /// Per-branch resistance, ohms, one entry per breaker.
        branch_resistance: Vec<f32>,
        /// Initial breaker bitfield; bit i set = branch i closed.
        #[serde(default)]
        initial_breakers: u32,
    },
    Load {
        /// Nominal load resistance, ohms.
        load: f32,
    },
}

/// One simulated device's full configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    pub module: String,
    pub variant: DeviceVariant,
    pub guid: u16,
    #[serde(default)]
    pub inbound_neighbors: Vec<u16>,
    #[serde(default)]
    pub outbound_neighbors: Vec<u16>,
    pub bus_bind_addr: SocketAddr,
    pub bus_broadcast_addr: SocketAddr,
    pub tcp_bind_addr: SocketAddr,
    #[serde(default)]
    pub allow_concurrent: bool,
    pub params: VariantParams,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging sink configuration, independent of the excluded metrics layer.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_console")]
    pub console: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            log_dir: default_log_dir(),
            level: default_log_level(),
            console: default_console(),
        }
    }
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_console() -> bool {
    true
}
