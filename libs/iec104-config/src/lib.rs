//! Configuration types and loader for a simulated RTU device.

pub mod error;
pub mod loader;
pub mod types;

pub use error::{ConfigError, Result};
pub use loader::{load, load_from, DEFAULT_CONFIG_PATH};
pub use types::{DeviceConfig, DeviceVariant, LoggingConfig, VariantParams};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_a_transmission_device() {
        let yaml = r#"
module: "branch-a"
variant: transmission
guid: 2
inbound_neighbors: [1]
outbound_neighbors: [3]
bus_bind_addr: "0.0.0.0:20202"
bus_broadcast_addr: "255.255.255.255:20202"
tcp_bind_addr: "0.0.0.0:2404"
params:
  variant: transmission
  branch_resistance: [12.0, 10.0, 13.0]
  initial_breakers: 7
"#;
        let cfg: DeviceConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.guid, 2);
        assert!(matches!(cfg.variant, DeviceVariant::Transmission));
        match cfg.params {
            VariantParams::Transmission {
                branch_resistance,
                initial_breakers,
            } => {
                assert_eq!(branch_resistance.len(), 3);
                assert_eq!(initial_breakers, 7);
            },
            _ => panic!("expected transmission params"),
        }
        assert_eq!(cfg.logging.level, "info");
    }
}
