//! Simulated field device models: the physical process behind each
//! device variant (Source/Transmission/Load) and its mapping onto
//! IEC-104 information objects and the peer simulation bus.

pub mod device;
pub mod error;
pub mod select;
pub mod state;

pub use device::{Device, BREAKER_IOA_BASE, IOA_PRIMARY, IOA_SECONDARY};
pub use error::{DeviceError, Result};
pub use select::{SboOutcome, SboState};
pub use state::PhysicalState;
