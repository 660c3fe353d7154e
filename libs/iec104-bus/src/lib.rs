//! Peer-to-peer UDP simulation bus by which neighboring simulated
//! devices discover each other and exchange physical-layer values.

pub mod discovery;
pub mod error;
pub mod message;
pub mod runtime;

pub use discovery::NeighborTable;
pub use error::{BusError, Result};
pub use message::{BusMessage, MessageId, ENCODED_LEN};
pub use runtime::{BusRuntime, PeerHandler, BUS_PORT, POLL_INTERVAL};
