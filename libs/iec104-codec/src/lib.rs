//! Bit-exact encoder/decoder for the IEC 60870-5-104 APDU wire format.
//!
//! Pure functions only: no sockets, no threads, no global state. The
//! connection engine owns the bytes; this crate just turns them into
//! typed values and back. `Cp56Time::now()` reads the wall clock to
//! build a timestamp but performs no I/O of its own.

pub mod apci;
pub mod apdu;
pub mod asdu;
pub mod cp56time;
pub mod error;
pub mod io;

pub use apci::UFrameCommand;
pub use apdu::Apdu;
pub use asdu::{cot, Asdu, CauseOfTransmission};
pub use cp56time::Cp56Time;
pub use error::{CodecError, Result};
pub use io::{Diq, Dpi, InformationObject, IoPayload, Qos, Quality, Sco, Siq, Vti};
