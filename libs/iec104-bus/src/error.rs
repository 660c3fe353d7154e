use thiserror::Error;

pub type Result<T> = std::result::Result<T, BusError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    #[error("bus datagram has wrong size: expected {expected}, got {actual}")]
    WrongSize { expected: usize, actual: usize },
}
