use thiserror::Error;

pub type Result<T> = std::result::Result<T, DeviceError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("device variant mismatch: {0}")]
    VariantMismatch(&'static str),

    #[error("no neighbor configured in the {0} direction")]
    NoNeighbor(&'static str),
}
