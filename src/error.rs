// Typed errors raised by the dataset engine

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    /// Input that a computation cannot accept, e.g. non-positive y values
    /// handed to an exponential fit.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unsupported polynomial degree {0} (only 1 and 2 are supported)")]
    UnsupportedDegree(usize),

    /// Malformed rows at the ingestion boundary.
    #[error("Data error: {0}")]
    Data(String),
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
