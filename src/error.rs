//! Error types surfaced by the recommendation engine.

use thiserror::Error;

use crate::model::ValidationError;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that abort a whole recommendation or simulation request.
///
/// Parcels without a feasible container are not errors; they are reported
/// inside the recommendation itself.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    /// Malformed order input or a reference the catalog cannot resolve.
    #[error("invalid input: {0}")]
    InvalidInput(#[from] ValidationError),
}

impl EngineError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::InvalidInput(_) => "invalid_input",
        }
    }
}
