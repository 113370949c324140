//! Error types for plume retrievals.

use thiserror::Error;

use crate::raster::RasterShape;

/// Result type alias using PlumeError.
pub type PlumeResult<T> = Result<T, PlumeError>;

/// Primary error type for retrieval operations.
///
/// Every variant here is fatal for the operation that raised it. Per-pixel
/// conditions (masked cells, failed inversions) are recorded in the output
/// rasters instead.
#[derive(Debug, Error)]
pub enum PlumeError {
    // === Input Errors ===
    #[error("Invalid input for '{param}': {message}")]
    InvalidInput { param: String, message: String },

    #[error("Raster shape mismatch: {left} at {left_resolution} m vs {right} at {right_resolution} m")]
    ShapeMismatch {
        left: RasterShape,
        left_resolution: f64,
        right: RasterShape,
        right_resolution: f64,
    },

    #[error("Band is not clipped to the requested area of interest: {0}")]
    AoiMismatch(String),

    // === Retrieval Errors ===
    #[error("Degenerate regression: {0}")]
    DegenerateRegression(String),

    // === Imagery Errors ===
    #[error("No imagery found: {0}")]
    NoImageryFound(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl PlumeError {
    /// Create an InvalidInput error.
    pub fn invalid_input(param: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            param: param.into(),
            message: message.into(),
        }
    }

    /// Create a DegenerateRegression error.
    pub fn degenerate(msg: impl Into<String>) -> Self {
        Self::DegenerateRegression(msg.into())
    }

    /// Create a NoImageryFound error.
    pub fn no_imagery(msg: impl Into<String>) -> Self {
        Self::NoImageryFound(msg.into())
    }

    /// Create a Storage error.
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Short machine-readable code, used as a log field and in run reports.
    pub fn code(&self) -> &'static str {
        match self {
            PlumeError::InvalidInput { .. } => "invalid_input",
            PlumeError::ShapeMismatch { .. } | PlumeError::AoiMismatch(_) => "shape_mismatch",
            PlumeError::DegenerateRegression(_) => "degenerate_regression",
            PlumeError::NoImageryFound(_) => "no_imagery_found",
            PlumeError::Storage(_) => "storage",
        }
    }
}

impl From<std::io::Error> for PlumeError {
    fn from(err: std::io::Error) -> Self {
        PlumeError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for PlumeError {
    fn from(err: serde_json::Error) -> Self {
        PlumeError::Storage(format!("JSON error: {}", err))
    }
}
