//! Error surface shared by every pipeline stage.
//!
//! Stage errors propagate unrecovered to the caller. The one recoverable
//! condition, a raster without forest, is reported through
//! [`crate::report::ReportWarning`] instead.
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectivityError {
    /// Malformed or empty raster, or a shape that disagrees with its transform.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Out-of-range resolution, threshold ordering, tolerance or engine setting.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

impl ConnectivityError {
    pub fn input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn parameter(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }

    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }

    pub fn is_invalid_parameter(&self) -> bool {
        matches!(self, Self::InvalidParameter(_))
    }
}

pub type Result<T> = std::result::Result<T, ConnectivityError>;
