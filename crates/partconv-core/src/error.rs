//! Error types for the convolution engine

use thiserror::Error;

/// Core error type
///
/// Only construction paths return these. Block processing reports contract
/// violations through the produced-length value instead.
#[derive(Error, Debug)]
pub enum PcError {
    #[error("Invalid parameter: {0}")]
    InvalidParam(String),

    #[error("DSP error: {0}")]
    Dsp(String),

    #[error("FFT error: {0}")]
    Fft(String),

    #[error("Allocation of {requested} elements failed")]
    Allocation { requested: usize },
}

/// Result type alias
pub type PcResult<T> = Result<T, PcError>;

impl PcError {
    /// Shorthand for an [`PcError::InvalidParam`] with a formatted message
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidParam(msg.into())
    }
}
