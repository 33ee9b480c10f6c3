//! Error types for eegstream-types.

use thiserror::Error;

/// Errors produced when validating a channel identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ChannelError {
    /// The identifier was empty.
    #[error("channel identifier cannot be empty")]
    Empty,

    /// The identifier exceeded the maximum length.
    #[error("channel identifier is {len} bytes long (maximum {max})")]
    TooLong { len: usize, max: usize },

    /// The identifier contained a control character.
    #[error("channel identifier contains a control character")]
    ControlCharacter,
}

/// Errors produced by the band-pass filter.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum FilterError {
    /// Cutoff frequencies are not `0 < low < high < sample_rate / 2`.
    #[error("invalid band {low_hz}-{high_hz} Hz for sample rate {sample_rate_hz} Hz")]
    InvalidBand {
        low_hz: f64,
        high_hz: f64,
        sample_rate_hz: f64,
    },

    /// Filter order outside the supported range.
    #[error("filter order {order} is out of range (1-{max})")]
    InvalidOrder { order: usize, max: usize },

    /// The series is too short for forward-backward filtering.
    #[error("series of {len} samples is too short, need more than {required}")]
    InputTooShort { len: usize, required: usize },

    /// A delay line of the wrong length was passed to `lfilter`.
    #[error("filter state has {len} slots, expected {expected}")]
    StateLength { len: usize, expected: usize },

    /// The linear system for the initial filter state was singular.
    #[error("filter initial conditions could not be computed")]
    Singular,
}
