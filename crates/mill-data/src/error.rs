//! Data Preparation Error Types

use thiserror::Error;

/// Errors raised while loading recordings, building the label catalog or
/// assembling windows
#[derive(Debug, Error)]
pub enum DataError {
    /// Raw recording missing or unreadable
    #[error("Recording source unavailable at {path}: {reason}")]
    SourceUnavailable { path: String, reason: String },

    /// Unsupported file extension for a recording or table
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// Window size or stride was zero
    #[error("{name} must be greater than 0")]
    NonPositiveParameter { name: &'static str },

    /// Requested cut is not present in the catalog or recording
    #[error("Cut number {0} is not in the label catalog")]
    UnknownCut(usize),

    /// Exclusion list names a row position the label table does not have
    #[error("Cannot exclude row {0}: not present in the label table")]
    UnknownExclusion(usize),

    /// Duplicate cut number in a label table
    #[error("Duplicate cut number {0} in label table")]
    DuplicateCut(usize),

    /// Named signal channel absent from a cut
    #[error("Cut {cut_no} has no channel named {channel}")]
    MissingChannel { cut_no: usize, channel: String },

    /// Channel lengths disagree within a cut
    #[error("Cut {cut_no} channel {channel} has {actual} samples, expected {expected}")]
    ChannelLength {
        cut_no: usize,
        channel: String,
        expected: usize,
        actual: usize,
    },

    /// A concrete tool class was required but the wear measurement is missing
    #[error("Cut {0} has no tool class (wear measurement missing)")]
    MissingToolClass(usize),

    /// Tool class value outside 0..=2
    #[error("Invalid tool class {value} for cut {cut_no}")]
    InvalidToolClass { cut_no: usize, value: i64 },

    /// Malformed composite window id
    #[error("Invalid window id: {0}")]
    InvalidWindowId(String),

    /// CSV read/write failure
    #[error("CSV error: {0}")]
    Csv(String),

    /// Serialization failure
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO failure
    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for DataError {
    fn from(err: std::io::Error) -> Self {
        DataError::Io(err.to_string())
    }
}

impl From<csv::Error> for DataError {
    fn from(err: csv::Error) -> Self {
        DataError::Csv(err.to_string())
    }
}

impl From<serde_json::Error> for DataError {
    fn from(err: serde_json::Error) -> Self {
        DataError::Serialization(err.to_string())
    }
}

impl From<postcard::Error> for DataError {
    fn from(err: postcard::Error) -> Self {
        DataError::Serialization(err.to_string())
    }
}

/// Result alias for data preparation
pub type Result<T> = std::result::Result<T, DataError>;
