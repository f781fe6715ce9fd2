//! Conditioning Error Types

use thiserror::Error;

/// Errors during scaling or resampling
#[derive(Debug, Clone, Error)]
pub enum ConditioningError {
    /// Matrices or label vectors disagree in shape
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Scaler fitted on an empty training matrix
    #[error("Cannot fit {0} scaling on an empty training set")]
    EmptyTrainingSet(&'static str),

    /// Ratio-based resampling needs exactly two classes
    #[error("Resampling with a ratio needs exactly 2 classes, found {0}")]
    NotBinary(usize),

    /// Ratio outside (0, 1]
    #[error("Resampling ratio {0} must be in (0, 1]")]
    InvalidRatio(f64),

    /// Requested ratio cannot be reached in the method's direction
    #[error("Ratio {ratio} would require {direction} samples ({minority} minority / {majority} majority)")]
    UnreachableRatio {
        ratio: f64,
        direction: &'static str,
        minority: usize,
        majority: usize,
    },

    /// Not enough samples for the neighbourhood the method needs
    #[error("{method} needs at least {needed} samples, found {available}")]
    TooFewSamples {
        method: &'static str,
        needed: usize,
        available: usize,
    },

    /// ADASYN found no majority samples around the minority class
    #[error("ADASYN: no minority sample has a majority-class neighbour")]
    NoMajorityNeighbours,

    /// Neighbour index rejected the data (non-finite coordinates)
    #[error("Nearest-neighbour search failed: {0}")]
    NeighbourSearch(String),
}

/// Result alias for conditioning
pub type Result<T> = std::result::Result<T, ConditioningError>;
