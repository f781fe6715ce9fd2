//! Cross-Validation Error Types

use conditioning::ConditioningError;
use thiserror::Error;

/// Errors while planning folds, training or scoring
#[derive(Debug, Error)]
pub enum CvError {
    /// No classifier registered under the name
    #[error("Unknown classifier '{0}'")]
    UnknownClassifier(String),

    /// Column not present in the feature table
    #[error("Unknown column '{0}'")]
    UnknownColumn(String),

    /// Column exists but holds the wrong kind of values
    #[error("Column '{column}' holds {actual} values, expected {expected}")]
    ColumnType {
        column: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// Column length disagrees with the table
    #[error("Column '{column}' has {actual} rows, table has {expected}")]
    ColumnLength {
        column: String,
        expected: usize,
        actual: usize,
    },

    /// Column name used twice
    #[error("Duplicate column '{0}'")]
    DuplicateColumn(String),

    /// Target label outside {0, 1}
    #[error("Target column '{column}' must be binary 0/1, found {value}")]
    NonBinaryTarget { column: String, value: i64 },

    /// Fold count out of range for the stratification units
    #[error("Cannot split {units} stratification units into {folds} folds")]
    InvalidFoldCount { folds: usize, units: usize },

    /// Metric needs input the fold does not provide
    #[error("Metric undefined: {0}")]
    UndefinedMetric(String),

    /// Unknown metric name
    #[error("Unknown metric '{0}'")]
    UnknownMetric(String),

    /// Inputs of mismatched length or shape
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Training data unusable for the model
    #[error("Cannot train {model}: {reason}")]
    Training { model: String, reason: String },

    /// Classifier used before `fit`
    #[error("Classifier {0} has not been fitted")]
    NotFitted(String),

    /// Classifier lacks the requested scoring method
    #[error("Classifier {model} does not support {method}")]
    Unsupported { model: String, method: &'static str },

    /// Classifier offers neither a decision function nor probabilities
    #[error("Classifier {0} provides neither decision_function nor predict_proba")]
    NoScoringCapability(String),

    /// No fold results to aggregate
    #[error("No fold results to aggregate")]
    EmptyResults,

    /// A fold failed; the whole run is aborted
    #[error("Fold {fold} (test groups [{test_groups}]) failed: {source}")]
    FoldFailed {
        fold: usize,
        test_groups: String,
        #[source]
        source: Box<CvError>,
    },

    #[error("Conditioning error: {0}")]
    Conditioning(#[from] ConditioningError),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for CvError {
    fn from(err: serde_json::Error) -> Self {
        CvError::Serialization(err.to_string())
    }
}

/// Result alias for cross-validation
pub type Result<T> = std::result::Result<T, CvError>;
