//! Per-Run Results
//!
//! Fold records of one run, retrievable as one series per metric. Curve
//! metrics come back ragged: each fold keeps its own curve length.

use crate::aggregate::{AggregateMetrics, ScoreAggregator};
use crate::error::{CvError, Result};
use crate::metrics::ScoreRecord;
use crate::table::GroupKey;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Scalar per-fold metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarMetric {
    NCorrect,
    NThresholds,
    Accuracy,
    Precision,
    Recall,
    F1,
    PrAuc,
    RocAuc,
}

impl ScalarMetric {
    pub const ALL: [ScalarMetric; 8] = [
        ScalarMetric::NCorrect,
        ScalarMetric::NThresholds,
        ScalarMetric::Accuracy,
        ScalarMetric::Precision,
        ScalarMetric::Recall,
        ScalarMetric::F1,
        ScalarMetric::PrAuc,
        ScalarMetric::RocAuc,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScalarMetric::NCorrect => "n_correct",
            ScalarMetric::NThresholds => "n_thresholds",
            ScalarMetric::Accuracy => "accuracy",
            ScalarMetric::Precision => "precision",
            ScalarMetric::Recall => "recall",
            ScalarMetric::F1 => "f1",
            ScalarMetric::PrAuc => "pr_auc",
            ScalarMetric::RocAuc => "roc_auc",
        }
    }

    fn value(&self, record: &ScoreRecord) -> f64 {
        match self {
            ScalarMetric::NCorrect => record.n_correct as f64,
            ScalarMetric::NThresholds => record.n_thresholds as f64,
            ScalarMetric::Accuracy => record.accuracy,
            ScalarMetric::Precision => record.precision,
            ScalarMetric::Recall => record.recall,
            ScalarMetric::F1 => record.f1,
            ScalarMetric::PrAuc => record.pr_auc,
            ScalarMetric::RocAuc => record.roc_auc,
        }
    }
}

impl FromStr for ScalarMetric {
    type Err = CvError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| CvError::UnknownMetric(s.to_string()))
    }
}

/// Curve-valued per-fold metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CurveMetric {
    Precisions,
    Recalls,
    PrThresholds,
    Fpr,
    Tpr,
    RocThresholds,
    YScores,
}

impl CurveMetric {
    pub const ALL: [CurveMetric; 7] = [
        CurveMetric::Precisions,
        CurveMetric::Recalls,
        CurveMetric::PrThresholds,
        CurveMetric::Fpr,
        CurveMetric::Tpr,
        CurveMetric::RocThresholds,
        CurveMetric::YScores,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CurveMetric::Precisions => "precisions",
            CurveMetric::Recalls => "recalls",
            CurveMetric::PrThresholds => "pr_thresholds",
            CurveMetric::Fpr => "fpr",
            CurveMetric::Tpr => "tpr",
            CurveMetric::RocThresholds => "roc_thresholds",
            CurveMetric::YScores => "y_scores",
        }
    }

    fn values<'a>(&self, record: &'a ScoreRecord) -> &'a [f64] {
        match self {
            CurveMetric::Precisions => &record.precisions,
            CurveMetric::Recalls => &record.recalls,
            CurveMetric::PrThresholds => &record.pr_thresholds,
            CurveMetric::Fpr => &record.fpr,
            CurveMetric::Tpr => &record.tpr,
            CurveMetric::RocThresholds => &record.roc_thresholds,
            CurveMetric::YScores => &record.y_scores,
        }
    }
}

impl FromStr for CurveMetric {
    type Err = CvError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| CvError::UnknownMetric(s.to_string()))
    }
}

/// Fold records of one cross-validation run, in fold order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvResults {
    pub records: Vec<ScoreRecord>,
}

impl CvResults {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// One value per fold
    pub fn scalar(&self, metric: ScalarMetric) -> Vec<f64> {
        self.records.iter().map(|r| metric.value(r)).collect()
    }

    /// One curve per fold; lengths differ between folds
    pub fn curve(&self, metric: CurveMetric) -> Vec<Vec<f64>> {
        self.records
            .iter()
            .map(|r| metric.values(r).to_vec())
            .collect()
    }

    /// `(train_groups, test_groups)` per fold
    pub fn groupings(&self) -> Vec<(&[GroupKey], &[GroupKey])> {
        self.records
            .iter()
            .map(|r| (r.train_groups.as_slice(), r.test_groups.as_slice()))
            .collect()
    }

    pub fn aggregate(&self) -> Result<AggregateMetrics> {
        ScoreAggregator.aggregate(&self.records)
    }
}
