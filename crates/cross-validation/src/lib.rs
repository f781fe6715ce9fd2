//! Cross-Validation Harness
//!
//! Group-aware stratified k-fold evaluation of binary tool-wear classifiers:
//! a feature table view of the tabular dataset, a classifier registry, the
//! fold planner, per-fold scoring and cross-fold aggregation.

mod aggregate;
mod classifier;
mod error;
mod folds;
mod harness;
mod metrics;
mod models;
mod results;
mod table;

pub use conditioning::{ResamplingMethod, ScalingMethod};

pub use aggregate::{AggregateMetrics, ScoreAggregator, Summary};
pub use classifier::{
    Classifier, ClassifierFactory, ClassifierRegistry, ParamDict, ScoreCapability,
};
pub use error::{CvError, Result};
pub use folds::{plan_folds, Fold, StratifiedKFold, DEFAULT_FOLDS, FOLD_SEED};
pub use harness::{CrossValidationHarness, CvConfig};
pub use metrics::{
    auc, count_thresholds, precision_recall_curve, roc_auc_score, roc_curve, Confusion, PrCurve,
    RocCurve, ScoreRecord,
};
pub use models::{GaussianNb, NearestCentroid};
pub use results::{CurveMetric, CvResults, ScalarMetric};
pub use table::{format_groups, Column, FeatureTable, GroupKey, TARGET_COLUMN, TOOL_CLASS_COLUMN};
