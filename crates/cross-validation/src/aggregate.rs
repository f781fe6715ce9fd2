//! Cross-Fold Aggregation
//!
//! Summarises the per-fold scores of one run and points at the fold with the
//! weakest precision-recall area, together with the groups it was tested on.

use crate::error::{CvError, Result};
use crate::metrics::ScoreRecord;
use crate::table::{format_groups, GroupKey};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::info;

/// Min, max, mean and population standard deviation of one metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std: f64,
}

impl Summary {
    /// Summarise a non-empty series
    pub fn of(values: &[f64]) -> Self {
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
        Self {
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            mean,
            std: var.sqrt(),
        }
    }
}

/// Cross-fold summary of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateMetrics {
    pub precision: Summary,
    pub recall: Summary,
    pub f1: Summary,
    pub roc_auc: Summary,
    pub pr_auc: Summary,
    pub accuracy: Summary,
    pub n_thresholds_min: usize,
    pub n_thresholds_max: usize,
    /// Fold with the lowest PR-AUC (first one on ties)
    pub worst_pr_auc_fold: Option<usize>,
    /// Test groups of that fold
    pub test_groups_worst_pr_auc: Vec<GroupKey>,
}

impl AggregateMetrics {
    /// Flat `{name: value}` report, one key per statistic
    pub fn to_flat_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        for (prefix, summary) in [
            ("precision_score", &self.precision),
            ("recall_score", &self.recall),
            ("f1_score", &self.f1),
            ("rocauc", &self.roc_auc),
            ("prauc", &self.pr_auc),
            ("accuracy", &self.accuracy),
        ] {
            map.insert(format!("{prefix}_min"), json!(summary.min));
            map.insert(format!("{prefix}_max"), json!(summary.max));
            map.insert(format!("{prefix}_avg"), json!(summary.mean));
            map.insert(format!("{prefix}_std"), json!(summary.std));
        }
        map.insert("n_thresholds_min".into(), json!(self.n_thresholds_min));
        map.insert("n_thresholds_max".into(), json!(self.n_thresholds_max));
        map.insert(
            "test_strat_group_worst_prauc".into(),
            json!(self.test_groups_worst_pr_auc),
        );
        map
    }

    /// Pretty-printed flat report
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_flat_map())?)
    }
}

/// Aggregates per-fold score records
#[derive(Debug, Default, Clone, Copy)]
pub struct ScoreAggregator;

impl ScoreAggregator {
    pub fn aggregate(&self, records: &[ScoreRecord]) -> Result<AggregateMetrics> {
        if records.is_empty() {
            return Err(CvError::EmptyResults);
        }

        let series = |f: fn(&ScoreRecord) -> f64| -> Vec<f64> { records.iter().map(f).collect() };
        let pr_auc = series(|r| r.pr_auc);

        let worst = argmin(&pr_auc);
        let test_groups_worst_pr_auc = worst
            .map(|i| records[i].test_groups.clone())
            .unwrap_or_default();
        if let Some(i) = worst {
            info!(
                "Lowest PR-AUC {:.4} in fold {} (test groups [{}])",
                pr_auc[i],
                records[i].fold,
                format_groups(&test_groups_worst_pr_auc)
            );
        }

        Ok(AggregateMetrics {
            precision: Summary::of(&series(|r| r.precision)),
            recall: Summary::of(&series(|r| r.recall)),
            f1: Summary::of(&series(|r| r.f1)),
            roc_auc: Summary::of(&series(|r| r.roc_auc)),
            pr_auc: Summary::of(&pr_auc),
            accuracy: Summary::of(&series(|r| r.accuracy)),
            n_thresholds_min: records.iter().map(|r| r.n_thresholds).min().unwrap_or(0),
            n_thresholds_max: records.iter().map(|r| r.n_thresholds).max().unwrap_or(0),
            worst_pr_auc_fold: worst.map(|i| records[i].fold),
            test_groups_worst_pr_auc,
        })
    }
}

/// Position of the first minimum, skipping NaN
fn argmin(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, b)) if b <= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}
