//! Cross-Validation Harness
//!
//! Drives one classifier through stratified folds of a feature table. Each
//! fold scales on its training rows, balances the training classes, fits a
//! fresh copy of the prototype and scores the untouched test rows.

use crate::classifier::{Classifier, ClassifierFactory, ParamDict, ScoreCapability};
use crate::error::{CvError, Result};
use crate::folds::{plan_folds, Fold, StratifiedKFold, DEFAULT_FOLDS};
use crate::metrics::ScoreRecord;
use crate::results::CvResults;
use crate::table::{format_groups, FeatureTable, TARGET_COLUMN, TOOL_CLASS_COLUMN};
use conditioning::{scale, Resampler, ResamplingMethod, ScalingMethod};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Harness settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CvConfig {
    /// Registry name of the classifier
    pub classifier: String,
    /// Seed handed to the classifier factory
    pub seed: u64,
    pub resampling: ResamplingMethod,
    /// Target minority:majority ratio after resampling
    pub ratio: f64,
    pub scaling: ScalingMethod,
    /// Columns that are neither features nor the target
    pub meta_columns: Vec<String>,
    /// Rows sharing a value of this column never straddle a fold
    pub group_column: Option<String>,
    pub target_column: String,
    pub folds: usize,
    /// Run folds on the rayon pool
    pub parallel: bool,
    /// Where the aggregate JSON report is written, if anywhere
    pub report_path: Option<PathBuf>,
}

impl Default for CvConfig {
    fn default() -> Self {
        Self {
            classifier: "nb".to_string(),
            seed: 0,
            resampling: ResamplingMethod::None,
            ratio: 0.5,
            scaling: ScalingMethod::None,
            meta_columns: ["cut_id", "case", "time", TOOL_CLASS_COLUMN]
                .map(String::from)
                .to_vec(),
            group_column: Some("case".to_string()),
            target_column: TARGET_COLUMN.to_string(),
            folds: DEFAULT_FOLDS,
            parallel: false,
            report_path: None,
        }
    }
}

/// Group-aware stratified k-fold harness around one classifier prototype
#[derive(Debug)]
pub struct CrossValidationHarness {
    prototype: Box<dyn Classifier>,
    capability: ScoreCapability,
    config: CvConfig,
}

impl CrossValidationHarness {
    /// Wrap a prototype; fails if it can produce neither decision values nor probabilities
    pub fn new(prototype: Box<dyn Classifier>, config: CvConfig) -> Result<Self> {
        let capability = ScoreCapability::detect(prototype.as_ref())?;
        info!(
            "Cross-validating {} over {} folds (scaling {}, resampling {} at ratio {})",
            prototype.name(),
            config.folds,
            config.scaling.as_str(),
            config.resampling.as_str(),
            config.ratio
        );
        Ok(Self {
            prototype,
            capability,
            config,
        })
    }

    /// Build the prototype named by `config.classifier`
    pub fn from_factory(
        factory: &dyn ClassifierFactory,
        config: CvConfig,
    ) -> Result<(Self, ParamDict)> {
        let (prototype, params) = factory.create(&config.classifier, config.seed)?;
        debug!("Classifier {} parameters: {:?}", config.classifier, params);
        Ok((Self::new(prototype, config)?, params))
    }

    pub fn config(&self) -> &CvConfig {
        &self.config
    }

    pub fn capability(&self) -> ScoreCapability {
        self.capability
    }

    /// Feature columns: everything except metadata, target and group
    pub fn feature_columns(&self, table: &FeatureTable) -> Result<Vec<String>> {
        for name in &self.config.meta_columns {
            table.column(name)?;
        }
        let mut excluded: Vec<&str> = self.config.meta_columns.iter().map(String::as_str).collect();
        excluded.push(&self.config.target_column);
        if let Some(group) = &self.config.group_column {
            excluded.push(group);
        }

        let features = table.remaining_columns(&excluded);
        if features.is_empty() {
            return Err(CvError::ShapeMismatch(
                "no feature columns left after excluding metadata".to_string(),
            ));
        }
        Ok(features)
    }

    /// Fold plan for `table`
    pub fn plan(&self, table: &FeatureTable) -> Result<Vec<Fold>> {
        let all_rows: Vec<usize> = (0..table.n_rows()).collect();
        let labels = table
            .binary_target(&self.config.target_column, &all_rows)?
            .to_vec();

        let group_column = self
            .config
            .group_column
            .as_deref()
            .filter(|&g| g != self.config.target_column);
        let groups = match group_column {
            Some(column) => Some(table.group_keys(column)?),
            None => {
                warn!("No group column: stratifying row-wise, rows of one cut can leak across folds");
                None
            }
        };

        plan_folds(
            &labels,
            groups.as_deref(),
            StratifiedKFold::new(self.config.folds),
        )
    }

    /// Cross-validate over `table`; any fold failure fails the run
    pub fn run(&self, table: &FeatureTable) -> Result<CvResults> {
        let features = self.feature_columns(table)?;
        let folds = self.plan(table)?;
        debug!("Features: [{}]", features.join(", "));

        let records = if self.config.parallel {
            folds
                .par_iter()
                .map(|fold| self.score_fold(table, &features, fold))
                .collect::<Result<Vec<_>>>()?
        } else {
            folds
                .iter()
                .map(|fold| self.score_fold(table, &features, fold))
                .collect::<Result<Vec<_>>>()?
        };

        info!("Cross-validation finished: {} folds scored", records.len());
        Ok(CvResults { records })
    }

    fn score_fold(
        &self,
        table: &FeatureTable,
        features: &[String],
        fold: &Fold,
    ) -> Result<ScoreRecord> {
        self.try_score_fold(table, features, fold)
            .map_err(|source| CvError::FoldFailed {
                fold: fold.index,
                test_groups: format_groups(&fold.test_groups),
                source: Box::new(source),
            })
    }

    fn try_score_fold(
        &self,
        table: &FeatureTable,
        features: &[String],
        fold: &Fold,
    ) -> Result<ScoreRecord> {
        let target = &self.config.target_column;
        info!(
            "Fold {}: {} train rows, {} test rows",
            fold.index,
            fold.train_rows.len(),
            fold.test_rows.len()
        );

        let x_train = table.matrix(features, &fold.train_rows)?;
        let y_train = table.binary_target(target, &fold.train_rows)?;
        let x_test = table.matrix(features, &fold.test_rows)?;
        let y_test = table.binary_target(target, &fold.test_rows)?;

        let (x_train, x_test, _) = scale(&x_train, &x_test, self.config.scaling)?;
        let (x_train, y_train) = Resampler::new(self.config.resampling, self.config.ratio)
            .resample(&x_train, &y_train)?;

        let mut model = self.prototype.clone_untrained();
        model.fit(&x_train, &y_train)?;
        let y_pred = model.predict(&x_test)?;
        let y_scores = self.capability.scores(model.as_ref(), &x_test)?;

        let record = ScoreRecord::compute(&y_test, &y_pred, &y_scores)?.with_fold(fold);
        debug!(
            "Fold {}: PR-AUC {:.4}, ROC-AUC {:.4}, F1 {:.4}",
            fold.index, record.pr_auc, record.roc_auc, record.f1
        );
        Ok(record)
    }
}
