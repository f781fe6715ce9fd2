//! Mill Wear Pipeline
//!
//! Configuration-driven runner: prepares the windowed milling dataset, then
//! cross-validates one registered classifier on it and reports the
//! cross-fold summary.

mod settings;

pub use settings::{
    environment, load_config, load_config_from, DataConfig, LoggingConfig, PipelineConfig,
    CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH, ENV_PREFIX,
};

use anyhow::{Context, Result};
use cross_validation::{
    AggregateMetrics, ClassifierFactory, ClassifierRegistry, CrossValidationHarness, CvConfig,
    CvResults, FeatureTable, ParamDict,
};
use mill_data::{LabelCatalog, RawRecording, SampleAssembler, TabularDataset, WindowSegmenter};
use serde_json::{json, Value};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Outcome of one cross-validated training run
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub classifier: String,
    pub params: ParamDict,
    pub results: CvResults,
    pub summary: AggregateMetrics,
}

impl TrainingReport {
    /// Flat JSON report: the summary statistics plus the classifier and its parameters
    pub fn to_json_value(&self) -> Value {
        let mut map = self.summary.to_flat_map();
        map.insert("classifier".into(), json!(self.classifier));
        map.insert("params".into(), json!(self.params));
        Value::Object(map)
    }
}

/// Initialize logging
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.level)
        .with_context(|| format!("invalid log filter '{}'", config.level))?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = if config.json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    installed.context("failed to set tracing subscriber")
}

/// Load, label and window the raw recording; write the flat table if configured
pub fn prepare_dataset(config: &DataConfig) -> Result<TabularDataset> {
    let recording = RawRecording::load(&config.recording_path)
        .with_context(|| format!("loading recording {}", config.recording_path.display()))?;

    let exclusions = Some(config.cut_drop_list.as_slice());
    let catalog = match &config.label_path {
        Some(path) => LabelCatalog::from_csv_path(path, exclusions)
            .with_context(|| format!("loading label table {}", path.display()))?,
        None => LabelCatalog::from_recording(&recording, exclusions)
            .context("deriving labels from the recording")?,
    };

    let segmenter = WindowSegmenter::new(config.window_size, config.stride)?;
    let dataset = SampleAssembler::new(segmenter)
        .assemble(&recording, &catalog)
        .context("assembling windows")?;
    let table = dataset.to_tabular();

    if let Some(path) = &config.output_path {
        table
            .write_path(path)
            .with_context(|| format!("writing {}", path.display()))?;
        info!("Wrote {} rows to {}", table.len(), path.display());
    }
    Ok(table)
}

/// Cross-validate the configured classifier on a prepared dataset
pub fn train_model(
    factory: &dyn ClassifierFactory,
    config: &CvConfig,
    dataset: &TabularDataset,
) -> Result<TrainingReport> {
    let mut table = FeatureTable::from(dataset);
    table.add_binary_anomaly_target()?;

    let (harness, params) = CrossValidationHarness::from_factory(factory, config.clone())
        .with_context(|| format!("building classifier '{}'", config.classifier))?;
    let results = harness.run(&table).context("cross-validation failed")?;
    let summary = results.aggregate()?;

    info!(
        "{}: PR-AUC {:.4} ± {:.4}, ROC-AUC {:.4} ± {:.4}",
        config.classifier,
        summary.pr_auc.mean,
        summary.pr_auc.std,
        summary.roc_auc.mean,
        summary.roc_auc.std
    );

    let report = TrainingReport {
        classifier: config.classifier.clone(),
        params,
        results,
        summary,
    };

    if let Some(path) = &config.report_path {
        let text = serde_json::to_string_pretty(&report.to_json_value())?;
        std::fs::write(path, text).with_context(|| format!("writing report {}", path.display()))?;
        info!("Wrote report to {}", path.display());
    }
    Ok(report)
}

/// Prepare the dataset and cross-validate the configured classifier
pub fn run(config: &PipelineConfig) -> Result<TrainingReport> {
    let registry = ClassifierRegistry::with_defaults();
    let dataset = prepare_dataset(&config.data)?;
    train_model(&registry, &config.cv, &dataset)
}
