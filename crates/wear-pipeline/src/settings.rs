//! Pipeline Configuration
//!
//! Layered settings: built-in defaults, then an optional TOML file, then
//! `WEAR__`-prefixed environment variables (`WEAR__CV__FOLDS=3`).

use config::{Config, Environment, File, FileFormat};
use cross_validation::CvConfig;
use mill_data::DEFAULT_CUT_DROP_LIST;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming the configuration file
pub const CONFIG_PATH_ENV: &str = "WEAR_PIPELINE_CONFIG";

/// Configuration file used when `WEAR_PIPELINE_CONFIG` is unset
pub const DEFAULT_CONFIG_PATH: &str = "config/pipeline.toml";

/// Prefix of overriding environment variables
pub const ENV_PREFIX: &str = "WEAR";

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `cross_validation=debug`
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Dataset preparation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Raw recording (`.json`, `.bin` or `.postcard`)
    pub recording_path: PathBuf,
    /// Label table; labels are derived from the recording when absent
    pub label_path: Option<PathBuf>,
    /// Where the flat table is written (`.csv` or `.csv.gz`), if anywhere
    pub output_path: Option<PathBuf>,
    pub window_size: usize,
    pub stride: usize,
    /// Label table row positions dropped before re-indexing
    pub cut_drop_list: Vec<usize>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            recording_path: PathBuf::from("data/raw/mill.json"),
            label_path: None,
            output_path: Some(PathBuf::from("data/processed/milling.csv.gz")),
            window_size: 64,
            stride: 64,
            cut_drop_list: DEFAULT_CUT_DROP_LIST.to_vec(),
        }
    }
}

/// Complete runner configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub logging: LoggingConfig,
    pub data: DataConfig,
    pub cv: CvConfig,
}

/// Load from the file named by `WEAR_PIPELINE_CONFIG` (or the default path)
/// with environment overrides
pub fn load_config() -> Result<PipelineConfig, config::ConfigError> {
    let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    load_config_from(Path::new(&path), environment())
}

/// Load from `path` (optional) layered under `env`
pub fn load_config_from(
    path: &Path,
    env: Environment,
) -> Result<PipelineConfig, config::ConfigError> {
    debug!("Loading configuration from {}", path.display());
    Config::builder()
        .add_source(File::from(path).format(FileFormat::Toml).required(false))
        .add_source(env)
        .build()?
        .try_deserialize()
}

/// Environment source for `WEAR__SECTION__KEY` variables
pub fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
}
