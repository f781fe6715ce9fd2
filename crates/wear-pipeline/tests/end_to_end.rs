//! Full runner pass over the truncated milling fixture

use cross_validation::CvConfig;
use mill_data::TabularDataset;
use std::path::PathBuf;
use wear_pipeline::{prepare_dataset, run, DataConfig, PipelineConfig};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../mill-data/tests/fixtures")
        .join(name)
}

fn scratch(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("wear_pipeline_{}_{}", std::process::id(), name))
}

fn data_config(output: Option<PathBuf>) -> DataConfig {
    DataConfig {
        recording_path: fixture("mill_truncated.json"),
        label_path: Some(fixture("labels_with_tool_class_truncated.csv")),
        output_path: output,
        cut_drop_list: Vec::new(),
        ..DataConfig::default()
    }
}

#[test]
fn test_prepared_dataset_matches_fixture() {
    let output = scratch("milling.csv.gz");
    let table = prepare_dataset(&data_config(Some(output.clone()))).unwrap();
    let written = TabularDataset::read_path(&output).unwrap();
    std::fs::remove_file(&output).ok();

    let expected = TabularDataset::read_path(&fixture("milling_truncated_results.csv.gz")).unwrap();
    assert_eq!(table, expected);
    assert_eq!(written, expected);
}

#[test]
fn test_default_drop_list_rejects_truncated_table() {
    // the truncated label table has no rows 17 or 94
    let config = DataConfig {
        cut_drop_list: mill_data::DEFAULT_CUT_DROP_LIST.to_vec(),
        ..data_config(None)
    };
    assert!(prepare_dataset(&config).is_err());
}

#[test]
fn test_run_writes_report() {
    let report_path = scratch("report.json");
    let config = PipelineConfig {
        data: data_config(None),
        cv: CvConfig {
            classifier: "nearest_centroid".to_string(),
            group_column: None,
            report_path: Some(report_path.clone()),
            ..CvConfig::default()
        },
        ..PipelineConfig::default()
    };

    let report = run(&config).unwrap();
    assert_eq!(report.results.len(), 5);
    assert_eq!(report.classifier, "nearest_centroid");

    let text = std::fs::read_to_string(&report_path).unwrap();
    std::fs::remove_file(&report_path).ok();
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(json["classifier"], "nearest_centroid");
    assert_eq!(json["params"]["metric"], "euclidean");
    assert!(json["prauc_avg"].is_number());
    assert_eq!(json["test_strat_group_worst_prauc"], serde_json::json!([]));
}

#[test]
fn test_grouped_run_on_too_few_cuts_fails() {
    let config = PipelineConfig {
        data: data_config(None),
        ..PipelineConfig::default()
    };
    // five folds need at least five cuts with windows
    assert!(run(&config).is_err());
}
