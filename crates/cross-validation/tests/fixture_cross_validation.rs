//! Cross-validation over the truncated milling fixture and a synthetic table

use conditioning::{ResamplingMethod, ScalingMethod};
use cross_validation::{
    ClassifierRegistry, Column, CrossValidationHarness, CurveMetric, CvConfig, CvError,
    FeatureTable, ScalarMetric,
};
use mill_data::TabularDataset;
use std::collections::HashSet;
use std::path::PathBuf;

fn fixture_table() -> FeatureTable {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../mill-data/tests/fixtures/milling_truncated_results.csv.gz");
    let dataset = TabularDataset::read_path(&path).unwrap();
    let mut table = FeatureTable::from(&dataset);
    table.add_binary_anomaly_target().unwrap();
    table
}

/// 15 cuts of 8 rows, the last 5 failed with a shifted signal
fn synthetic_table() -> FeatureTable {
    let mut case = Vec::new();
    let mut signal = Vec::new();
    let mut noise = Vec::new();
    let mut y = Vec::new();
    for cut in 0..15i64 {
        let failed = cut >= 10;
        for r in 0..8i64 {
            case.push(cut);
            signal.push(if failed { 2.5 } else { 0.0 } + ((r * 3 + cut) % 8) as f64 / 8.0);
            noise.push(((r * 11 + cut * 5) % 13) as f64);
            y.push(i64::from(failed));
        }
    }
    let mut table = FeatureTable::new();
    table.push_column("case", Column::Int(case)).unwrap();
    table.push_column("signal", Column::Float(signal)).unwrap();
    table.push_column("noise", Column::Float(noise)).unwrap();
    table.push_column("y", Column::Int(y)).unwrap();
    table
}

fn harness(config: CvConfig) -> CrossValidationHarness {
    CrossValidationHarness::from_factory(&ClassifierRegistry::with_defaults(), config)
        .unwrap()
        .0
}

#[test]
fn test_row_wise_run_over_fixture() {
    let table = fixture_table();
    let harness = harness(CvConfig {
        classifier: "nearest_centroid".to_string(),
        scaling: ScalingMethod::Standard,
        resampling: ResamplingMethod::RandomOver,
        ratio: 1.0,
        group_column: None,
        ..CvConfig::default()
    });

    let results = harness.run(&table).unwrap();
    assert_eq!(results.len(), 5);

    let scores = results.curve(CurveMetric::YScores);
    assert_eq!(scores.iter().map(Vec::len).sum::<usize>(), 576);
    for value in results
        .scalar(ScalarMetric::Accuracy)
        .into_iter()
        .chain(results.scalar(ScalarMetric::RocAuc))
    {
        assert!((0.0..=1.0).contains(&value));
    }

    let summary = results.aggregate().unwrap();
    assert!(summary.worst_pr_auc_fold.is_some());
    assert!(summary.test_groups_worst_pr_auc.is_empty());
}

#[test]
fn test_grouped_fixture_fails_on_single_failed_cut() {
    // cases 0, 1 and 3 yield windows; only case 3 is a failed tool
    let harness = harness(CvConfig {
        folds: 2,
        ..CvConfig::default()
    });
    assert!(matches!(
        harness.run(&fixture_table()),
        Err(CvError::FoldFailed { .. })
    ));
}

#[test]
fn test_grouped_run_tests_every_cut_once() {
    let harness = harness(CvConfig {
        meta_columns: vec!["case".to_string()],
        scaling: ScalingMethod::MinMax,
        resampling: ResamplingMethod::Smote,
        ratio: 1.0,
        ..CvConfig::default()
    });

    let results = harness.run(&synthetic_table()).unwrap();
    assert_eq!(results.len(), 5);

    let mut tested = HashSet::new();
    for (train, test) in results.groupings() {
        let train: HashSet<_> = train.iter().collect();
        assert!(test.iter().all(|g| !train.contains(g)));
        tested.extend(test.iter().cloned());
    }
    assert_eq!(tested.len(), 15);
    assert!(results
        .scalar(ScalarMetric::RocAuc)
        .iter()
        .all(|&auc| auc == 1.0));
}

#[test]
fn test_parallel_matches_sequential() {
    let config = CvConfig {
        classifier: "nearest_centroid".to_string(),
        meta_columns: vec!["case".to_string()],
        scaling: ScalingMethod::Standard,
        ..CvConfig::default()
    };
    let sequential = harness(config.clone()).run(&synthetic_table()).unwrap();
    let parallel = harness(CvConfig {
        parallel: true,
        ..config
    })
    .run(&synthetic_table())
    .unwrap();
    assert_eq!(sequential, parallel);
}
