//! End-to-end segmentation against the truncated milling fixture

use mill_data::{
    DataError, LabelCatalog, RawRecording, SampleAssembler, SignalChannel, TabularDataset,
    WindowSegmenter,
};
use std::path::PathBuf;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn prepare() -> TabularDataset {
    let recording = RawRecording::load(&fixture("mill_truncated.json")).unwrap();
    let catalog = LabelCatalog::from_csv_path(
        &fixture("labels_with_tool_class_truncated.csv"),
        None,
    )
    .unwrap();
    let assembler = SampleAssembler::new(WindowSegmenter::new(64, 64).unwrap());
    assembler.assemble(&recording, &catalog).unwrap().to_tabular()
}

#[test]
fn test_matches_stored_results() {
    let table = prepare();
    let expected =
        TabularDataset::read_path(&fixture("milling_truncated_results.csv.gz")).unwrap();

    assert_eq!(table.len(), 576);
    assert_eq!(table.len(), expected.len());
    for (i, (row, want)) in table.rows.iter().zip(&expected.rows).enumerate() {
        assert_eq!(row, want, "row {i} differs");
    }
}

#[test]
fn test_signals_are_narrowed_to_f32() {
    // cut 0 starts at sample 0, its three windows cover samples 0..192
    let recording = RawRecording::load(&fixture("mill_truncated.json")).unwrap();
    let cut = &recording.cuts[0];
    let table = prepare();

    let mut inexact = 0;
    for (sample, row) in table.rows[..192].iter().enumerate() {
        for (ch, channel) in SignalChannel::ALL.iter().enumerate() {
            let raw = cut.signals[channel.source_name()][sample];
            assert_eq!(row.signals[ch], raw as f32, "sample {sample} {}", channel.column_name());
            if f64::from(row.signals[ch]) != raw {
                inexact += 1;
            }
        }
    }
    assert!(inexact > 0);
}

#[test]
fn test_output_is_deterministic() {
    let mut first = Vec::new();
    let mut second = Vec::new();
    prepare().write_csv(&mut first).unwrap();
    prepare().write_csv(&mut second).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_gzip_artifact() {
    let table = prepare();
    let path = std::env::temp_dir().join(format!("mill_data_{}.csv.gz", std::process::id()));
    table.write_path(&path).unwrap();
    let reread = TabularDataset::read_path(&path).unwrap();
    std::fs::remove_file(&path).ok();
    assert_eq!(reread, table);
}

#[test]
fn test_derived_labels_reject_unmeasured_cut() {
    // without the label table cut 2 spans the full recording and has no VB
    let recording = RawRecording::load(&fixture("mill_truncated.json")).unwrap();
    let catalog = LabelCatalog::from_recording(&recording, None).unwrap();
    let assembler = SampleAssembler::new(WindowSegmenter::new(64, 64).unwrap());
    assert!(matches!(
        assembler.assemble(&recording, &catalog),
        Err(DataError::MissingToolClass(2))
    ));
}

#[test]
fn test_derived_labels_with_exclusion() {
    let recording = RawRecording::load(&fixture("mill_truncated.json")).unwrap();
    let catalog = LabelCatalog::from_recording(&recording, Some(&[2])).unwrap();
    let assembler = SampleAssembler::new(WindowSegmenter::new(64, 64).unwrap());
    let dataset = assembler.assemble(&recording, &catalog).unwrap();

    // three cuts of 400 samples, 6 windows each
    assert_eq!(dataset.len(), 18);
    assert_eq!(dataset.ids[6].to_string(), "1_0");
    assert_eq!(dataset.ids[12].to_string(), "3_0");
}
