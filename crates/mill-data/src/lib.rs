//! Milling Data Preparation
//!
//! Turns raw milling recordings into fixed-length labelled windows:
//! - Label catalog from a label table or the recording's own metadata
//! - Fixed-size, fixed-stride window segmentation per cut
//! - Assembly into a window tensor and a flat CSV-ready table

mod assembler;
mod error;
mod labels;
mod recording;
mod tabular;
mod window;

pub use assembler::{Dataset, SampleAssembler, TabularDataset, TabularRow};
pub use error::{DataError, Result};
pub use labels::{
    compute_tool_class, LabelCatalog, LabelRow, ToolClass, DEFAULT_CUT_DROP_LIST,
    FAILURE_WEAR_LIMIT, HEALTHY_WEAR_LIMIT,
};
pub use recording::{
    CutMetadata, CutRecord, RawRecording, RecordingSource, SignalChannel, SIGNAL_COUNT,
};
pub use tabular::{signal_columns, TABULAR_COLUMNS};
pub use window::{sample_times, Window, WindowId, WindowSegmenter, SAMPLE_RATE_HZ};
