//! Sample Assembly
//!
//! Segments every catalogued cut in catalog order and stacks the windows into
//! one dataset, kept both as a window tensor and as a flat table with one row
//! per (window, sample) pair.

use crate::error::Result;
use crate::labels::LabelCatalog;
use crate::recording::{RecordingSource, SIGNAL_COUNT};
use crate::window::{sample_times, Window, WindowId, WindowSegmenter};
use ndarray::{s, Array2, Array3};
use tracing::info;

/// One flattened sample
#[derive(Debug, Clone, PartialEq)]
pub struct TabularRow {
    pub cut_id: WindowId,
    /// Cut number of the window
    pub case: i64,
    /// Offset within the window (seconds)
    pub time: f32,
    /// Channel values in `SignalChannel::ALL` order
    pub signals: [f32; SIGNAL_COUNT],
    pub tool_class: i64,
}

/// Flat table, columns `cut_id, case, time, <6 channels>, tool_class`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TabularDataset {
    pub rows: Vec<TabularRow>,
}

impl TabularDataset {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// All windows of all retained cuts, in catalog order
#[derive(Debug, Clone)]
pub struct Dataset {
    pub window_size: usize,
    /// Window keys, one per window
    pub ids: Vec<WindowId>,
    /// Samples, shape `[n_windows, window_size, 6]`
    pub x: Array3<f64>,
    /// Per-sample labels, shape `[n_windows, window_size]`
    pub labels: Array2<i64>,
    /// Per-sample time offsets, shape `[n_windows, window_size]`
    pub times: Array2<f64>,
}

impl Dataset {
    /// Stack windows in the given order
    pub fn from_windows(window_size: usize, windows: Vec<Window>) -> Self {
        let n = windows.len();
        let mut x = Array3::zeros((n, window_size, SIGNAL_COUNT));
        let mut labels = Array2::zeros((n, window_size));
        let times_row = sample_times(window_size);
        let times = Array2::from_shape_fn((n, window_size), |(_, s)| times_row[s]);
        let mut ids = Vec::with_capacity(n);

        for (i, window) in windows.into_iter().enumerate() {
            x.slice_mut(s![i, .., ..]).assign(&window.samples);
            labels.slice_mut(s![i, ..]).fill(window.label);
            ids.push(window.id);
        }

        Self {
            window_size,
            ids,
            x,
            labels,
            times,
        }
    }

    /// Number of windows
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Flatten to one row per (window, sample); values narrowed to f32
    pub fn to_tabular(&self) -> TabularDataset {
        let mut rows = Vec::with_capacity(self.len() * self.window_size);
        for (i, id) in self.ids.iter().enumerate() {
            for s in 0..self.window_size {
                rows.push(TabularRow {
                    cut_id: *id,
                    case: id.cut_no as i64,
                    time: self.times[[i, s]] as f32,
                    signals: std::array::from_fn(|ch| self.x[[i, s, ch]] as f32),
                    tool_class: self.labels[[i, s]],
                });
            }
        }
        TabularDataset { rows }
    }
}

/// Drives the segmenter over a catalog
#[derive(Debug, Clone, Copy)]
pub struct SampleAssembler {
    segmenter: WindowSegmenter,
}

impl SampleAssembler {
    pub fn new(segmenter: WindowSegmenter) -> Self {
        Self { segmenter }
    }

    /// Segment every catalogued cut and stack the windows
    pub fn assemble<S: RecordingSource + ?Sized>(
        &self,
        source: &S,
        catalog: &LabelCatalog,
    ) -> Result<Dataset> {
        let mut windows = Vec::new();
        for row in catalog.rows() {
            windows.extend(self.segmenter.segment_cut(source, row)?);
        }

        info!(
            "Assembled {} windows of {} samples from {} cuts (stride {})",
            windows.len(),
            self.segmenter.window_size(),
            catalog.len(),
            self.segmenter.stride()
        );
        Ok(Dataset::from_windows(self.segmenter.window_size(), windows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DataError;
    use crate::labels::{compute_tool_class, LabelRow};
    use crate::recording::{CutMetadata, RawRecording};

    fn recording(cuts: &[Option<f64>], len: usize) -> RawRecording {
        let mut recording = RawRecording::new(len);
        for (cut, vb) in cuts.iter().enumerate() {
            let metadata = CutMetadata {
                vb: *vb,
                ..Default::default()
            };
            let signals = std::array::from_fn(|ch| {
                (0..len).map(|s| (cut * 10_000 + ch * 1000 + s) as f64).collect()
            });
            recording.add_cut(metadata, signals).unwrap();
        }
        recording
    }

    fn row(cut_no: usize, vb: Option<f64>, start: usize, end: usize) -> LabelRow {
        LabelRow {
            cut_no,
            tool_class: compute_tool_class(vb),
            window_start: start,
            window_end: end,
            metadata: CutMetadata::default(),
        }
    }

    #[test]
    fn test_catalog_order_is_preserved() {
        let source = recording(&[Some(0.1), Some(0.3), Some(0.8)], 100);
        let rows = vec![row(2, Some(0.8), 0, 20), row(0, Some(0.1), 10, 30)];
        let catalog = LabelCatalog::from_rows(rows, None).unwrap();

        let assembler = SampleAssembler::new(WindowSegmenter::new(10, 10).unwrap());
        let dataset = assembler.assemble(&source, &catalog).unwrap();

        let ids: Vec<String> = dataset.ids.iter().map(|id| id.to_string()).collect();
        assert_eq!(ids, vec!["2_0", "2_1", "0_0", "0_1"]);
        assert_eq!(dataset.x.dim(), (4, 10, 6));
        // cut 0 starts at its window_start of 10
        assert_eq!(dataset.x[[2, 0, 0]], 10.0);
        assert_eq!(dataset.labels[[0, 9]], 2);
        assert_eq!(dataset.labels[[3, 0]], 0);
    }

    #[test]
    fn test_tabular_layout() {
        let source = recording(&[Some(0.5)], 8);
        let catalog = LabelCatalog::from_rows(vec![row(0, Some(0.5), 0, 8)], None).unwrap();
        let assembler = SampleAssembler::new(WindowSegmenter::new(4, 4).unwrap());
        let table = assembler.assemble(&source, &catalog).unwrap().to_tabular();

        assert_eq!(table.len(), 8);
        let last = &table.rows[7];
        assert_eq!(last.cut_id, WindowId::new(0, 1));
        assert_eq!(last.case, 0);
        assert_eq!(last.time, (3.0f64 / 250.0) as f32);
        assert_eq!(last.signals[0], 7.0);
        assert_eq!(last.signals[5], 5007.0);
        assert_eq!(last.tool_class, 1);
    }

    #[test]
    fn test_range_clamped_to_recording() {
        let source = recording(&[Some(0.1)], 50);
        let catalog = LabelCatalog::from_rows(vec![row(0, Some(0.1), 0, 9000)], None).unwrap();
        let assembler = SampleAssembler::new(WindowSegmenter::new(16, 16).unwrap());
        assert_eq!(assembler.assemble(&source, &catalog).unwrap().len(), 3);
    }

    #[test]
    fn test_inverted_range_yields_no_windows() {
        let source = recording(&[Some(0.1), Some(0.3)], 50);
        let rows = vec![row(0, Some(0.1), 40, 8), row(1, Some(0.3), 0, 32)];
        let catalog = LabelCatalog::from_rows(rows, None).unwrap();
        let assembler = SampleAssembler::new(WindowSegmenter::new(16, 16).unwrap());
        let dataset = assembler.assemble(&source, &catalog).unwrap();

        let ids: Vec<String> = dataset.ids.iter().map(|id| id.to_string()).collect();
        assert_eq!(ids, vec!["1_0", "1_1"]);
    }

    #[test]
    fn test_catalog_cut_absent_from_recording() {
        let source = recording(&[Some(0.1)], 50);
        let catalog = LabelCatalog::from_rows(vec![row(4, Some(0.1), 0, 50)], None).unwrap();
        let assembler = SampleAssembler::new(WindowSegmenter::new(16, 16).unwrap());
        assert!(matches!(
            assembler.assemble(&source, &catalog),
            Err(DataError::UnknownCut(4))
        ));
    }

    #[test]
    fn test_empty_dataset() {
        let source = recording(&[Some(0.1)], 10);
        let catalog = LabelCatalog::from_rows(vec![row(0, Some(0.1), 0, 10)], None).unwrap();
        let assembler = SampleAssembler::new(WindowSegmenter::new(64, 64).unwrap());
        let dataset = assembler.assemble(&source, &catalog).unwrap();
        assert!(dataset.is_empty());
        assert!(dataset.to_tabular().is_empty());
    }
}
