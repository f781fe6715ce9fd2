//! Window Segmentation
//!
//! Slices the valid range of a cut into fixed-length windows. Window `i`
//! covers samples `[i * stride, i * stride + window_size)` of the valid range;
//! scanning stops at the first window that would run past the end, so no
//! partial window is ever emitted.

use crate::error::{DataError, Result};
use crate::labels::{LabelRow, ToolClass};
use crate::recording::{RecordingSource, SignalChannel, SIGNAL_COUNT};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Sampling frequency of the recordings (Hz)
pub const SAMPLE_RATE_HZ: f64 = 250.0;

/// Composite window key: cut number and window position within the cut
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WindowId {
    pub cut_no: usize,
    pub window_index: usize,
}

impl WindowId {
    pub fn new(cut_no: usize, window_index: usize) -> Self {
        Self {
            cut_no,
            window_index,
        }
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.cut_no, self.window_index)
    }
}

impl FromStr for WindowId {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || DataError::InvalidWindowId(s.to_string());
        let (cut, window) = s.split_once('_').ok_or_else(invalid)?;
        Ok(Self {
            cut_no: cut.parse().map_err(|_| invalid())?,
            window_index: window.parse().map_err(|_| invalid())?,
        })
    }
}

/// Time offset of each sample within a window (seconds)
pub fn sample_times(window_size: usize) -> Vec<f64> {
    (0..window_size).map(|i| i as f64 / SAMPLE_RATE_HZ).collect()
}

/// One fixed-length labelled slice of a cut
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    pub id: WindowId,
    /// Tool class code shared by every sample
    pub label: i64,
    /// Samples, shape `[window_size, 6]`
    pub samples: Array2<f64>,
}

/// Fixed-size, fixed-stride window segmenter
#[derive(Debug, Clone, Copy)]
pub struct WindowSegmenter {
    window_size: usize,
    stride: usize,
}

impl WindowSegmenter {
    /// Create a segmenter; both parameters must be positive
    pub fn new(window_size: usize, stride: usize) -> Result<Self> {
        if window_size == 0 {
            return Err(DataError::NonPositiveParameter { name: "window_size" });
        }
        if stride == 0 {
            return Err(DataError::NonPositiveParameter { name: "stride" });
        }
        Ok(Self {
            window_size,
            stride,
        })
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Number of full windows in a valid range of `len` samples
    pub fn window_count(&self, len: usize) -> usize {
        if len < self.window_size {
            0
        } else {
            (len - self.window_size) / self.stride + 1
        }
    }

    /// Segment one catalogued cut of a recording
    pub fn segment_cut<S: RecordingSource + ?Sized>(
        &self,
        source: &S,
        row: &LabelRow,
    ) -> Result<Vec<Window>> {
        let end = row.window_end.min(source.sample_count());
        let start = row.window_start.min(end);

        let mut channels: [&[f64]; SIGNAL_COUNT] = [&[]; SIGNAL_COUNT];
        for (slot, channel) in channels.iter_mut().zip(SignalChannel::ALL) {
            *slot = &source.channel(row.cut_no, channel)?[start..end];
        }

        self.segment_channels(row.cut_no, channels, row.tool_class)
    }

    /// Segment already-sliced channels (each holding only the valid range)
    pub fn segment_channels(
        &self,
        cut_no: usize,
        channels: [&[f64]; SIGNAL_COUNT],
        tool_class: ToolClass,
    ) -> Result<Vec<Window>> {
        let len = channels.iter().map(|c| c.len()).min().unwrap_or(0);
        let mut windows = Vec::with_capacity(self.window_count(len));

        for window_index in 0.. {
            let begin = window_index * self.stride;
            if begin + self.window_size > len {
                break;
            }

            let label = tool_class.require(cut_no)?;
            let samples = Array2::from_shape_fn((self.window_size, SIGNAL_COUNT), |(s, ch)| {
                channels[ch][begin + s]
            });

            windows.push(Window {
                id: WindowId::new(cut_no, window_index),
                label,
                samples,
            });
        }

        debug!(
            "Cut {}: {} samples -> {} windows",
            cut_no,
            len,
            windows.len()
        );
        Ok(windows)
    }
}
