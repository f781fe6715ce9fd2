//! Raw Milling Recordings
//!
//! Named-channel access to the per-cut signals and scalar metadata of a
//! milling experiment. The on-disk layout is one record per cut holding the
//! seven scalar fields and the six signal channels keyed by name.

use crate::error::{DataError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

/// Number of signal channels per cut
pub const SIGNAL_COUNT: usize = 6;

/// Signal channels, in dataset column order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalChannel {
    /// Acoustic emission at the spindle
    AeSpindle,
    /// Acoustic emission at the table
    AeTable,
    /// Vibration at the spindle
    VibSpindle,
    /// Vibration at the table
    VibTable,
    /// DC spindle motor current
    SmcDc,
    /// AC spindle motor current
    SmcAc,
}

impl SignalChannel {
    /// All channels in dataset column order
    pub const ALL: [SignalChannel; SIGNAL_COUNT] = [
        SignalChannel::AeSpindle,
        SignalChannel::AeTable,
        SignalChannel::VibSpindle,
        SignalChannel::VibTable,
        SignalChannel::SmcDc,
        SignalChannel::SmcAc,
    ];

    /// Field name in the raw recording
    pub fn source_name(&self) -> &'static str {
        match self {
            SignalChannel::AeSpindle => "AE_spindle",
            SignalChannel::AeTable => "AE_table",
            SignalChannel::VibSpindle => "vib_spindle",
            SignalChannel::VibTable => "vib_table",
            SignalChannel::SmcDc => "smcDC",
            SignalChannel::SmcAc => "smcAC",
        }
    }

    /// Column name in the tabular dataset
    pub fn column_name(&self) -> &'static str {
        match self {
            SignalChannel::AeSpindle => "ae_spindle",
            SignalChannel::AeTable => "ae_table",
            SignalChannel::VibSpindle => "vib_spindle",
            SignalChannel::VibTable => "vib_table",
            SignalChannel::SmcDc => "smcdc",
            SignalChannel::SmcAc => "smcac",
        }
    }
}

/// Scalar metadata recorded with each cut
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CutMetadata {
    /// Experimental case number
    #[serde(default)]
    pub case: Option<f64>,
    /// Run number within the case
    #[serde(default)]
    pub run: Option<f64>,
    /// Flank wear measurement (mm); null when not measured
    #[serde(default, rename = "VB")]
    pub vb: Option<f64>,
    /// Cumulative cutting time
    #[serde(default)]
    pub time: Option<f64>,
    /// Depth of cut
    #[serde(default, rename = "DOC")]
    pub doc: Option<f64>,
    /// Feed rate
    #[serde(default)]
    pub feed: Option<f64>,
    /// Workpiece material code
    #[serde(default)]
    pub material: Option<f64>,
}

/// One cut: metadata plus named signal channels
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CutRecord {
    pub metadata: CutMetadata,
    pub signals: BTreeMap<String, Vec<f64>>,
}

/// Read-only access to a multichannel recording, addressed by cut and channel
pub trait RecordingSource {
    /// Number of cuts in the recording
    fn cut_count(&self) -> usize;

    /// Samples per channel per cut
    fn sample_count(&self) -> usize;

    /// Scalar metadata of one cut
    fn metadata(&self, cut_no: usize) -> Result<&CutMetadata>;

    /// Samples of one channel of one cut
    fn channel(&self, cut_no: usize, channel: SignalChannel) -> Result<&[f64]>;
}

/// In-memory recording loaded from JSON or postcard
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawRecording {
    /// Samples per channel (identical for every cut)
    pub sample_count: usize,
    /// Cuts in ingestion order; position is the cut number
    pub cuts: Vec<CutRecord>,
}

impl RawRecording {
    /// Create an empty recording with a fixed per-channel sample count
    pub fn new(sample_count: usize) -> Self {
        Self {
            sample_count,
            cuts: Vec::new(),
        }
    }

    /// Append a cut; signals are given in `SignalChannel::ALL` order
    pub fn add_cut(
        &mut self,
        metadata: CutMetadata,
        signals: [Vec<f64>; SIGNAL_COUNT],
    ) -> Result<usize> {
        let cut_no = self.cuts.len();
        let mut named = BTreeMap::new();
        for (channel, samples) in SignalChannel::ALL.iter().zip(signals) {
            if samples.len() != self.sample_count {
                return Err(DataError::ChannelLength {
                    cut_no,
                    channel: channel.source_name().to_string(),
                    expected: self.sample_count,
                    actual: samples.len(),
                });
            }
            named.insert(channel.source_name().to_string(), samples);
        }
        self.cuts.push(CutRecord {
            metadata,
            signals: named,
        });
        Ok(cut_no)
    }

    /// Load a recording, dispatching on the file extension
    ///
    /// * `.json` - `{ "sample_count": n, "cuts": [{ "metadata": {..}, "signals": {..} }] }`
    /// * `.bin` / `.postcard` - the same structure encoded with postcard
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(DataError::SourceUnavailable {
                path: path.display().to_string(),
                reason: "file does not exist".to_string(),
            });
        }

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        let unreadable = |err: std::io::Error| DataError::SourceUnavailable {
            path: path.display().to_string(),
            reason: err.to_string(),
        };

        let recording = match ext.as_str() {
            "json" => Self::from_json_str(&std::fs::read_to_string(path).map_err(unreadable)?)?,
            "bin" | "postcard" => Self::from_postcard(&std::fs::read(path).map_err(unreadable)?)?,
            other => return Err(DataError::UnsupportedFormat(format!(".{other}"))),
        };

        info!(
            "Loaded recording {}: {} cuts x {} samples",
            path.display(),
            recording.cuts.len(),
            recording.sample_count
        );
        Ok(recording)
    }

    /// Parse and validate a JSON recording
    pub fn from_json_str(text: &str) -> Result<Self> {
        let recording: Self = serde_json::from_str(text)?;
        recording.validate()?;
        Ok(recording)
    }

    /// Decode and validate a postcard recording
    pub fn from_postcard(bytes: &[u8]) -> Result<Self> {
        let recording: Self = postcard::from_bytes(bytes)?;
        recording.validate()?;
        Ok(recording)
    }

    /// Encode as postcard bytes
    pub fn to_postcard(&self) -> Result<Vec<u8>> {
        Ok(postcard::to_allocvec(self)?)
    }

    /// Check every cut carries all channels at the declared length
    pub fn validate(&self) -> Result<()> {
        for (cut_no, cut) in self.cuts.iter().enumerate() {
            for channel in SignalChannel::ALL {
                let name = channel.source_name();
                let samples = cut.signals.get(name).ok_or_else(|| DataError::MissingChannel {
                    cut_no,
                    channel: name.to_string(),
                })?;
                if samples.len() != self.sample_count {
                    return Err(DataError::ChannelLength {
                        cut_no,
                        channel: name.to_string(),
                        expected: self.sample_count,
                        actual: samples.len(),
                    });
                }
            }
        }
        debug!("Validated {} cuts", self.cuts.len());
        Ok(())
    }

    fn cut(&self, cut_no: usize) -> Result<&CutRecord> {
        self.cuts.get(cut_no).ok_or(DataError::UnknownCut(cut_no))
    }
}

impl RecordingSource for RawRecording {
    fn cut_count(&self) -> usize {
        self.cuts.len()
    }

    fn sample_count(&self) -> usize {
        self.sample_count
    }

    fn metadata(&self, cut_no: usize) -> Result<&CutMetadata> {
        Ok(&self.cut(cut_no)?.metadata)
    }

    fn channel(&self, cut_no: usize, channel: SignalChannel) -> Result<&[f64]> {
        let name = channel.source_name();
        self.cut(cut_no)?
            .signals
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| DataError::MissingChannel {
                cut_no,
                channel: name.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signals(len: usize, offset: f64) -> [Vec<f64>; SIGNAL_COUNT] {
        std::array::from_fn(|ch| (0..len).map(|s| offset + ch as f64 + s as f64 * 0.5).collect())
    }

    #[test]
    fn test_named_channel_access() {
        let mut recording = RawRecording::new(8);
        recording.add_cut(CutMetadata::default(), signals(8, 0.0)).unwrap();

        let vib = recording.channel(0, SignalChannel::VibSpindle).unwrap();
        assert_eq!(vib.len(), 8);
        assert_eq!(vib[0], 2.0);
        assert_eq!(vib[2], 3.0);
    }

    #[test]
    fn test_add_cut_rejects_wrong_length() {
        let mut recording = RawRecording::new(8);
        let err = recording.add_cut(CutMetadata::default(), signals(7, 0.0));
        assert!(matches!(err, Err(DataError::ChannelLength { expected: 8, actual: 7, .. })));
    }

    #[test]
    fn test_unknown_cut() {
        let recording = RawRecording::new(4);
        assert!(matches!(recording.metadata(3), Err(DataError::UnknownCut(3))));
    }

    #[test]
    fn test_json_missing_channel() {
        let text = r#"{"sample_count": 2, "cuts": [{"metadata": {"VB": 0.1}, "signals": {"smcAC": [1.0, 2.0]}}]}"#;
        let err = RawRecording::from_json_str(text);
        assert!(matches!(err, Err(DataError::MissingChannel { cut_no: 0, .. })));
    }

    #[test]
    fn test_json_null_wear() {
        let mut recording = RawRecording::new(2);
        recording.add_cut(CutMetadata::default(), signals(2, 1.0)).unwrap();
        let text = serde_json::to_string(&recording).unwrap();
        let parsed = RawRecording::from_json_str(&text).unwrap();
        assert_eq!(parsed.metadata(0).unwrap().vb, None);
    }

    #[test]
    fn test_postcard_snapshot() {
        let mut recording = RawRecording::new(3);
        let metadata = CutMetadata {
            vb: Some(0.44),
            ..Default::default()
        };
        recording.add_cut(metadata, signals(3, 2.0)).unwrap();

        let bytes = recording.to_postcard().unwrap();
        let decoded = RawRecording::from_postcard(&bytes).unwrap();
        assert_eq!(decoded.metadata(0).unwrap().vb, Some(0.44));
        assert_eq!(
            decoded.channel(0, SignalChannel::SmcAc).unwrap(),
            recording.channel(0, SignalChannel::SmcAc).unwrap()
        );
    }

    #[test]
    fn test_load_missing_file() {
        let err = RawRecording::load(Path::new("/nonexistent/mill.json"));
        assert!(matches!(err, Err(DataError::SourceUnavailable { .. })));
    }
}
