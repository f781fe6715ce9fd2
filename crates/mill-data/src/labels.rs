//! Label Catalog
//!
//! One row per retained cut: the cut number, its valid sample range and the
//! ordinal tool-condition class derived from the flank wear measurement.
//!
//! Classes follow the wear bands of the milling study:
//! - Healthy (0): VB < 0.2 mm
//! - Degraded (1): 0.2 mm <= VB < 0.7 mm
//! - Failed (2): VB >= 0.7 mm
//!
//! A cut without a wear measurement keeps an explicit `Missing` class.

use crate::error::{DataError, Result};
use crate::recording::{CutMetadata, RecordingSource};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::io::{Read, Write};
use std::path::Path;
use tracing::{debug, info, warn};

/// Cuts excluded by default (erroneous recordings 17 and 94 of the full set)
pub const DEFAULT_CUT_DROP_LIST: &[usize] = &[17, 94];

/// Upper wear bound of the healthy class (mm)
pub const HEALTHY_WEAR_LIMIT: f64 = 0.2;

/// Lower wear bound of the failed class (mm)
pub const FAILURE_WEAR_LIMIT: f64 = 0.7;

/// Ordinal tool-condition class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToolClass {
    Healthy,
    Degraded,
    Failed,
    /// Wear was not measured for this cut
    Missing,
}

impl ToolClass {
    /// Integer code, `None` for a missing class
    pub fn code(&self) -> Option<i64> {
        match self {
            ToolClass::Healthy => Some(0),
            ToolClass::Degraded => Some(1),
            ToolClass::Failed => Some(2),
            ToolClass::Missing => None,
        }
    }

    /// Parse an integer code
    pub fn from_code(cut_no: usize, value: i64) -> Result<Self> {
        match value {
            0 => Ok(ToolClass::Healthy),
            1 => Ok(ToolClass::Degraded),
            2 => Ok(ToolClass::Failed),
            _ => Err(DataError::InvalidToolClass { cut_no, value }),
        }
    }

    /// Integer code, failing for a missing class
    pub fn require(&self, cut_no: usize) -> Result<i64> {
        self.code().ok_or(DataError::MissingToolClass(cut_no))
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, ToolClass::Missing)
    }
}

/// Map a flank wear measurement to its tool class
pub fn compute_tool_class(vb: Option<f64>) -> ToolClass {
    match vb {
        None => ToolClass::Missing,
        Some(v) if v.is_nan() => ToolClass::Missing,
        Some(v) if v < HEALTHY_WEAR_LIMIT => ToolClass::Healthy,
        Some(v) if v < FAILURE_WEAR_LIMIT => ToolClass::Degraded,
        Some(_) => ToolClass::Failed,
    }
}

/// Label and valid sample range of one cut
#[derive(Debug, Clone, PartialEq)]
pub struct LabelRow {
    /// Index into the recording's cut dimension
    pub cut_no: usize,
    pub tool_class: ToolClass,
    /// First valid sample (inclusive)
    pub window_start: usize,
    /// End of the valid samples (exclusive)
    pub window_end: usize,
    /// Scalar fields carried through from the source
    pub metadata: CutMetadata,
}

/// One line of a label table
#[derive(Debug, Deserialize)]
struct LabelRecord {
    #[serde(default)]
    case: Option<f64>,
    #[serde(default)]
    run: Option<f64>,
    #[serde(default, rename = "VB")]
    vb: Option<f64>,
    #[serde(default)]
    time: Option<f64>,
    #[serde(default, rename = "DOC")]
    doc: Option<f64>,
    #[serde(default)]
    feed: Option<f64>,
    #[serde(default)]
    material: Option<f64>,
    cut_no: usize,
    #[serde(default)]
    tool_class: Option<f64>,
    window_start: usize,
    window_end: usize,
}

impl LabelRecord {
    fn into_row(self) -> Result<LabelRow> {
        let tool_class = match self.tool_class {
            Some(code) if !code.is_nan() => {
                if code.fract() != 0.0 {
                    return Err(DataError::InvalidToolClass {
                        cut_no: self.cut_no,
                        value: code as i64,
                    });
                }
                ToolClass::from_code(self.cut_no, code as i64)?
            }
            _ => compute_tool_class(self.vb),
        };

        Ok(LabelRow {
            cut_no: self.cut_no,
            tool_class,
            window_start: self.window_start,
            window_end: self.window_end,
            metadata: CutMetadata {
                case: self.case,
                run: self.run,
                vb: self.vb,
                time: self.time,
                doc: self.doc,
                feed: self.feed,
                material: self.material,
            },
        })
    }
}

/// Immutable per-cut label table
#[derive(Debug, Clone)]
pub struct LabelCatalog {
    rows: Vec<LabelRow>,
}

impl LabelCatalog {
    /// Build a catalog from rows in source order
    ///
    /// `exclusions` names row positions of the source table; they are removed
    /// first and the survivors are then re-indexed sequentially.
    pub fn from_rows(rows: Vec<LabelRow>, exclusions: Option<&[usize]>) -> Result<Self> {
        let rows = match exclusions {
            Some(list) => {
                let drop: BTreeSet<usize> = list.iter().copied().collect();
                if let Some(&missing) = drop.iter().find(|&&pos| pos >= rows.len()) {
                    return Err(DataError::UnknownExclusion(missing));
                }
                rows.into_iter()
                    .enumerate()
                    .filter(|(pos, _)| !drop.contains(pos))
                    .map(|(_, row)| row)
                    .collect::<Vec<_>>()
            }
            None => rows,
        };

        let mut seen = HashSet::with_capacity(rows.len());
        for row in &rows {
            if !seen.insert(row.cut_no) {
                return Err(DataError::DuplicateCut(row.cut_no));
            }
            if row.window_start > row.window_end {
                warn!(
                    "Cut {} has an inverted sample range [{}, {}) and yields no windows",
                    row.cut_no, row.window_start, row.window_end
                );
            }
        }

        let missing = rows.iter().filter(|r| r.tool_class.is_missing()).count();
        if missing > 0 {
            warn!("{} cuts have no wear measurement and carry a missing class", missing);
        }
        info!("Label catalog built with {} cuts", rows.len());

        Ok(Self { rows })
    }

    /// Load a label table from CSV
    pub fn from_csv_path(path: &Path, exclusions: Option<&[usize]>) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| DataError::SourceUnavailable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        debug!("Reading label table {}", path.display());
        Self::from_csv_reader(file, exclusions)
    }

    /// Parse a label table from any CSV reader
    pub fn from_csv_reader<R: Read>(reader: R, exclusions: Option<&[usize]>) -> Result<Self> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let rows = csv_reader
            .deserialize::<LabelRecord>()
            .map(|record| record.map_err(DataError::from).and_then(LabelRecord::into_row))
            .collect::<Result<Vec<_>>>()?;
        Self::from_rows(rows, exclusions)
    }

    /// Derive the table from the recording's own metadata
    ///
    /// Every cut is labelled from its VB field and keeps its full sample range.
    pub fn from_recording<S: RecordingSource + ?Sized>(
        source: &S,
        exclusions: Option<&[usize]>,
    ) -> Result<Self> {
        info!("No label table given, deriving labels from {} cuts", source.cut_count());
        let rows = (0..source.cut_count())
            .map(|cut_no| {
                let metadata = source.metadata(cut_no)?.clone();
                Ok(LabelRow {
                    cut_no,
                    tool_class: compute_tool_class(metadata.vb),
                    window_start: 0,
                    window_end: source.sample_count(),
                    metadata,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Self::from_rows(rows, exclusions)
    }

    /// Rows in catalog order
    pub fn rows(&self) -> &[LabelRow] {
        &self.rows
    }

    /// Look up a cut by number
    pub fn get(&self, cut_no: usize) -> Result<&LabelRow> {
        self.rows
            .iter()
            .find(|row| row.cut_no == cut_no)
            .ok_or(DataError::UnknownCut(cut_no))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Write the catalog as a label table CSV
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        fn opt(value: Option<f64>) -> String {
            value.map(|v| v.to_string()).unwrap_or_default()
        }

        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record([
            "case",
            "run",
            "VB",
            "time",
            "DOC",
            "feed",
            "material",
            "cut_no",
            "tool_class",
            "window_start",
            "window_end",
        ])?;
        for row in &self.rows {
            let m = &row.metadata;
            csv_writer.write_record([
                opt(m.case),
                opt(m.run),
                opt(m.vb),
                opt(m.time),
                opt(m.doc),
                opt(m.feed),
                opt(m.material),
                row.cut_no.to_string(),
                row.tool_class.code().map(|c| c.to_string()).unwrap_or_default(),
                row.window_start.to_string(),
                row.window_end.to_string(),
            ])?;
        }
        csv_writer.flush()?;
        Ok(())
    }
}
