//! Tabular Artifact I/O
//!
//! CSV encoding of the flattened dataset. Paths ending in `.gz` are
//! gzip-compressed on write and decompressed on read.

use crate::assembler::{TabularDataset, TabularRow};
use crate::error::{DataError, Result};
use crate::recording::{SignalChannel, SIGNAL_COUNT};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::info;

/// Column order of the tabular artifact
pub const TABULAR_COLUMNS: [&str; 10] = [
    "cut_id",
    "case",
    "time",
    "ae_spindle",
    "ae_table",
    "vib_spindle",
    "vib_table",
    "smcdc",
    "smcac",
    "tool_class",
];

fn is_gzip(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("gz")
}

impl TabularDataset {
    /// Write as CSV with a header row
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(TABULAR_COLUMNS)?;

        let mut record = Vec::with_capacity(TABULAR_COLUMNS.len());
        for row in &self.rows {
            record.clear();
            record.push(row.cut_id.to_string());
            record.push(row.case.to_string());
            record.push(row.time.to_string());
            record.extend(row.signals.iter().map(|v| v.to_string()));
            record.push(row.tool_class.to_string());
            csv_writer.write_record(&record)?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    /// Write to a file, gzip-compressed when the path ends in `.gz`
    pub fn write_path(&self, path: &Path) -> Result<()> {
        let file = BufWriter::new(File::create(path)?);
        if is_gzip(path) {
            let mut encoder = GzEncoder::new(file, Compression::default());
            self.write_csv(&mut encoder)?;
            encoder.finish()?.flush()?;
        } else {
            self.write_csv(file)?;
        }
        info!("Wrote {} tabular rows to {}", self.rows.len(), path.display());
        Ok(())
    }

    /// Read CSV with the fixed header
    ///
    /// Float columns are parsed at double precision and then narrowed to f32.
    pub fn read_csv<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let headers = csv_reader.headers()?.clone();
        if headers.iter().ne(TABULAR_COLUMNS.iter().copied()) {
            return Err(DataError::Csv(format!(
                "unexpected header {:?}, expected {:?}",
                headers.iter().collect::<Vec<_>>(),
                TABULAR_COLUMNS
            )));
        }

        let mut rows = Vec::new();
        for (line, record) in csv_reader.records().enumerate() {
            let record = record?;
            let field = |i: usize| record.get(i).unwrap_or("");
            let float = |i: usize| -> Result<f32> {
                field(i).parse::<f64>().map(|v| v as f32).map_err(|e| {
                    DataError::Csv(format!("row {line}, column {}: {e}", TABULAR_COLUMNS[i]))
                })
            };
            let int = |i: usize| -> Result<i64> {
                field(i).parse::<i64>().map_err(|e| {
                    DataError::Csv(format!("row {line}, column {}: {e}", TABULAR_COLUMNS[i]))
                })
            };

            let mut signals = [0.0f32; SIGNAL_COUNT];
            for (ch, value) in signals.iter_mut().enumerate() {
                *value = float(3 + ch)?;
            }

            rows.push(TabularRow {
                cut_id: field(0).parse()?,
                case: int(1)?,
                time: float(2)?,
                signals,
                tool_class: int(9)?,
            });
        }
        Ok(Self { rows })
    }

    /// Read from a file, decompressing when the path ends in `.gz`
    pub fn read_path(path: &Path) -> Result<Self> {
        let file = BufReader::new(File::open(path).map_err(|e| DataError::SourceUnavailable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?);
        if is_gzip(path) {
            Self::read_csv(GzDecoder::new(file))
        } else {
            Self::read_csv(file)
        }
    }
}

/// Column names of the six channels, in table order
pub fn signal_columns() -> [&'static str; SIGNAL_COUNT] {
    SignalChannel::ALL.map(|c| c.column_name())
}
