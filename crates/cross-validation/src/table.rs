//! Feature Table
//!
//! Named, typed columns over a shared row index. The harness pulls feature
//! matrices, label vectors and group keys out of it by column name.

use crate::error::{CvError, Result};
use mill_data::{signal_columns, TabularDataset};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Column the binary anomaly target is derived from
pub const TOOL_CLASS_COLUMN: &str = "tool_class";

/// Default name of the binary anomaly target
pub const TARGET_COLUMN: &str = "y";

/// One typed column
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Float(Vec<f64>),
    Int(Vec<i64>),
    Text(Vec<String>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Float(v) => v.len(),
            Column::Int(v) => v.len(),
            Column::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Kind name used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Column::Float(_) => "float",
            Column::Int(_) => "int",
            Column::Text(_) => "text",
        }
    }

    fn group_key(&self, row: usize) -> GroupKey {
        match self {
            Column::Int(v) => GroupKey::Int(v[row]),
            Column::Float(v) if v[row].fract() == 0.0 && v[row].is_finite() => {
                GroupKey::Int(v[row] as i64)
            }
            Column::Float(v) => GroupKey::Text(v[row].to_string()),
            Column::Text(v) => GroupKey::Text(v[row].clone()),
        }
    }
}

/// Value of a grouping column
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GroupKey {
    Int(i64),
    Text(String),
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKey::Int(v) => write!(f, "{v}"),
            GroupKey::Text(v) => f.write_str(v),
        }
    }
}

/// Join group keys for log and error messages
pub fn format_groups(groups: &[GroupKey]) -> String {
    groups
        .iter()
        .map(GroupKey::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Column-oriented table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureTable {
    columns: Vec<(String, Column)>,
    n_rows: usize,
}

impl FeatureTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column; every column must have the same length
    pub fn push_column(&mut self, name: impl Into<String>, column: Column) -> Result<()> {
        let name = name.into();
        if self.columns.iter().any(|(n, _)| *n == name) {
            return Err(CvError::DuplicateColumn(name));
        }
        if self.columns.is_empty() {
            self.n_rows = column.len();
        } else if column.len() != self.n_rows {
            return Err(CvError::ColumnLength {
                column: name,
                expected: self.n_rows,
                actual: column.len(),
            });
        }
        self.columns.push((name, column));
        Ok(())
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Column names in insertion order
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Result<&Column> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c)
            .ok_or_else(|| CvError::UnknownColumn(name.to_string()))
    }

    /// Every column not named in `excluded`, in table order
    pub fn remaining_columns(&self, excluded: &[&str]) -> Vec<String> {
        self.columns
            .iter()
            .map(|(n, _)| n)
            .filter(|n| !excluded.contains(&n.as_str()))
            .cloned()
            .collect()
    }

    /// Numeric matrix of `columns` restricted to `rows`
    pub fn matrix(&self, columns: &[String], rows: &[usize]) -> Result<Array2<f64>> {
        let mut x = Array2::zeros((rows.len(), columns.len()));
        for (j, name) in columns.iter().enumerate() {
            match self.column(name)? {
                Column::Float(v) => {
                    for (i, &row) in rows.iter().enumerate() {
                        x[[i, j]] = v[row];
                    }
                }
                Column::Int(v) => {
                    for (i, &row) in rows.iter().enumerate() {
                        x[[i, j]] = v[row] as f64;
                    }
                }
                other => {
                    return Err(CvError::ColumnType {
                        column: name.clone(),
                        expected: "numeric",
                        actual: other.kind(),
                    })
                }
            }
        }
        Ok(x)
    }

    /// Integer labels of `column` for every row
    pub fn labels(&self, column: &str) -> Result<Vec<i64>> {
        match self.column(column)? {
            Column::Int(v) => Ok(v.clone()),
            Column::Float(v) if v.iter().all(|x| x.fract() == 0.0) => {
                Ok(v.iter().map(|&x| x as i64).collect())
            }
            other => Err(CvError::ColumnType {
                column: column.to_string(),
                expected: "integer",
                actual: other.kind(),
            }),
        }
    }

    /// Binary 0/1 target of `column` restricted to `rows`
    pub fn binary_target(&self, column: &str, rows: &[usize]) -> Result<Array1<i64>> {
        let labels = self.labels(column)?;
        rows.iter()
            .map(|&row| match labels[row] {
                v @ (0 | 1) => Ok(v),
                value => Err(CvError::NonBinaryTarget {
                    column: column.to_string(),
                    value,
                }),
            })
            .collect()
    }

    /// Group key of every row
    pub fn group_keys(&self, column: &str) -> Result<Vec<GroupKey>> {
        let column = self.column(column)?;
        Ok((0..self.n_rows).map(|row| column.group_key(row)).collect())
    }

    /// Append `y = 1` where `tool_class > 1` (failed tool), else 0
    pub fn add_binary_anomaly_target(&mut self) -> Result<()> {
        let y: Vec<i64> = self
            .labels(TOOL_CLASS_COLUMN)?
            .into_iter()
            .map(|class| i64::from(class > 1))
            .collect();
        debug!(
            "Binary anomaly target: {} of {} rows positive",
            y.iter().filter(|&&v| v == 1).count(),
            y.len()
        );
        self.push_column(TARGET_COLUMN, Column::Int(y))
    }
}

impl From<&TabularDataset> for FeatureTable {
    fn from(dataset: &TabularDataset) -> Self {
        let rows = &dataset.rows;
        let mut columns = vec![
            (
                "cut_id".to_string(),
                Column::Text(rows.iter().map(|r| r.cut_id.to_string()).collect()),
            ),
            (
                "case".to_string(),
                Column::Int(rows.iter().map(|r| r.case).collect()),
            ),
            (
                "time".to_string(),
                Column::Float(rows.iter().map(|r| f64::from(r.time)).collect()),
            ),
        ];
        for (ch, name) in signal_columns().into_iter().enumerate() {
            columns.push((
                name.to_string(),
                Column::Float(rows.iter().map(|r| f64::from(r.signals[ch])).collect()),
            ));
        }
        columns.push((
            TOOL_CLASS_COLUMN.to_string(),
            Column::Int(rows.iter().map(|r| r.tool_class).collect()),
        ));

        Self {
            columns,
            n_rows: rows.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mill_data::{TabularRow, WindowId};
    use ndarray::array;

    fn table() -> FeatureTable {
        let mut table = FeatureTable::new();
        table.push_column("a", Column::Float(vec![0.5, 1.5, 2.5])).unwrap();
        table.push_column("b", Column::Int(vec![1, 2, 3])).unwrap();
        table
            .push_column("name", Column::Text(vec!["x".into(), "y".into(), "z".into()]))
            .unwrap();
        table.push_column("tool_class", Column::Int(vec![0, 2, 1])).unwrap();
        table
    }

    #[test]
    fn test_matrix_selects_rows_and_columns() {
        let x = table()
            .matrix(&["b".to_string(), "a".to_string()], &[2, 0])
            .unwrap();
        assert_eq!(x, array![[3.0, 2.5], [1.0, 0.5]]);
    }

    #[test]
    fn test_text_column_is_not_a_feature() {
        assert!(matches!(
            table().matrix(&["name".to_string()], &[0]),
            Err(CvError::ColumnType { actual: "text", .. })
        ));
    }

    #[test]
    fn test_length_and_name_checks() {
        let mut t = table();
        assert!(matches!(
            t.push_column("c", Column::Int(vec![1])),
            Err(CvError::ColumnLength { expected: 3, actual: 1, .. })
        ));
        assert!(matches!(
            t.push_column("a", Column::Int(vec![1, 2, 3])),
            Err(CvError::DuplicateColumn(_))
        ));
        assert!(matches!(t.column("missing"), Err(CvError::UnknownColumn(_))));
    }

    #[test]
    fn test_binary_anomaly_target() {
        let mut t = table();
        t.add_binary_anomaly_target().unwrap();
        assert_eq!(t.labels("y").unwrap(), vec![0, 1, 0]);
        assert_eq!(t.binary_target("y", &[1, 2]).unwrap(), array![1, 0]);
        assert!(matches!(
            t.binary_target("tool_class", &[1]),
            Err(CvError::NonBinaryTarget { value: 2, .. })
        ));
    }

    #[test]
    fn test_group_keys() {
        let t = table();
        assert_eq!(
            t.group_keys("name").unwrap()[1],
            GroupKey::Text("y".to_string())
        );
        assert_eq!(t.group_keys("b").unwrap()[0], GroupKey::Int(1));
        assert_eq!(format_groups(&t.group_keys("b").unwrap()), "1, 2, 3");
    }

    #[test]
    fn test_from_tabular() {
        let dataset = TabularDataset {
            rows: vec![TabularRow {
                cut_id: WindowId::new(4, 1),
                case: 4,
                time: 0.5,
                signals: [1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
                tool_class: 2,
            }],
        };
        let t = FeatureTable::from(&dataset);

        assert_eq!(
            t.column_names(),
            vec![
                "cut_id", "case", "time", "ae_spindle", "ae_table", "vib_spindle", "vib_table",
                "smcdc", "smcac", "tool_class"
            ]
        );
        assert_eq!(t.column("cut_id").unwrap(), &Column::Text(vec!["4_1".into()]));
        assert_eq!(t.column("smcac").unwrap(), &Column::Float(vec![6.0]));
    }
}
