use std::io::Read;

use serde::Serialize;

use crate::error::{AnalyzeError, Result};

/// Name of the designated time column.
pub const TIME_COLUMN: &str = "time";

/// Name of the appended score column.
pub const SCORE_COLUMN: &str = "anomaly_score";

/// Name of the appended label column.
pub const LABEL_COLUMN: &str = "is_anomaly";

/// A single cell of raw tabular input.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Text(String),
    /// An empty field.
    Missing,
}

impl Value {
    /// Parse a raw text field, preferring a numeric reading.
    pub fn parse(field: &str) -> Value {
        let trimmed = field.trim();
        if trimmed.is_empty() {
            return Value::Missing;
        }
        match trimmed.parse::<f64>() {
            Ok(n) => Value::Number(n),
            Err(_) => Value::Text(trimmed.to_string()),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    fn render(&self) -> String {
        match self {
            Value::Number(n) => n.to_string(),
            Value::Text(s) => s.clone(),
            Value::Missing => String::new(),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

/// Unparsed tabular input: ordered column names plus rectangular rows of
/// mixed-type values. Column order and row order are preserved throughout
/// the pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct RawTable {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl RawTable {
    /// Build a table from column names and rows, validating that every row
    /// has one value per column.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self> {
        for (i, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(AnalyzeError::RaggedRow {
                    row: i,
                    expected: columns.len(),
                    got: row.len(),
                });
            }
        }
        Ok(RawTable { columns, rows })
    }

    /// Build a table column-wise.
    ///
    /// # Panics
    /// Panics if the columns have unequal lengths.
    pub fn from_columns<N: Into<String>>(columns: Vec<(N, Vec<Value>)>) -> Self {
        let mut names: Vec<String> = Vec::new();
        let mut data: Vec<Vec<Value>> = Vec::new();
        for (name, values) in columns {
            names.push(name.into());
            data.push(values);
        }
        let n = data.first().map_or(0, Vec::len);
        for (name, values) in names.iter().zip(&data) {
            assert_eq!(values.len(), n, "column {name} has mismatched length");
        }
        let rows = (0..n)
            .map(|i| data.iter().map(|col| col[i].clone()).collect())
            .collect();
        RawTable {
            columns: names,
            rows,
        }
    }

    /// Parse CSV bytes (with a header row) into a table. Each field is read
    /// as a number where possible, otherwise kept as text.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let columns: Vec<String> = rdr.headers()?.iter().map(String::from).collect();
        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            rows.push(record.iter().map(Value::parse).collect());
        }
        // The csv reader already rejects ragged records.
        Ok(RawTable { columns, rows })
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }
}

/// The time axis of a [`NumericTable`]: numeric values when the input had a
/// numeric `time` column (or none, in which case 0..N-1 is synthesized),
/// text labels when the input `time` column was non-numeric.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TimeAxis {
    Numeric(Vec<f64>),
    Labels(Vec<String>),
}

impl TimeAxis {
    pub fn len(&self) -> usize {
        match self {
            TimeAxis::Numeric(v) => v.len(),
            TimeAxis::Labels(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Numeric view of the axis, when it has one.
    pub fn as_numeric(&self) -> Option<&[f64]> {
        match self {
            TimeAxis::Numeric(v) => Some(v),
            TimeAxis::Labels(_) => None,
        }
    }

    /// Display form of the i-th tick, for rendering.
    pub fn label(&self, i: usize) -> String {
        match self {
            TimeAxis::Numeric(v) => v[i].to_string(),
            TimeAxis::Labels(v) => v[i].clone(),
        }
    }
}

/// A [`RawTable`] reduced to its numeric columns plus a guaranteed time
/// column in position 0. All columns have equal length.
#[derive(Debug, Clone, Serialize)]
pub struct NumericTable {
    time: TimeAxis,
    columns: Vec<(String, Vec<f64>)>,
}

impl NumericTable {
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn time(&self) -> &TimeAxis {
        &self.time
    }

    /// Column count, the time axis included.
    pub fn n_columns(&self) -> usize {
        1 + self.columns.len()
    }

    /// Column names with `time` first, in original input order.
    pub fn column_names(&self) -> Vec<&str> {
        let mut names = Vec::with_capacity(self.n_columns());
        names.push(TIME_COLUMN);
        names.extend(self.columns.iter().map(|(name, _)| name.as_str()));
        names
    }

    /// Non-time column names, in original input order.
    pub fn feature_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    /// Values of a non-time column.
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, values)| values.as_slice())
    }
}

/// Reduce a raw table to its numeric columns.
///
/// Columns whose cells are uniformly numeric are kept in their original
/// order. A non-numeric `time` column is carried over as text labels rather
/// than dropped; when no `time` column survives, the integer sequence
/// 0..N-1 is synthesized. The output always has `time` in position 0.
pub fn ingest(raw: &RawTable) -> Result<NumericTable> {
    let n = raw.n_rows();
    if n == 0 {
        return Err(AnalyzeError::EmptyInput);
    }

    let mut time: Option<TimeAxis> = None;
    let mut columns = Vec::new();
    for (j, name) in raw.columns().iter().enumerate() {
        let numeric: Option<Vec<f64>> = raw.rows().iter().map(|row| row[j].as_number()).collect();
        if name == TIME_COLUMN && time.is_none() {
            time = Some(match numeric {
                Some(values) => TimeAxis::Numeric(values),
                None => TimeAxis::Labels(raw.rows().iter().map(|row| row[j].render()).collect()),
            });
        } else if let Some(values) = numeric {
            columns.push((name.clone(), values));
        }
    }

    let time = time.unwrap_or_else(|| TimeAxis::Numeric((0..n).map(|i| i as f64).collect()));
    Ok(NumericTable { time, columns })
}

/// A [`NumericTable`] annotated with `anomaly_score` and `is_anomaly`
/// columns. Built once per analysis and never mutated.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredTable {
    table: NumericTable,
    anomaly_score: Vec<f64>,
    is_anomaly: Vec<u8>,
}

impl ScoredTable {
    pub(crate) fn new(table: NumericTable, scores: Vec<f64>, labels: Vec<u8>) -> Self {
        debug_assert_eq!(scores.len(), table.len());
        debug_assert_eq!(labels.len(), table.len());
        ScoredTable {
            table,
            anomaly_score: scores,
            is_anomaly: labels,
        }
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Column count, the two appended columns included.
    pub fn n_columns(&self) -> usize {
        self.table.n_columns() + 2
    }

    pub fn column_names(&self) -> Vec<&str> {
        let mut names = self.table.column_names();
        names.push(SCORE_COLUMN);
        names.push(LABEL_COLUMN);
        names
    }

    pub fn time(&self) -> &TimeAxis {
        self.table.time()
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.table.column(name)
    }

    /// Per-row anomaly scores; higher means more anomalous.
    pub fn scores(&self) -> &[f64] {
        &self.anomaly_score
    }

    /// Per-row anomaly labels, 1 for anomalous rows.
    pub fn labels(&self) -> &[u8] {
        &self.is_anomaly
    }

    /// Number of rows labelled anomalous.
    pub fn anomaly_count(&self) -> usize {
        self.is_anomaly.iter().filter(|&&l| l == 1).count()
    }

    /// Row indices ordered by descending anomaly score (ties keep row
    /// order), truncated to at most `k`.
    pub fn top_indices(&self, k: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..self.len()).collect();
        indices.sort_by(|&a, &b| {
            self.anomaly_score[b]
                .partial_cmp(&self.anomaly_score[a])
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.cmp(&b))
        });
        indices.truncate(k);
        indices
    }
}
