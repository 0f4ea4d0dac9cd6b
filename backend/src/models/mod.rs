//! Domain models for the cpfcheck comparison pipeline.
//!
//! - [`CellValue`] - a scalar spreadsheet cell (text, number or empty)
//! - [`Record`] - one row, addressed through its dataset's headers
//! - [`Dataset`] - header list + ordered records (first sheet of a file)
//! - [`ComparisonStats`] - aggregate counts shown to the user
//! - [`Comparison`] - engine output: outcome, stats and result datasets

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Cells
// =============================================================================

/// A scalar cell value as read from a spreadsheet.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    /// Blank cell. Never "absent": every record has a value for every header.
    #[default]
    Empty,
    /// Text cell.
    Text(String),
    /// Numeric cell (integers, floats and date serials).
    Number(f64),
}

impl CellValue {
    /// Build a text cell, mapping `""` to [`CellValue::Empty`].
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(value)
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.is_empty(),
            CellValue::Number(_) => false,
        }
    }

    /// Empty, empty text, zero and NaN count as "no value".
    pub fn is_falsy(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.is_empty(),
            CellValue::Number(n) => *n == 0.0 || n.is_nan(),
        }
    }
}

/// Numbers of 1e21 and above print in positional notation ("1000…0"),
/// never as "1e+21"; only matters for values far beyond 11 digits.
impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(s) => f.write_str(s),
            // Integral values print without a fractional part: a CPF stored
            // as a number must read "12345678901", not "12345678901.0".
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
            CellValue::Number(n) => write!(f, "{}", n),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::text(value)
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::text(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Number(value as f64)
    }
}

impl Serialize for CellValue {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CellValue::Empty => serializer.serialize_str(""),
            CellValue::Text(s) => serializer.serialize_str(s),
            CellValue::Number(n) => serializer.serialize_f64(*n),
        }
    }
}

// =============================================================================
// Records and datasets
// =============================================================================

/// One row of a dataset. Cells are aligned with [`Dataset::headers`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    cells: Vec<CellValue>,
}

impl Record {
    pub fn new(cells: Vec<CellValue>) -> Self {
        Self { cells }
    }

    /// Cell at a column position; out-of-range reads as empty.
    pub fn cell(&self, index: usize) -> &CellValue {
        static EMPTY: CellValue = CellValue::Empty;
        self.cells.get(index).unwrap_or(&EMPTY)
    }

    pub fn cells(&self) -> &[CellValue] {
        &self.cells
    }
}

/// An ordered sequence of records sharing one header list.
///
/// Header names are kept exactly as they appear in the source file;
/// fuzzy matching happens in [`crate::reconcile::normalize`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dataset {
    headers: Vec<String>,
    records: Vec<Record>,
}

impl Dataset {
    /// Build a dataset, padding or truncating every row to the header width.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        let width = headers.len();
        let records = rows
            .into_iter()
            .map(|mut cells| {
                cells.resize(width, CellValue::Empty);
                Record::new(cells)
            })
            .collect();
        Self { headers, records }
    }

    /// Dataset with the same headers and the given records.
    pub fn with_records(&self, records: Vec<Record>) -> Self {
        Self {
            headers: self.headers.clone(),
            records,
        }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Position of a header, by exact name.
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == column)
    }

    /// Value of `column` in `record`; unknown columns read as empty.
    pub fn value<'a>(&self, record: &'a Record, column: &str) -> &'a CellValue {
        static EMPTY: CellValue = CellValue::Empty;
        match self.column_index(column) {
            Some(i) => record.cell(i),
            None => &EMPTY,
        }
    }

    /// Records as JSON objects (header → value), in column order.
    pub fn to_json_rows(&self) -> Vec<serde_json::Value> {
        self.records
            .iter()
            .map(|record| {
                let obj: serde_json::Map<String, serde_json::Value> = self
                    .headers
                    .iter()
                    .zip(record.cells())
                    .map(|(h, v)| (h.clone(), serde_json::to_value(v).unwrap_or_default()))
                    .collect();
                serde_json::Value::Object(obj)
            })
            .collect()
    }
}

// =============================================================================
// Comparison output
// =============================================================================

/// Aggregate counts of one comparison.
///
/// Branch fields are only present when that branch actually ran.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonStats {
    /// Records in the base file.
    pub base_total: usize,

    /// Base records kept after removing RGPS rows.
    pub base_filtered: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pensionistas_total: Option<usize>,

    /// Filtered base rows whose CPF appears in the pensioners file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pensionistas_matches: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aposentados_total: Option<usize>,

    /// Retiree rows whose CPF is absent from the filtered base.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aposentados_missing: Option<usize>,
}

/// Columns the engine located, for logs and the `inspect` command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocatedColumns {
    pub base_cpf: Option<String>,
    pub base_recipient: Option<String>,
    pub pensionistas_cpf: Option<String>,
    pub aposentados_cpf: Option<String>,
}

/// Result of [`crate::reconcile::reconcile`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Comparison {
    pub success: bool,
    pub message: String,
    pub stats: ComparisonStats,
    pub columns: LocatedColumns,

    /// Filtered base rows matching a pensioner CPF (base headers).
    pub pensionistas: Option<Dataset>,

    /// Retiree rows missing from the filtered base (retiree headers).
    pub aposentados: Option<Dataset>,
}

impl Comparison {
    /// Failure outcome carrying the given stats.
    pub fn failure(message: impl Into<String>, stats: ComparisonStats) -> Self {
        Self {
            success: false,
            message: message.into(),
            stats,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_huge_number_display_is_positional() {
        assert_eq!(
            CellValue::Number(1e21).to_string(),
            "1000000000000000000000"
        );
    }

    #[test]
    fn test_number_display_is_integral() {
        assert_eq!(CellValue::Number(12345678901.0).to_string(), "12345678901");
        assert_eq!(CellValue::Number(1.5).to_string(), "1.5");
        assert_eq!(CellValue::Empty.to_string(), "");
    }

    #[test]
    fn test_falsy_values() {
        assert!(CellValue::Empty.is_falsy());
        assert!(CellValue::text("").is_falsy());
        assert!(CellValue::Number(0.0).is_falsy());
        assert!(!CellValue::text("0").is_falsy());
        assert!(!CellValue::Number(7.0).is_falsy());
    }

    #[test]
    fn test_dataset_pads_short_rows() {
        let ds = Dataset::new(
            vec!["CPF".into(), "Nome".into()],
            vec![vec![CellValue::from("123")]],
        );
        let record = &ds.records()[0];
        assert_eq!(record.cells().len(), 2);
        assert_eq!(ds.value(record, "Nome"), &CellValue::Empty);
        assert_eq!(ds.value(record, "CPF"), &CellValue::from("123"));
        assert_eq!(ds.value(record, "Unknown"), &CellValue::Empty);
    }

    #[test]
    fn test_stats_omit_absent_branches() {
        let stats = ComparisonStats {
            base_total: 3,
            base_filtered: 2,
            pensionistas_total: Some(5),
            pensionistas_matches: Some(1),
            ..Default::default()
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["baseTotal"], 3);
        assert_eq!(json["pensionistasMatches"], 1);
        assert!(json.get("aposentadosTotal").is_none());
        assert!(json.get("aposentadosMissing").is_none());
    }

    #[test]
    fn test_json_rows_keep_column_order() {
        let ds = Dataset::new(
            vec!["b".into(), "a".into()],
            vec![vec![CellValue::from("x"), CellValue::Number(2.0)]],
        );
        let rows = ds.to_json_rows();
        let keys: Vec<&String> = rows[0].as_object().unwrap().keys().collect();
        assert_eq!(keys, ["b", "a"]);
        assert_eq!(rows[0]["a"], 2.0);
    }
}
