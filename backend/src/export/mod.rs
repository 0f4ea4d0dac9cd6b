//! Result workbooks: dataset to single-sheet xlsx bytes.

use chrono::NaiveDate;
use rust_xlsxwriter::Workbook;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{ExportError, ExportResult};
use crate::models::{CellValue, Dataset};

/// Excel worksheet limits.
const MAX_ROWS: usize = 1_048_576;
const MAX_COLS: usize = 16_384;

/// The two result workbooks a comparison can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportKind {
    /// Filtered base rows matching a pensioner CPF.
    Pensionistas,
    /// Retirees missing from the filtered base.
    Aposentados,
}

impl ExportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportKind::Pensionistas => "pensionistas",
            ExportKind::Aposentados => "aposentados",
        }
    }

    pub fn sheet_name(&self) -> &'static str {
        match self {
            ExportKind::Pensionistas => "Matches Pensionistas",
            ExportKind::Aposentados => "Ausentes Aposentados",
        }
    }

    pub fn file_prefix(&self) -> &'static str {
        match self {
            ExportKind::Pensionistas => "Resultado_Pensionistas",
            ExportKind::Aposentados => "Resultado_Aposentados_Ausentes",
        }
    }

    /// `Resultado_…_<YYYY-MM-DD>.xlsx`
    pub fn file_name(&self, date: NaiveDate) -> String {
        format!("{}_{}.xlsx", self.file_prefix(), date.format("%Y-%m-%d"))
    }
}

impl FromStr for ExportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pensionistas" | "pensioners" => Ok(ExportKind::Pensionistas),
            "aposentados" | "retirees" => Ok(ExportKind::Aposentados),
            other => Err(format!("Unknown export: {}", other)),
        }
    }
}

/// A generated result workbook.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportArtifact {
    pub kind: ExportKind,
    pub file_name: String,
    pub rows: usize,
    pub bytes: Vec<u8>,
}

/// Write `dataset` as a one-sheet xlsx.
///
/// Header row first, then one row per record. Numbers stay numbers, empty
/// cells stay blank. An empty dataset gives an empty sheet.
pub fn export_xlsx(dataset: &Dataset, sheet_name: &str) -> ExportResult<Vec<u8>> {
    if dataset.len() + 1 > MAX_ROWS {
        return Err(ExportError::TooLarge(format!("{} rows", dataset.len())));
    }
    if dataset.headers().len() > MAX_COLS {
        return Err(ExportError::TooLarge(format!(
            "{} columns",
            dataset.headers().len()
        )));
    }

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet().set_name(sheet_name)?;

    if !dataset.is_empty() {
        for (col, header) in dataset.headers().iter().enumerate() {
            worksheet.write_string(0, col as u16, header)?;
        }

        for (i, record) in dataset.records().iter().enumerate() {
            let row = (i + 1) as u32;
            for (col, cell) in record.cells().iter().enumerate() {
                match cell {
                    CellValue::Empty => {}
                    CellValue::Text(s) => {
                        worksheet.write_string(row, col as u16, s)?;
                    }
                    CellValue::Number(n) => {
                        worksheet.write_number(row, col as u16, *n)?;
                    }
                }
            }
        }
    }

    Ok(workbook.save_to_buffer()?)
}

/// Export a comparison output under its conventional name.
pub fn export_artifact(
    kind: ExportKind,
    dataset: &Dataset,
    date: NaiveDate,
) -> ExportResult<ExportArtifact> {
    let bytes = export_xlsx(dataset, kind.sheet_name())?;
    Ok(ExportArtifact {
        kind,
        file_name: kind.file_name(date),
        rows: dataset.len(),
        bytes,
    })
}
