//! Dataset loader: spreadsheet or CSV bytes to a [`Dataset`].
//!
//! Workbooks (xlsx, xlsm, xlsb, xls, ods) are read with calamine, first
//! sheet only. Anything else goes through the CSV path, with encoding and
//! delimiter auto-detection. No CPF-specific logic here.

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;

use crate::error::{LoadError, LoadResult};
use crate::models::{CellValue, Dataset};

/// CSV parsing error with context
#[derive(Debug, Clone)]
pub struct CsvError {
    pub line: usize,
    pub message: String,
}

impl std::fmt::Display for CsvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for CsvError {}

impl CsvError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// How a file was decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceFormat {
    /// A workbook; only `sheet` was read.
    Workbook { sheet: String },
    /// Delimited text.
    Csv { encoding: String, delimiter: char },
}

impl std::fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceFormat::Workbook { sheet } => write!(f, "workbook, sheet '{}'", sheet),
            SourceFormat::Csv { encoding, delimiter } => {
                write!(f, "CSV, {} encoding, '{}' delimiter", encoding, format_delimiter(*delimiter))
            }
        }
    }
}

/// Result of loading with metadata
#[derive(Debug, Clone)]
pub struct LoadedFile {
    pub dataset: Dataset,
    pub format: SourceFormat,
}

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0];
const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// Load a dataset from raw bytes. `file_name` is only used as a format hint.
pub fn load_dataset(bytes: &[u8], file_name: Option<&str>) -> LoadResult<Dataset> {
    load_bytes(bytes, file_name).map(|loaded| loaded.dataset)
}

/// Load a dataset from a file on disk.
pub fn load_dataset_file<P: AsRef<Path>>(path: P) -> LoadResult<LoadedFile> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    let name = path.file_name().and_then(|n| n.to_str());
    load_bytes(&bytes, name)
}

/// Load raw bytes, sniffing the format, and report how they were decoded.
pub fn load_bytes(bytes: &[u8], file_name: Option<&str>) -> LoadResult<LoadedFile> {
    if is_workbook(bytes, file_name) {
        load_workbook(bytes)
    } else {
        load_csv(bytes)
    }
}

fn is_workbook(bytes: &[u8], file_name: Option<&str>) -> bool {
    if bytes.starts_with(ZIP_MAGIC) || bytes.starts_with(OLE_MAGIC) {
        return true;
    }
    file_name
        .and_then(|n| Path::new(n).extension())
        .and_then(|e| e.to_str())
        .is_some_and(|ext| WORKBOOK_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

// =============================================================================
// Workbooks
// =============================================================================

/// Read the first sheet of a workbook.
pub fn load_workbook(bytes: &[u8]) -> LoadResult<LoadedFile> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| LoadError::Spreadsheet(e.to_string()))?;

    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or(LoadError::NoSheets)?;

    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| LoadError::Spreadsheet(format!("sheet '{}': {}", sheet, e)))?;

    let rows: Vec<Vec<CellValue>> = range
        .rows()
        .map(|row| row.iter().map(cell_value).collect())
        .collect();

    Ok(LoadedFile {
        dataset: rows_to_dataset(rows),
        format: SourceFormat::Workbook { sheet },
    })
}

/// Map a calamine cell to a [`CellValue`].
///
/// Dates stay as their serial number, errors become their `#…` text.
pub fn cell_value(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::text(s.as_str()),
        Data::Float(n) => CellValue::Number(*n),
        Data::Int(n) => CellValue::Number(*n as f64),
        Data::Bool(b) => CellValue::text(if *b { "TRUE" } else { "FALSE" }),
        Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::text(s.as_str()),
        Data::Error(e) => CellValue::text(e.to_string()),
    }
}

/// First row is the header row; blank rows are dropped.
fn rows_to_dataset(rows: Vec<Vec<CellValue>>) -> Dataset {
    let mut rows = rows.into_iter();

    let Some(header_row) = rows.next() else {
        return Dataset::default();
    };

    let headers = unique_headers(header_row.iter().map(|c| c.to_string()).collect());
    let records: Vec<Vec<CellValue>> = rows
        .filter(|row| row.iter().any(|c| !c.is_empty()))
        .collect();

    Dataset::new(headers, records)
}

/// Make header names unique the way spreadsheet-to-JSON converters do:
/// blank headers become `__EMPTY`, repeats get `_1`, `_2`, ….
pub fn unique_headers(raw: Vec<String>) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();

    raw.into_iter()
        .map(|header| {
            let name = if header.is_empty() {
                "__EMPTY".to_string()
            } else {
                header
            };

            let mut next = match counts.get(&name).copied() {
                None | Some(0) => {
                    counts.insert(name.clone(), 1);
                    return name;
                }
                Some(n) => n,
            };

            let candidate = loop {
                let candidate = format!("{}_{}", name, next);
                next += 1;
                if !counts.contains_key(&candidate) {
                    break candidate;
                }
            };
            counts.insert(name, next);
            counts.insert(candidate.clone(), 1);
            candidate
        })
        .collect()
}

// =============================================================================
// CSV
// =============================================================================

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    // Normalize charset names
    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" => {
            encoding_rs::ISO_8859_15.decode(bytes).0.into_owned()
        }
        "windows-1252" | "cp1252" => {
            encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned()
        }
        // UTF-8 and anything unknown: lossy UTF-8, BOM stripped
        _ => encoding_rs::UTF_8.decode(bytes).0.into_owned(),
    }
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [';', ',', '\t', '|'];
    let mut best_sep = ';';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Format delimiter for display
fn format_delimiter(d: char) -> &'static str {
    match d {
        ';' => ";",
        ',' => ",",
        '\t' => "TAB",
        '|' => "|",
        _ => "?",
    }
}

/// Parse CSV text with an explicit delimiter.
///
/// # Example
/// ```
/// use cpfcheck::parser::csv_to_dataset;
///
/// let ds = csv_to_dataset("cpf;nome\n111;Ana\n222;Bia", ';').unwrap();
/// assert_eq!(ds.len(), 2);
/// assert_eq!(ds.headers(), ["cpf", "nome"]);
/// ```
pub fn csv_to_dataset(content: &str, delimiter: char) -> Result<Dataset, CsvError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let mut rows: Vec<Vec<CellValue>> = Vec::new();
    for (line_idx, result) in reader.records().enumerate() {
        let line_num = result
            .as_ref()
            .ok()
            .and_then(|r| r.position())
            .map(|p| p.line() as usize)
            .unwrap_or(line_idx + 1);

        let record = result.map_err(|e| CsvError::new(line_num, e.to_string()))?;
        rows.push(record.iter().map(CellValue::from).collect());
    }

    Ok(rows_to_dataset(rows))
}

/// Parse CSV bytes with auto-detection of encoding and delimiter.
pub fn load_csv(bytes: &[u8]) -> LoadResult<LoadedFile> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let delimiter = detect_delimiter(&content);

    let dataset = csv_to_dataset(&content, delimiter)?;

    Ok(LoadedFile {
        dataset,
        format: SourceFormat::Csv { encoding, delimiter },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;

    fn xlsx_bytes(rows: &[&[&str]]) -> Vec<u8> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                if !value.is_empty() {
                    sheet.write_string(r as u32, c as u16, *value).unwrap();
                }
            }
        }
        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn test_simple_csv() {
        let ds = csv_to_dataset("name;age\nAlice;30\nBob;25", ';').unwrap();

        assert_eq!(ds.len(), 2);
        assert_eq!(ds.value(&ds.records()[0], "name"), &CellValue::from("Alice"));
        assert_eq!(ds.value(&ds.records()[1], "age"), &CellValue::from("25"));
    }

    #[test]
    fn test_quoted_values() {
        let csv = "name;value\n\"Silva; Ana\";\"Hello World\"";
        let ds = csv_to_dataset(csv, ';').unwrap();

        assert_eq!(ds.value(&ds.records()[0], "name"), &CellValue::from("Silva; Ana"));
        assert_eq!(ds.value(&ds.records()[0], "value"), &CellValue::from("Hello World"));
    }

    #[test]
    fn test_empty_lines_skipped() {
        let ds = csv_to_dataset("a;b\n1;2\n\n;\n3;4\n", ';').unwrap();
        assert_eq!(ds.len(), 2);
    }

    #[test]
    fn test_missing_and_extra_values() {
        let ds = csv_to_dataset("a;b;c\n1;;3\n4\n5;6;7;8", ';').unwrap();
        let r = ds.records();

        assert_eq!(ds.value(&r[0], "b"), &CellValue::Empty);
        assert_eq!(ds.value(&r[1], "c"), &CellValue::Empty);
        assert_eq!(r[2].cells().len(), 3);
    }

    #[test]
    fn test_empty_csv_is_empty_dataset() {
        let loaded = load_csv(b"").unwrap();
        assert!(loaded.dataset.is_empty());
        assert!(loaded.dataset.headers().is_empty());
    }

    #[test]
    fn test_error_message_format() {
        let err = CsvError::new(5, "unexpected end of record");
        assert_eq!(err.to_string(), "Line 5: unexpected end of record");
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
        assert_eq!(detect_delimiter("a\tb\tc\n1\t2\t3"), '\t');
        assert_eq!(detect_delimiter("a|b|c\n1|2|3"), '|');
    }

    #[test]
    fn test_auto_load_csv() {
        let loaded = load_bytes(b"CPF,Nome\n111.222.333-44,Ana", Some("base.csv")).unwrap();

        assert_eq!(loaded.dataset.headers(), ["CPF", "Nome"]);
        assert!(matches!(
            loaded.format,
            SourceFormat::Csv { delimiter: ',', .. }
        ));
    }

    #[test]
    fn test_latin1_decoding() {
        // "Destinatário" in ISO-8859-1
        let bytes: &[u8] = b"Destinat\xE1rio";
        let decoded = decode_content(bytes, "iso-8859-1");
        assert_eq!(decoded, "Destinatário");
    }

    #[test]
    fn test_unique_headers() {
        let raw = vec!["CPF", "", "CPF", "", "CPF_1", "CPF"]
            .into_iter()
            .map(String::from)
            .collect();

        assert_eq!(
            unique_headers(raw),
            ["CPF", "__EMPTY", "CPF_1", "__EMPTY_1", "CPF_1_1", "CPF_2"]
        );
    }

    #[test]
    fn test_load_xlsx_first_sheet() {
        let bytes = xlsx_bytes(&[
            &["CPF", "Destinatário"],
            &["111.222.333-44", "INSS"],
            &["", ""],
            &["555", ""],
        ]);

        let loaded = load_bytes(&bytes, Some("base.xlsx")).unwrap();
        let ds = loaded.dataset;

        assert_eq!(ds.headers(), ["CPF", "Destinatário"]);
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.value(&ds.records()[1], "Destinatário"), &CellValue::Empty);
        assert!(matches!(loaded.format, SourceFormat::Workbook { .. }));
    }

    #[test]
    fn test_load_xlsx_numbers() {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "cpf").unwrap();
        sheet.write_number(1, 0, 11122233344.0).unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let ds = load_dataset(&bytes, None).unwrap();

        assert_eq!(ds.records()[0].cell(0), &CellValue::Number(11122233344.0));
        assert_eq!(ds.records()[0].cell(0).to_string(), "11122233344");
    }

    #[test]
    fn test_load_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aposentados.xlsx");
        std::fs::write(&path, xlsx_bytes(&[&["CPF"], &["1"]])).unwrap();

        let loaded = load_dataset_file(&path).unwrap();
        assert_eq!(loaded.dataset.len(), 1);
    }

    #[test]
    fn test_corrupt_workbook_is_an_error() {
        let mut bytes = ZIP_MAGIC.to_vec();
        bytes.extend_from_slice(b"not really a zip");

        let err = load_dataset(&bytes, Some("base.xlsx")).unwrap_err();
        assert!(matches!(err, LoadError::Spreadsheet(_)));
    }
}
