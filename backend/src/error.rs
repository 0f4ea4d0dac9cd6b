//! Error types for the cpfcheck comparison pipeline.
//!
//! - [`LoadError`] - reading an uploaded spreadsheet or CSV into a dataset
//! - [`ExportError`] - writing a result dataset back to xlsx
//! - [`ReconcileError`] - base dataset preconditions
//! - [`CompareError`] - file-level orchestration (load + export)
//! - [`ConfigError`] - environment configuration
//! - [`ServerError`] - HTTP server
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

use crate::parser::CsvError;

// =============================================================================
// Loading Errors
// =============================================================================

/// Errors while turning raw file bytes into a [`crate::models::Dataset`].
#[derive(Debug, Error)]
pub enum LoadError {
    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    /// The workbook could not be decoded.
    #[error("Invalid spreadsheet: {0}")]
    Spreadsheet(String),

    /// The workbook has no worksheet at all.
    #[error("Spreadsheet contains no sheets")]
    NoSheets,

    /// CSV fallback failed.
    #[error("Invalid CSV: {0}")]
    Csv(#[from] CsvError),
}

// =============================================================================
// Export Errors
// =============================================================================

/// Errors while writing an xlsx export.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The xlsx writer rejected a sheet name, cell or the final save.
    #[error("Failed to write xlsx: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    /// Too many rows or columns for a worksheet.
    #[error("Dataset does not fit in a worksheet: {0}")]
    TooLarge(String),
}

// =============================================================================
// Reconciliation Errors
// =============================================================================

/// Precondition failures of the reconciliation engine.
///
/// The `Display` text is the message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    /// Base dataset has zero records.
    #[error("O arquivo da Base Geral está vazio.")]
    EmptyBase,

    /// No header of the base dataset looks like a CPF column.
    #[error("Coluna de CPF não encontrada na Base Geral.")]
    MissingBaseCpfColumn,

    /// Neither the pensioners nor the retirees file was supplied.
    #[error("Nenhum arquivo de comparação (Pensionista ou Aposentado) foi fornecido.")]
    NoComparisonFile,
}

// =============================================================================
// Compare Errors (file level)
// =============================================================================

/// Failures of the file-level pipeline that end in the generic
/// "check your formats" report.
#[derive(Debug, Error)]
pub enum CompareError {
    /// Loading one of the input files failed.
    #[error("Failed to load {file}: {source}")]
    Load {
        file: String,
        #[source]
        source: LoadError,
    },

    /// Writing one of the result workbooks failed.
    #[error("Failed to export {file}: {source}")]
    Export {
        file: String,
        #[source]
        source: ExportError,
    },
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Invalid environment configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable is set but cannot be parsed.
    #[error("Invalid value for {var}: '{value}' ({message})")]
    InvalidValue {
        var: &'static str,
        value: String,
        message: String,
    },
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Socket bind or serve failure.
    #[error("Server IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for loading operations.
pub type LoadResult<T> = Result<T, LoadError>;

/// Result type for export operations.
pub type ExportResult<T> = Result<T, ExportError>;

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        // CsvError -> LoadError
        let csv_err = CsvError::new(1, "Empty CSV file");
        let load_err: LoadError = csv_err.into();
        assert!(load_err.to_string().contains("Empty"));

        // LoadError -> CompareError keeps the file label
        let compare_err = CompareError::Load {
            file: "base.xlsx".into(),
            source: LoadError::NoSheets,
        };
        let msg = compare_err.to_string();
        assert!(msg.contains("base.xlsx"));
        assert!(msg.contains("no sheets"));
    }

    #[test]
    fn test_reconcile_messages_are_user_facing() {
        assert!(ReconcileError::EmptyBase.to_string().contains("vazio"));
        assert!(ReconcileError::MissingBaseCpfColumn.to_string().contains("CPF"));
        assert!(ReconcileError::NoComparisonFile
            .to_string()
            .contains("Nenhum arquivo"));
    }

    #[test]
    fn test_config_error_format() {
        let err = ConfigError::InvalidValue {
            var: "CPFCHECK_PORT",
            value: "abc".into(),
            message: "invalid digit".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("CPFCHECK_PORT"));
        assert!(msg.contains("abc"));
    }
}
