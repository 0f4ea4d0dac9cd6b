//! # cpfcheck - CPF reconciliation across benefit spreadsheets
//!
//! cpfcheck compares a *Base Geral* spreadsheet against *Pensionistas* and
//! *Aposentados* files by CPF and produces downloadable result workbooks.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ xlsx / csv  │────▶│   Parser    │────▶│  Reconcile  │────▶│ Result xlsx │
//! │  uploads    │     │ (first sheet│     │ (RGPS filter│     │ (in-memory  │
//! │             │     │  / auto-enc)│     │  + CPF sets)│     │   store)    │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use cpfcheck::{compare_files, CompareInputs};
//!
//! let report = compare_files(&CompareInputs {
//!     base: "base.xlsx".into(),
//!     pensionistas: Some("pensionistas.xlsx".into()),
//!     aposentados: None,
//! });
//! println!("{}: {:?}", report.message, report.stats);
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Cells, datasets and comparison results
//! - [`parser`] - Spreadsheet and CSV loading
//! - [`reconcile`] - Header matching, CPF canonicalization, comparison
//! - [`export`] - Result workbooks
//! - [`cache`] - In-memory export store
//! - [`config`] - Environment configuration
//! - [`api`] - HTTP API server

// Core modules
pub mod error;
pub mod models;

// Loading
pub mod parser;

// Comparison
pub mod reconcile;

// Output
pub mod export;
pub mod cache;

pub mod config;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    CompareError, ConfigError, ExportError, LoadError, ReconcileError, ServerError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{CellValue, Comparison, ComparisonStats, Dataset, LocatedColumns, Record};

// =============================================================================
// Re-exports - Parsing
// =============================================================================

pub use parser::{
    csv_to_dataset, decode_content, detect_delimiter, detect_encoding, load_bytes,
    load_dataset, load_dataset_file, CsvError, LoadedFile, SourceFormat,
};

// =============================================================================
// Re-exports - Reconciliation
// =============================================================================

pub use reconcile::{
    canonicalize, compare_files, compare_uploads, locate_column, normalize_header, reconcile,
    CompareInputs, ComparisonReport, Upload,
};

// =============================================================================
// Re-exports - Export & Store
// =============================================================================

pub use export::{export_xlsx, ExportArtifact, ExportKind};
pub use cache::ExportStore;
pub use config::AppConfig;

// =============================================================================
// Re-exports - API
// =============================================================================

pub use api::types::{error_response, CompareResponse, DownloadLink, Downloads};

// Server
pub mod server {
    pub use crate::api::server::start_server;
}
