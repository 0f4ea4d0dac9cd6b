//! File-level comparison: load, reconcile, export.
//!
//! Files are loaded one after another (base, then pensioners, then
//! retirees). Optional files are not even read when the base is unusable.
//! Every outcome, including unreadable files, comes back as a
//! [`ComparisonReport`]; nothing here returns `Err`.
//!
//! # Example
//!
//! ```rust,ignore
//! use cpfcheck::reconcile::{compare_files, CompareInputs};
//!
//! let report = compare_files(&CompareInputs {
//!     base: "base_geral.xlsx".into(),
//!     pensionistas: Some("pensionistas.xlsx".into()),
//!     aposentados: None,
//! });
//! println!("{}: {:?}", report.message, report.stats);
//! ```

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::api::logs::{log_error, log_info, log_info_indent, log_success, log_warning};
use crate::error::CompareError;
use crate::export::{export_artifact, ExportArtifact, ExportKind};
use crate::models::{Comparison, ComparisonStats, Dataset};
use crate::parser::{load_bytes, LoadedFile};

use super::engine::{check_base, reconcile};

/// Message of a comparison that could not read or write its files.
pub const PROCESSING_ERROR_MESSAGE: &str = "Erro ao processar arquivos. Verifique os formatos.";

/// An uploaded file.
#[derive(Debug, Clone, Default)]
pub struct Upload {
    pub file_name: Option<String>,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(file_name: Option<String>, bytes: Vec<u8>) -> Self {
        Self { file_name, bytes }
    }

    /// Read a file from disk, keeping its name as a format hint.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        Ok(Self {
            file_name: path.file_name().and_then(|n| n.to_str()).map(String::from),
            bytes: std::fs::read(path)?,
        })
    }

    fn label(&self, fallback: &str) -> String {
        self.file_name.clone().unwrap_or_else(|| fallback.to_string())
    }
}

/// Input paths for [`compare_files`].
#[derive(Debug, Clone, Default)]
pub struct CompareInputs {
    pub base: PathBuf,
    pub pensionistas: Option<PathBuf>,
    pub aposentados: Option<PathBuf>,
}

/// Outcome of a file-level comparison.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonReport {
    pub success: bool,
    pub message: String,
    pub stats: ComparisonStats,

    #[serde(skip)]
    pub pensionistas: Option<ExportArtifact>,

    #[serde(skip)]
    pub aposentados: Option<ExportArtifact>,
}

impl ComparisonReport {
    fn processing_error() -> Self {
        Self {
            success: false,
            message: PROCESSING_ERROR_MESSAGE.to_string(),
            ..Default::default()
        }
    }

    fn from_failure(comparison: Comparison) -> Self {
        Self {
            success: comparison.success,
            message: comparison.message,
            stats: comparison.stats,
            ..Default::default()
        }
    }

    /// Artifacts that were produced, pensioners first.
    pub fn artifacts(&self) -> impl Iterator<Item = &ExportArtifact> {
        self.pensionistas.iter().chain(self.aposentados.iter())
    }
}

/// Compare uploaded files. Exports are dated today (UTC).
pub fn compare_uploads(
    base: &Upload,
    pensionistas: Option<&Upload>,
    aposentados: Option<&Upload>,
) -> ComparisonReport {
    compare_uploads_on(base, pensionistas, aposentados, Utc::now().date_naive())
}

/// Same as [`compare_uploads`] with an explicit export date.
pub fn compare_uploads_on(
    base: &Upload,
    pensionistas: Option<&Upload>,
    aposentados: Option<&Upload>,
    date: NaiveDate,
) -> ComparisonReport {
    match run(base, pensionistas, aposentados, date) {
        Ok(report) => report,
        Err(e) => {
            log_error(e.to_string());
            ComparisonReport::processing_error()
        }
    }
}

/// Compare files on disk. Unreadable paths give the processing error report.
pub fn compare_files(inputs: &CompareInputs) -> ComparisonReport {
    let read = |path: &Path| {
        Upload::from_path(path).map_err(|e| {
            log_error(format!("Cannot read {}: {}", path.display(), e));
        })
    };

    let Ok(base) = read(inputs.base.as_path()) else {
        return ComparisonReport::processing_error();
    };
    let pensionistas = match inputs.pensionistas.as_deref().map(read).transpose() {
        Ok(upload) => upload,
        Err(()) => return ComparisonReport::processing_error(),
    };
    let aposentados = match inputs.aposentados.as_deref().map(read).transpose() {
        Ok(upload) => upload,
        Err(()) => return ComparisonReport::processing_error(),
    };

    compare_uploads(&base, pensionistas.as_ref(), aposentados.as_ref())
}

fn run(
    base: &Upload,
    pensionistas: Option<&Upload>,
    aposentados: Option<&Upload>,
    date: NaiveDate,
) -> Result<ComparisonReport, CompareError> {
    log_info("📖 Reading Base Geral...");
    let base_data = load(base, "Base Geral")?;

    if let Err(e) = check_base(&base_data) {
        log_warning(e.to_string());
        return Ok(ComparisonReport::from_failure(Comparison::failure(
            e.to_string(),
            ComparisonStats::default(),
        )));
    }

    let pen_data = match pensionistas {
        Some(upload) => {
            log_info("📖 Reading Pensionistas...");
            Some(load(upload, "Pensionistas")?)
        }
        None => None,
    };

    let apo_data = match aposentados {
        Some(upload) => {
            log_info("📖 Reading Aposentados...");
            Some(load(upload, "Aposentados")?)
        }
        None => None,
    };

    log_info("🔄 Comparing CPFs...");
    let comparison = reconcile(&base_data, pen_data.as_ref(), apo_data.as_ref());
    print_comparison(&comparison, pen_data.as_ref(), apo_data.as_ref());

    if !comparison.success {
        log_warning(&comparison.message);
        return Ok(ComparisonReport::from_failure(comparison));
    }

    let pensionistas = export(ExportKind::Pensionistas, comparison.pensionistas.as_ref(), date)?;
    let aposentados = export(ExportKind::Aposentados, comparison.aposentados.as_ref(), date)?;

    log_success(&comparison.message);

    Ok(ComparisonReport {
        success: true,
        message: comparison.message,
        stats: comparison.stats,
        pensionistas,
        aposentados,
    })
}

fn load(upload: &Upload, role: &str) -> Result<Dataset, CompareError> {
    let loaded: LoadedFile = load_bytes(&upload.bytes, upload.file_name.as_deref())
        .map_err(|source| CompareError::Load {
            file: upload.label(role),
            source,
        })?;

    log_success(format!(
        "{}: {} rows, {} columns ({})",
        upload.label(role),
        loaded.dataset.len(),
        loaded.dataset.headers().len(),
        loaded.format
    ));

    Ok(loaded.dataset)
}

fn export(
    kind: ExportKind,
    dataset: Option<&Dataset>,
    date: NaiveDate,
) -> Result<Option<ExportArtifact>, CompareError> {
    let Some(dataset) = dataset else {
        return Ok(None);
    };

    let artifact = export_artifact(kind, dataset, date).map_err(|source| CompareError::Export {
        file: kind.file_name(date),
        source,
    })?;

    log_success(format!(
        "💾 {} ({} rows, {} bytes)",
        artifact.file_name,
        artifact.rows,
        artifact.bytes.len()
    ));

    Ok(Some(artifact))
}

/// Log located columns and branch outcomes.
fn print_comparison(
    comparison: &Comparison,
    pensionistas: Option<&Dataset>,
    aposentados: Option<&Dataset>,
) {
    let columns = &comparison.columns;
    let stats = &comparison.stats;

    if let Some(ref col) = columns.base_cpf {
        log_info_indent(format!("Base CPF column: {}", col), 1);
    }
    match columns.base_recipient {
        Some(ref col) => {
            log_info_indent(format!("Recipient column: {}", col), 1);
            log_success(format!(
                "Base: {} rows, {} after removing RGPS",
                stats.base_total, stats.base_filtered
            ));
        }
        None => log_warning(format!(
            "No recipient column, RGPS filter skipped ({} rows)",
            stats.base_total
        )),
    }

    if let Some(pen) = pensionistas {
        match (&columns.pensionistas_cpf, stats.pensionistas_matches) {
            (Some(col), Some(matches)) => log_success(format!(
                "Pensionistas ({}): {} base rows matched out of {} pensioners",
                col, matches, pen.len()
            )),
            _ => log_warning(format!(
                "Pensionistas skipped ({} rows, no CPF column)",
                pen.len()
            )),
        }
    }

    if let Some(apo) = aposentados {
        match (&columns.aposentados_cpf, stats.aposentados_missing) {
            (Some(col), Some(missing)) => log_success(format!(
                "Aposentados ({}): {} of {} missing from the base",
                col, missing, apo.len()
            )),
            _ => log_warning(format!(
                "Aposentados skipped ({} rows, no CPF column)",
                apo.len()
            )),
        }
    }
}
