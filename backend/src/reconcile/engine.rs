//! Reconciliation engine: RGPS filter, CPF sets, match and diff.
//!
//! ```text
//! Base Geral ──filter RGPS──▶ base filtrada ──▶ CPF set
//!                                  │                │
//!   Pensionistas CPF set ──match───┘                │
//!   Aposentados ─────────────────────diff (absent)──┘
//! ```
//!
//! Pure function over in-memory datasets: no I/O, no state between calls.

use std::collections::HashSet;

use crate::error::ReconcileError;
use crate::models::{Comparison, ComparisonStats, Dataset, LocatedColumns, Record};

use super::normalize::{
    canonicalize, is_rgps, locate_column, CPF_KEYWORDS, PENSIONER_CPF_KEYWORDS,
    RECIPIENT_KEYWORDS,
};

/// Message of a comparison that ran.
pub const SUCCESS_MESSAGE: &str = "Análise concluída com sucesso.";

/// Columns located in the base dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseColumns {
    pub cpf: String,
    pub recipient: Option<String>,
}

/// Check the base preconditions: non-empty and a CPF column exists.
pub fn check_base(base: &Dataset) -> Result<BaseColumns, ReconcileError> {
    if base.is_empty() {
        return Err(ReconcileError::EmptyBase);
    }

    let cpf = locate_column(base.headers(), CPF_KEYWORDS)
        .ok_or(ReconcileError::MissingBaseCpfColumn)?;
    let recipient = locate_column(base.headers(), RECIPIENT_KEYWORDS);

    Ok(BaseColumns {
        cpf: cpf.to_string(),
        recipient: recipient.map(String::from),
    })
}

/// Base records whose recipient column does not mention RGPS.
///
/// Without a recipient column every record is kept.
pub fn filter_rgps(base: &Dataset, recipient: Option<&str>) -> Dataset {
    let Some(column) = recipient.and_then(|c| base.column_index(c)) else {
        return base.clone();
    };

    let kept: Vec<Record> = base
        .records()
        .iter()
        .filter(|record| !is_rgps(record.cell(column)))
        .cloned()
        .collect();

    base.with_records(kept)
}

/// Set of non-empty canonical CPFs of `column`.
pub fn cpf_set(dataset: &Dataset, column: &str) -> HashSet<String> {
    let Some(index) = dataset.column_index(column) else {
        return HashSet::new();
    };

    dataset
        .records()
        .iter()
        .map(|record| canonicalize(record.cell(index)))
        .filter(|cpf| !cpf.is_empty())
        .collect()
}

/// Records of `dataset` whose canonical CPF satisfies `keep`, in order.
fn select_by_cpf<F>(dataset: &Dataset, column: &str, mut keep: F) -> Dataset
where
    F: FnMut(&str) -> bool,
{
    let index = dataset.column_index(column);
    let selected: Vec<Record> = dataset
        .records()
        .iter()
        .filter(|record| {
            let cpf = index
                .map(|i| canonicalize(record.cell(i)))
                .unwrap_or_default();
            keep(&cpf)
        })
        .cloned()
        .collect();

    dataset.with_records(selected)
}

/// Compare the pensioners and retirees datasets against the general base.
///
/// Failures are returned as a [`Comparison`] with `success == false`;
/// this function never errors or panics.
///
/// # Example
/// ```
/// use cpfcheck::models::Dataset;
/// use cpfcheck::reconcile::reconcile;
///
/// let base = Dataset::new(
///     vec!["CPF".into(), "Destinatário".into()],
///     vec![vec!["111.222.333-44".into(), "INSS".into()]],
/// );
/// let pensionistas = Dataset::new(vec!["cpf".into()], vec![vec!["11122233344".into()]]);
///
/// let result = reconcile(&base, Some(&pensionistas), None);
/// assert!(result.success);
/// assert_eq!(result.stats.pensionistas_matches, Some(1));
/// ```
pub fn reconcile(
    base: &Dataset,
    pensionistas: Option<&Dataset>,
    aposentados: Option<&Dataset>,
) -> Comparison {
    let base_columns = match check_base(base) {
        Ok(columns) => columns,
        Err(e) => return Comparison::failure(e.to_string(), ComparisonStats::default()),
    };

    let base_filtered = filter_rgps(base, base_columns.recipient.as_deref());
    let base_cpfs = cpf_set(&base_filtered, &base_columns.cpf);

    let mut result = Comparison {
        success: true,
        message: SUCCESS_MESSAGE.to_string(),
        stats: ComparisonStats {
            base_total: base.len(),
            base_filtered: base_filtered.len(),
            ..Default::default()
        },
        columns: LocatedColumns {
            base_cpf: Some(base_columns.cpf.clone()),
            base_recipient: base_columns.recipient.clone(),
            ..Default::default()
        },
        ..Default::default()
    };

    // MATCH: filtered base rows whose CPF is a pensioner CPF
    if let Some(pen) = pensionistas.filter(|d| !d.is_empty()) {
        if let Some(pen_cpf) = locate_column(pen.headers(), PENSIONER_CPF_KEYWORDS) {
            let pen_cpfs = cpf_set(pen, pen_cpf);
            let matches =
                select_by_cpf(&base_filtered, &base_columns.cpf, |cpf| pen_cpfs.contains(cpf));

            result.stats.pensionistas_total = Some(pen.len());
            result.stats.pensionistas_matches = Some(matches.len());
            result.columns.pensionistas_cpf = Some(pen_cpf.to_string());
            result.pensionistas = Some(matches);
        }
    }

    // DIFF: retirees whose CPF is not in the filtered base
    if let Some(apo) = aposentados.filter(|d| !d.is_empty()) {
        if let Some(apo_cpf) = locate_column(apo.headers(), CPF_KEYWORDS) {
            let missing = select_by_cpf(apo, apo_cpf, |cpf| !base_cpfs.contains(cpf));

            result.stats.aposentados_total = Some(apo.len());
            result.stats.aposentados_missing = Some(missing.len());
            result.columns.aposentados_cpf = Some(apo_cpf.to_string());
            result.aposentados = Some(missing);
        }
    }

    if pensionistas.is_none() && aposentados.is_none() {
        let mut failure = Comparison::failure(
            ReconcileError::NoComparisonFile.to_string(),
            result.stats,
        );
        failure.columns = result.columns;
        return failure;
    }

    result
}
