//! Header matching and CPF canonicalization.
//!
//! Real-world spreadsheets spell their columns in many ways ("CPF",
//! "Nº CPF", "CPF do Legador", "Destinatário"). Columns are located by
//! substring over a normalized header: lower-cased, accents removed, trimmed.

use unicode_normalization::UnicodeNormalization;

use crate::models::CellValue;

/// Keyword fragments of an identifier column.
pub const CPF_KEYWORDS: &[&str] = &["cpf"];

/// Identifier fragments for the pensioners file, which may carry the
/// legator's CPF under a legacy header.
pub const PENSIONER_CPF_KEYWORDS: &[&str] = &["cpf", "cpf legador"];

/// Fragments of the benefit recipient column of the base file.
pub const RECIPIENT_KEYWORDS: &[&str] = &["destinatario", "destinatário"];

/// Regime marker excluded from the base.
pub const RGPS_MARKER: &str = "RGPS";

/// Normalize a header for fuzzy comparison.
///
/// # Example
/// ```
/// use cpfcheck::reconcile::normalize_header;
///
/// assert_eq!(normalize_header("  Destinatário "), "destinatario");
/// ```
pub fn normalize_header(header: &str) -> String {
    header
        .to_lowercase()
        .nfd()
        .filter(|c| !('\u{0300}'..='\u{036f}').contains(c))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Reduce a cell to its digit-only CPF form.
///
/// Blank, zero and NaN cells yield `""`. No length or check-digit
/// validation is done.
pub fn canonicalize(value: &CellValue) -> String {
    if value.is_falsy() {
        return String::new();
    }
    value
        .to_string()
        .chars()
        .filter(char::is_ascii_digit)
        .collect()
}

/// First header (in column order) whose normalized form contains any keyword.
///
/// Keywords are compared as-is, so they must already be lower-case and
/// free of accents to match.
pub fn locate_column<'a>(headers: &'a [String], keywords: &[&str]) -> Option<&'a str> {
    headers
        .iter()
        .find(|h| {
            let normalized = normalize_header(h);
            keywords.iter().any(|k| normalized.contains(k))
        })
        .map(String::as_str)
}

/// Upper-cased cell text contains the RGPS marker.
pub fn is_rgps(value: &CellValue) -> bool {
    value.to_string().to_uppercase().contains(RGPS_MARKER)
}
