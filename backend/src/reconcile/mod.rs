//! CPF reconciliation.
//!
//! - Normalize: header matching, CPF canonicalization, column location
//! - Engine: RGPS filter, pensioner match, retiree diff
//! - Pipeline: file bytes in, stats and xlsx exports out

pub mod engine;
pub mod normalize;
pub mod pipeline;

pub use engine::{check_base, cpf_set, filter_rgps, reconcile, BaseColumns, SUCCESS_MESSAGE};
pub use normalize::{
    canonicalize, is_rgps, locate_column, normalize_header, CPF_KEYWORDS,
    PENSIONER_CPF_KEYWORDS, RECIPIENT_KEYWORDS, RGPS_MARKER,
};
pub use pipeline::*;
