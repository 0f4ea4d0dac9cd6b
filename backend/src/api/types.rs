//! REST API types for the upload page.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::export::{ExportArtifact, ExportKind};
use crate::models::ComparisonStats;
use crate::reconcile::ComparisonReport;

/// Response to `POST /api/compare`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareResponse {
    /// Key for `/api/download/{jobId}/{kind}`
    pub job_id: String,
    pub success: bool,
    /// User-facing status message (Portuguese)
    pub message: String,
    pub stats: ComparisonStats,
    pub downloads: Downloads,
}

/// Result workbooks ready for download.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Downloads {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pensionistas: Option<DownloadLink>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aposentados: Option<DownloadLink>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DownloadLink {
    pub file_name: String,
    pub url: String,
    pub rows: usize,
}

impl DownloadLink {
    fn new(job_id: &str, artifact: &ExportArtifact) -> Self {
        Self {
            file_name: artifact.file_name.clone(),
            url: download_url(job_id, artifact.kind),
            rows: artifact.rows,
        }
    }
}

/// `/api/download/{job_id}/{kind}`
pub fn download_url(job_id: &str, kind: ExportKind) -> String {
    format!("/api/download/{}/{}", job_id, kind.as_str())
}

impl CompareResponse {
    pub fn from_report(job_id: impl Into<String>, report: &ComparisonReport) -> Self {
        let job_id = job_id.into();
        let downloads = Downloads {
            pensionistas: report
                .pensionistas
                .as_ref()
                .map(|a| DownloadLink::new(&job_id, a)),
            aposentados: report
                .aposentados
                .as_ref()
                .map(|a| DownloadLink::new(&job_id, a)),
        };

        Self {
            job_id,
            success: report.success,
            message: report.message.clone(),
            stats: report.stats.clone(),
            downloads,
        }
    }
}

/// Create an error response
pub fn error_response(error: &str) -> Value {
    json!({
        "success": false,
        "error": error,
        "message": error,
    })
}
