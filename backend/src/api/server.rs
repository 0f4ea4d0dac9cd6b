//! HTTP Server for the CPF comparison API.
//!
//! # API Endpoints
//!
//! | Method | Path                              | Description                     |
//! |--------|-----------------------------------|---------------------------------|
//! | GET    | `/health`                         | Health check                    |
//! | POST   | `/api/compare`                    | Upload spreadsheets and compare |
//! | GET    | `/api/download/{job_id}/{kind}`   | Download a result workbook      |
//! | GET    | `/api/logs`                       | SSE stream for real-time logs   |

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, Method, StatusCode},
    response::{sse::Event, IntoResponse, Json, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio::sync::RwLock;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use super::logs::{log_info, LOG_BROADCASTER};
use super::types::{error_response, CompareResponse};
use crate::cache::ExportStore;
use crate::config::AppConfig;
use crate::error::{ServerError, ServerResult};
use crate::export::{ExportArtifact, ExportKind};
use crate::reconcile::{compare_uploads, ComparisonReport, Upload};

const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

type ApiError = (StatusCode, Json<Value>);

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RwLock<ExportStore>>,
}

impl AppState {
    pub fn new(store_capacity: usize) -> Self {
        Self {
            store: Arc::new(RwLock::new(ExportStore::with_capacity(store_capacity))),
        }
    }
}

/// Build the application router
pub fn router(config: &AppConfig) -> Router {
    router_with_state(config, AppState::new(config.store_capacity))
}

/// Build the router around an existing store.
pub fn router_with_state(config: &AppConfig, state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE, header::CONTENT_DISPOSITION]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/compare", post(compare))
        .route("/api/download/{job_id}/{kind}", get(download))
        .route("/api/logs", get(sse_logs))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(config: AppConfig) -> ServerResult<()> {
    let app = router(&config);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    println!("🚀 cpfcheck server running on http://localhost:{}", config.port);
    println!("   POST /api/compare                   - Upload spreadsheets");
    println!("   GET  /api/download/{{job_id}}/{{kind}} - Result workbook");
    println!("   GET  /api/logs                      - SSE log stream");
    println!("   GET  /health                        - Health check");
    println!();
    println!(
        "📦 Upload limit {} MB, keeping the last {} jobs",
        config.max_upload_bytes / (1024 * 1024),
        config.store_capacity
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "cpfcheck",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "compare": "POST /api/compare",
            "download": "GET /api/download/{job_id}/{kind}",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    // Lagged receivers skip the entries they missed
    let stream = BroadcastStream::new(rx).filter_map(|result| {
        let entry = result.ok()?;
        let json = serde_json::to_string(&entry).ok()?;
        Some(Ok(Event::default().data(json)))
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// The three upload slots of a comparison request.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub base: Option<Upload>,
    pub pensionistas: Option<Upload>,
    pub aposentados: Option<Upload>,
}

impl UploadForm {
    /// Put a multipart part in its slot. Empty parts and unknown names
    /// are ignored.
    pub fn accept(&mut self, field: &str, upload: Upload) {
        if upload.bytes.is_empty() {
            return;
        }
        let slot = match field {
            "base" => &mut self.base,
            "pensionistas" => &mut self.pensionistas,
            "aposentados" => &mut self.aposentados,
            _ => return,
        };
        *slot = Some(upload);
    }

    /// Run the comparison. Fails only when no base file was sent.
    pub fn compare(self) -> ServerResult<ComparisonReport> {
        let base = self
            .base
            .ok_or_else(|| ServerError::BadRequest("No base file provided".into()))?;
        Ok(compare_uploads(
            &base,
            self.pensionistas.as_ref(),
            self.aposentados.as_ref(),
        ))
    }
}

async fn read_form(mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(&format!("Multipart error: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        let file_name = field.file_name().map(|s| s.to_string());
        let bytes = field
            .bytes()
            .await
            .map_err(|e| bad_request(&format!("Read error: {}", e)))?;

        form.accept(&name, Upload::new(file_name, bytes.to_vec()));
    }

    Ok(form)
}

/// Compare endpoint
async fn compare(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<CompareResponse>, ApiError> {
    let form = read_form(multipart).await?;
    if form.base.is_none() {
        return Err(bad_request("No base file provided"));
    }

    let job_id = Uuid::new_v4().to_string();

    println!("\n{}", "=".repeat(70));
    println!("📄 NEW COMPARISON {}", job_id);
    for (label, upload) in [
        ("Base Geral", &form.base),
        ("Pensionistas", &form.pensionistas),
        ("Aposentados", &form.aposentados),
    ] {
        if let Some(upload) = upload {
            println!(
                "   {:<13} {} ({} bytes)",
                label,
                upload.file_name.as_deref().unwrap_or("unknown"),
                upload.bytes.len()
            );
        }
    }
    println!("{}\n", "=".repeat(70));

    let report = tokio::task::spawn_blocking(move || form.compare())
        .await
        .map_err(|e| {
            eprintln!("❌ Comparison task failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(error_response(&e.to_string())),
            )
        })?
        .map_err(|e| bad_request(&e.to_string()))?;

    print_summary(&report);

    let artifacts: Vec<ExportArtifact> = report.artifacts().cloned().collect();
    if !artifacts.is_empty() {
        let evicted = state.store.write().await.insert(job_id.clone(), artifacts);
        for job in evicted {
            log_info(format!(
                "🗑️  Job {} evicted (created {})",
                job.id,
                job.created_at.to_rfc3339()
            ));
        }
    }

    Ok(Json(CompareResponse::from_report(job_id, &report)))
}

fn print_summary(report: &ComparisonReport) {
    let stats = &report.stats;

    println!("\n{}", "=".repeat(70));
    println!("📊 SUMMARY");
    println!("{}", "=".repeat(70));
    println!("   Status:           {}", report.message);
    println!("   Base total:       {}", stats.base_total);
    println!("   Base (no RGPS):   {}", stats.base_filtered);
    if let Some(matches) = stats.pensionistas_matches {
        println!("   Pension matches:  {}", matches);
    }
    if let Some(missing) = stats.aposentados_missing {
        println!("   Retirees missing: {}", missing);
    }
    println!("{}\n", "=".repeat(70));
}

/// Download endpoint
async fn download(
    State(state): State<AppState>,
    Path((job_id, kind)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let artifact = find_artifact(&*state.store.read().await, &job_id, &kind)?;

    let disposition = format!("attachment; filename=\"{}\"", artifact.file_name);
    Ok((
        [
            (header::CONTENT_TYPE, XLSX_MIME.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        artifact.bytes,
    ))
}

fn find_artifact(store: &ExportStore, job_id: &str, kind: &str) -> Result<ExportArtifact, ApiError> {
    let kind: ExportKind = kind.parse().map_err(|e: String| not_found(&e))?;

    store
        .artifact(job_id, kind)
        .cloned()
        .ok_or_else(|| not_found(&format!("No {} result for job {}", kind.as_str(), job_id)))
}

fn bad_request(msg: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(error_response(msg)))
}

fn not_found(msg: &str) -> ApiError {
    (StatusCode::NOT_FOUND, Json(error_response(msg)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::PROCESSING_ERROR_MESSAGE;
    use axum::body::Body;
    use axum::http::Request;
    use axum::response::Response;
    use calamine::{open_workbook_auto_from_rs, Reader};
    use std::io::Cursor;
    use tower::ServiceExt;

    const BOUNDARY: &str = "cpfcheck-test-boundary";

    fn csv(content: &str) -> Upload {
        Upload::new(Some("file.csv".into()), content.as_bytes().to_vec())
    }

    #[test]
    fn test_form_ignores_empty_and_unknown_parts() {
        let mut form = UploadForm::default();
        form.accept("base", csv("CPF\n1\n"));
        form.accept("pensionistas", Upload::new(Some("empty.xlsx".into()), vec![]));
        form.accept("outro", csv("CPF\n2\n"));

        assert!(form.base.is_some());
        assert!(form.pensionistas.is_none());
        assert!(form.aposentados.is_none());
    }

    #[test]
    fn test_form_without_base_is_rejected() {
        let mut form = UploadForm::default();
        form.accept("aposentados", csv("CPF\n1\n"));

        let err = form.compare().unwrap_err();
        assert!(matches!(err, ServerError::BadRequest(_)));
    }

    #[test]
    fn test_form_compare_runs_pipeline() {
        let mut form = UploadForm::default();
        form.accept("base", csv("CPF,Destinatário\n111,PREFEITURA\n222,RGPS\n"));
        form.accept("aposentados", csv("CPF\n111\n333\n"));

        let report = form.compare().unwrap();

        assert!(report.success);
        assert_eq!(report.stats.base_filtered, 1);
        assert_eq!(report.stats.aposentados_missing, Some(1));
        assert!(report.aposentados.is_some());
    }

    #[test]
    fn test_form_compare_garbage_base() {
        let mut form = UploadForm::default();
        form.accept("base", Upload::new(Some("base.xlsx".into()), b"PK\x03\x04junk".to_vec()));
        form.accept("pensionistas", csv("CPF\n1\n"));

        let report = form.compare().unwrap();

        assert!(!report.success);
        assert_eq!(report.message, PROCESSING_ERROR_MESSAGE);
    }

    #[test]
    fn test_find_artifact() {
        let mut store = ExportStore::new();
        store.insert(
            "job",
            vec![ExportArtifact {
                kind: ExportKind::Pensionistas,
                file_name: "Resultado_Pensionistas_2024-01-01.xlsx".into(),
                rows: 1,
                bytes: vec![7],
            }],
        );

        let found = find_artifact(&store, "job", "pensionistas").unwrap();
        assert_eq!(found.bytes, vec![7]);

        let (status, _) = find_artifact(&store, "job", "aposentados").unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = find_artifact(&store, "job", "base").unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = find_artifact(&store, "missing", "pensionistas").unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_router_builds() {
        let _ = router(&AppConfig::default());
    }

    /// (field, file name, content)
    fn compare_request(parts: &[(&str, &str, &str)]) -> Request<Body> {
        let mut body = String::new();
        for (field, file_name, content) in parts {
            body.push_str(&format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: text/csv\r\n\r\n{}\r\n",
                BOUNDARY, field, file_name, content
            ));
        }
        body.push_str(&format!("--{}--\r\n", BOUNDARY));

        Request::builder()
            .method(Method::POST)
            .uri("/api/compare")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn send(state: &AppState, request: Request<Body>) -> Response {
        router_with_state(&AppConfig::default(), state.clone())
            .oneshot(request)
            .await
            .unwrap()
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    async fn body_json(response: Response) -> Value {
        serde_json::from_slice(&body_bytes(response).await).unwrap()
    }

    #[tokio::test]
    async fn test_compare_then_download() {
        let state = AppState::new(4);
        let request = compare_request(&[
            (
                "base",
                "base.csv",
                "CPF,Destinatario,Nome\n111.111.111-11,PREFEITURA,Ana\n222,RGPS,Bia\n",
            ),
            ("pensionistas", "pens.csv", "CPF\n11111111111\n"),
        ]);

        let response = send(&state, request).await;
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["stats"]["baseFiltered"], 1);
        assert_eq!(json["stats"]["pensionistasMatches"], 1);
        assert!(json["downloads"].get("aposentados").is_none());
        assert_eq!(state.store.read().await.len(), 1);

        let url = json["downloads"]["pensionistas"]["url"]
            .as_str()
            .unwrap()
            .to_string();
        let response = send(&state, get_request(&url)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], XLSX_MIME);
        let disposition = response.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .to_string();
        assert!(disposition.starts_with("attachment; filename=\"Resultado_Pensionistas_"));
        assert!(disposition.ends_with(".xlsx\""));

        let bytes = body_bytes(response).await;
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes)).unwrap();
        assert_eq!(workbook.sheet_names(), ["Matches Pensionistas"]);
        let range = workbook.worksheet_range("Matches Pensionistas").unwrap();
        assert_eq!(range.rows().count(), 2);
    }

    #[tokio::test]
    async fn test_failed_comparison_is_ok_without_downloads() {
        let state = AppState::new(4);
        let request = compare_request(&[
            ("base", "base.csv", "Nome,Destinatário\nAna,PREFEITURA\n"),
            ("pensionistas", "pens.csv", "CPF\n111\n"),
        ]);

        let response = send(&state, request).await;
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "Coluna de CPF não encontrada na Base Geral.");
        assert_eq!(json["downloads"], json!({}));
        assert!(state.store.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_compare_without_base_is_bad_request() {
        let state = AppState::new(4);
        let request = compare_request(&[("pensionistas", "pens.csv", "CPF\n111\n")]);

        let response = send(&state, request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["success"], false);
    }

    #[tokio::test]
    async fn test_compare_with_empty_base_part_is_bad_request() {
        let state = AppState::new(4);
        let request = compare_request(&[
            ("base", "base.csv", ""),
            ("aposentados", "apos.csv", "CPF\n111\n"),
        ]);

        let response = send(&state, request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_compare_malformed_multipart_is_bad_request() {
        let state = AppState::new(4);
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/compare")
            .header(header::CONTENT_TYPE, "multipart/form-data")
            .body(Body::from("not a multipart body"))
            .unwrap();

        let response = send(&state, request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_download_unknown_job_or_kind_is_not_found() {
        let state = AppState::new(4);
        state.store.write().await.insert(
            "job-1",
            vec![ExportArtifact {
                kind: ExportKind::Aposentados,
                file_name: "Resultado_Aposentados_Ausentes_2024-01-01.xlsx".into(),
                rows: 0,
                bytes: vec![1],
            }],
        );

        for uri in [
            "/api/download/missing/aposentados",
            "/api/download/job-1/pensionistas",
            "/api/download/job-1/base",
        ] {
            let response = send(&state, get_request(uri)).await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", uri);
            assert_eq!(body_json(response).await["success"], false);
        }

        let response = send(&state, get_request("/api/download/job-1/aposentados")).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health() {
        let response = send(&AppState::new(1), get_request("/health")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }
}
