//! services/api/src/web/reports.rs
//!
//! Axum handlers for the report endpoints: generation, listing, download,
//! deletion, statistics, template inspection, and the health probe.
//! Every handler converts port errors to an HTTP response at this boundary;
//! nothing is retried.

use crate::web::{report_task, state::AppState};
use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::{Datelike, Utc};
use report_core::domain::{GenerateRequest, ReportFilter};
use report_core::ports::PortError;
use serde::Deserialize;
use serde_json::{json, Value};
use std::io::ErrorKind;
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

type HandlerError = (StatusCode, Json<Value>);

fn server_error(message: impl ToString) -> HandlerError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Server Error", "message": message.to_string() })),
    )
}

/// Builds the binary document response with an attachment disposition.
fn docx_response(file_name: &str, bytes: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, DOCX_MIME.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={}", file_name),
            ),
        ],
        bytes,
    )
        .into_response()
}

//=========================================================================================
// Generation
//=========================================================================================

/// POST /generate-word-from-excel
///
/// Multipart form: `data` (a JSON string of tabular fields), `employeeName`,
/// `month`, `year`, `generatedDate`, and an optional `template` file. The
/// uploaded template is accepted and discarded; generation always renders
/// the bundled template.
pub async fn generate_handler(
    State(app_state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Response, HandlerError> {
    let mut request = GenerateRequest {
        year: Utc::now().year(),
        ..Default::default()
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| server_error(format!("Failed to read multipart data: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "data" => {
                let text = field.text().await.map_err(server_error)?;
                request.data = serde_json::from_str(&text)
                    .map_err(|e| server_error(format!("Invalid data payload: {}", e)))?;
            }
            "employeeName" => request.employee_name = field.text().await.map_err(server_error)?,
            "month" => request.month = field.text().await.map_err(server_error)?,
            "year" => {
                let text = field.text().await.map_err(server_error)?;
                // Unparsable years fall back to the current calendar year.
                request.year = text.trim().parse().unwrap_or_else(|_| Utc::now().year());
            }
            "generatedDate" => {
                request.generated_date = field.text().await.map_err(server_error)?
            }
            "template" => {
                // Read and drop; kept for wire compatibility with older clients.
                let _ = field.bytes().await.map_err(server_error)?;
            }
            _ => {}
        }
    }

    match report_task::generate_report(app_state, request).await {
        Ok(generated) => Ok(docx_response(&generated.download_name, generated.bytes)),
        Err(PortError::TemplateNotFound(path)) => {
            error!("Template file not found at {}", path);
            Err((
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": "Template file not found",
                    "message": format!("Please ensure the template exists at {}", path),
                })),
            ))
        }
        Err(PortError::Template(issues)) => {
            error!("Template has formatting issues: {} issue(s)", issues.len());
            Err((
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": "Template Error",
                    "message": "Word template has formatting issues",
                    "details": issues,
                })),
            ))
        }
        Err(e) => {
            error!("Failed to generate document: {}", e);
            Err(server_error(e))
        }
    }
}

//=========================================================================================
// Listing, download, delete, statistics
//=========================================================================================

#[derive(Deserialize, Default)]
pub struct ListReportsQuery {
    #[serde(rename = "employeeName")]
    employee_name: Option<String>,
    month: Option<String>,
    year: Option<String>,
    page: Option<i64>,
    limit: Option<i64>,
}

/// GET /reports
pub async fn list_reports_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<ListReportsQuery>,
) -> Result<Json<Value>, HandlerError> {
    let filter = ReportFilter {
        employee_name: query.employee_name.filter(|s| !s.is_empty()),
        month: query.month.filter(|s| !s.is_empty()),
        // An unparsable year drops the year filter entirely, so the listing
        // falls back to the remaining filters instead of matching nothing.
        year: query.year.and_then(|s| s.parse().ok()),
    };
    let page = app_state
        .reports
        .list(&filter, query.page.unwrap_or(1), query.limit.unwrap_or(20))
        .await
        .map_err(|e| {
            error!("Failed to list reports: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "error": e.to_string() })),
            )
        })?;

    Ok(Json(json!({
        "success": true,
        "count": page.items.len(),
        "total": page.total,
        "page": page.page,
        "totalPages": page.total_pages,
        "reports": page.items,
    })))
}

/// Report ids arrive as path strings; a malformed id surfaces as a 500, the
/// way the store's own cast failure always did.
fn parse_report_id(id: &str) -> Result<Uuid, HandlerError> {
    Uuid::parse_str(id).map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "error": format!("Invalid report id: {}", e) })),
        )
    })
}

fn report_not_found() -> HandlerError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "success": false, "message": "Report not found" })),
    )
}

/// GET /reports/download/{id}
pub async fn download_report_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, HandlerError> {
    let id = parse_report_id(&id)?;
    let report = match app_state.reports.get_by_id(id).await {
        Ok(report) => report,
        Err(PortError::NotFound(_)) => return Err(report_not_found()),
        Err(e) => {
            error!("Failed to load report {}: {}", id, e);
            return Err(server_error(e));
        }
    };

    let bytes = match tokio::fs::read(&report.report_file).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err((
                StatusCode::NOT_FOUND,
                Json(json!({ "success": false, "message": "File not found on server" })),
            ));
        }
        Err(e) => {
            error!("Failed to read {}: {}", report.report_file, e);
            return Err(server_error(e));
        }
    };

    Ok(docx_response(&report.file_name, bytes))
}

/// DELETE /reports/{id}
///
/// Removes the file first (a missing file is tolerated), then the record.
pub async fn delete_report_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, HandlerError> {
    let id = parse_report_id(&id)?;
    let report = match app_state.reports.get_by_id(id).await {
        Ok(report) => report,
        Err(PortError::NotFound(_)) => return Err(report_not_found()),
        Err(e) => return Err(server_error(e)),
    };

    match tokio::fs::remove_file(&report.report_file).await {
        Ok(()) => tracing::info!("Deleted file: {}", report.report_file),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => {
            error!("Failed to delete {}: {}", report.report_file, e);
            return Err(server_error(e));
        }
    }

    match app_state.reports.delete(id).await {
        Ok(()) => Ok(Json(json!({
            "success": true,
            "message": "Report deleted successfully",
        }))),
        Err(PortError::NotFound(_)) => Err(report_not_found()),
        Err(e) => {
            error!("Failed to delete report {}: {}", id, e);
            Err(server_error(e))
        }
    }
}

/// GET /reports/stats
pub async fn stats_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<Value>, HandlerError> {
    let statistics = app_state.reports.statistics().await.map_err(|e| {
        error!("Failed to compute statistics: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "error": e.to_string() })),
        )
    })?;

    Ok(Json(json!({ "success": true, "statistics": statistics })))
}

//=========================================================================================
// Template inspection and health
//=========================================================================================

/// POST /inspect-template
///
/// Validates a template before generation. The uploaded `template` file is
/// held in memory only; when absent, the bundled template is inspected.
/// All failures here are client-visible 400s, diagnostics included.
pub async fn inspect_template_handler(
    State(app_state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<Value>, HandlerError> {
    let inspect_400 = |body: Value| (StatusCode::BAD_REQUEST, Json(body));

    let mut template: Option<Vec<u8>> = None;
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        inspect_400(json!({ "success": false, "error": format!("Failed to read upload: {}", e) }))
    })? {
        if field.name() == Some("template") {
            let bytes = field.bytes().await.map_err(|e| {
                inspect_400(
                    json!({ "success": false, "error": format!("Failed to read upload: {}", e) }),
                )
            })?;
            template = Some(bytes.to_vec());
        }
    }

    let template = match template {
        Some(bytes) => bytes,
        None => tokio::fs::read(&app_state.config.template_path)
            .await
            .map_err(|e| {
                error!("Inspection error: {}", e);
                inspect_400(json!({ "success": false, "error": e.to_string() }))
            })?,
    };

    match app_state.renderer.inspect(&template) {
        Ok(inspection) => Ok(Json(json!({
            "success": true,
            "tags": inspection.tags,
            "preview": inspection.preview,
            "tagCount": inspection.tags.len(),
        }))),
        Err(PortError::Template(issues)) => {
            error!("Inspection error: {} issue(s)", issues.len());
            Err(inspect_400(json!({
                "success": false,
                "error": "Template has formatting issues",
                "details": issues,
            })))
        }
        Err(e) => {
            error!("Inspection error: {}", e);
            Err(inspect_400(json!({ "success": false, "error": e.to_string() })))
        }
    }
}

/// GET /health
pub async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "message": "Report Generator Server is running",
        "database": "connected",
        "endpoints": {
            "generate": "POST /generate-word-from-excel",
            "reports": "GET /reports",
            "download": "GET /reports/download/{id}",
            "delete": "DELETE /reports/{id}",
            "stats": "GET /reports/stats",
            "inspect": "POST /inspect-template",
            "chats": "POST /chats/paginate",
            "health": "GET /health",
        },
    }))
}
