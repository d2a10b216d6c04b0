//! services/api/src/web/report_task.rs
//!
//! The report lifecycle workflow: render the bundled template against the
//! request's data bag, place the file under the per-employee folder scheme,
//! supersede any prior report for the same (employee, month, year) key, and
//! persist the metadata record.

use crate::web::state::AppState;
use chrono::Utc;
use report_core::domain::{
    download_file_name, merge_render_context, month_folder, report_file_name,
    sanitize_employee_name, GenerateRequest, NewReport, Report,
};
use report_core::ports::{PortError, PortResult};
use std::io::ErrorKind;
use std::sync::Arc;
use tracing::{info, warn};

/// What a successful generation hands back to the HTTP layer: the rendered
/// bytes plus enough metadata for a content-disposition filename.
#[derive(Debug)]
pub struct GeneratedReport {
    pub bytes: Vec<u8>,
    pub report: Report,
    pub download_name: String,
}

/// Runs one end-to-end generation request.
///
/// The supersede-file-then-insert-record sequence is not transactional;
/// concurrent requests for the same key can interleave at any await point.
/// The superseded report's database record is intentionally left in place:
/// only its file is removed, so repeated regenerations across calendar days
/// accumulate records that all answer to the same key.
pub async fn generate_report(
    app_state: Arc<AppState>,
    request: GenerateRequest,
) -> PortResult<GeneratedReport> {
    let template_path = &app_state.config.template_path;
    let template = match tokio::fs::read(template_path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(PortError::TemplateNotFound(
                template_path.display().to_string(),
            ));
        }
        Err(e) => return Err(PortError::Unexpected(e.to_string())),
    };

    let ctx = merge_render_context(&request);
    let bytes = app_state.renderer.render(&template, &ctx)?;

    // Folder scheme: uploads/<Employee_Name>/<Month_Year>/. Creation is
    // idempotent.
    let sanitized = sanitize_employee_name(&request.employee_name);
    let destination = app_state
        .config
        .upload_dir
        .join(&sanitized)
        .join(month_folder(&request.month, request.year));
    tokio::fs::create_dir_all(&destination)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

    if let Some(existing) = app_state
        .reports
        .find_by_key(&request.employee_name, &request.month, request.year)
        .await?
    {
        match tokio::fs::remove_file(&existing.report_file).await {
            Ok(()) => info!("Deleted superseded file: {}", existing.report_file),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(
                    "Superseded file already missing: {}",
                    existing.report_file
                );
            }
            Err(e) => return Err(PortError::Unexpected(e.to_string())),
        }
    }

    let file_name = report_file_name(
        &sanitized,
        &request.month,
        request.year,
        Utc::now().date_naive(),
    );
    let file_path = destination.join(&file_name);
    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
    info!("Document saved: {}", file_path.display());

    // Size is taken from the file on disk, not the in-memory buffer, so the
    // record reflects what was actually persisted.
    let file_size = tokio::fs::metadata(&file_path)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?
        .len() as i64;

    let report = app_state
        .reports
        .insert(NewReport {
            employee_name: request.employee_name.clone(),
            month: request.month.clone(),
            year: request.year,
            report_file: file_path.to_string_lossy().into_owned(),
            file_name,
            file_size: Some(file_size),
        })
        .await?;
    info!("Report saved to database: {}", report.id);

    Ok(GeneratedReport {
        bytes,
        download_name: download_file_name(&sanitized, &request.month, request.year),
        report,
    })
}
