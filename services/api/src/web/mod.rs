pub mod chats;
pub mod report_task;
pub mod reports;
pub mod state;

pub use state::AppState;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir};

/// Assembles the application router. Lives here (rather than in the binary)
/// so integration tests can drive the full surface in-process.
pub fn api_router(app_state: Arc<AppState>) -> Router {
    let upload_root = app_state.config.upload_dir.clone();

    Router::new()
        .route("/generate-word-from-excel", post(reports::generate_handler))
        .route("/reports", get(reports::list_reports_handler))
        .route(
            "/reports/download/{id}",
            get(reports::download_report_handler),
        )
        .route("/reports/{id}", delete(reports::delete_report_handler))
        .route("/reports/stats", get(reports::stats_handler))
        .route("/inspect-template", post(reports::inspect_template_handler))
        .route("/health", get(reports::health_handler))
        .route("/chats/paginate", post(chats::paginate_chats_handler))
        // Generated documents are browsable read-only under /uploads.
        .nest_service("/uploads", ServeDir::new(upload_root))
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}
