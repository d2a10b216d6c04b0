//! services/api/src/web/chats.rs
//!
//! The chat pagination endpoint, mounted separately under /chats. A
//! "load more" surface: the client posts the record identities it already
//! holds and receives the next oldest batch.

use crate::web::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

const PAGE_SIZE: i64 = 5;

fn default_per_page() -> i64 {
    PAGE_SIZE
}

#[derive(Deserialize)]
pub struct PaginateChatsRequest {
    #[serde(default, rename = "excludeIds")]
    exclude_ids: Vec<String>,
    #[serde(default = "default_per_page")]
    per_page: i64,
    #[serde(default)]
    search: String,
}

fn chat_server_error(e: impl ToString) -> (StatusCode, Json<Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "message": "Server Error", "error": e.to_string() })),
    )
}

/// POST /chats/paginate
pub async fn paginate_chats_handler(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<PaginateChatsRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    // A malformed identity fails the whole request, the way the store's own
    // cast failure always did.
    let exclude_ids = request
        .exclude_ids
        .iter()
        .map(|id| Uuid::parse_str(id))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| {
            error!("Error Fetch Chat List: {}", e);
            chat_server_error(format!("Invalid chat id: {}", e))
        })?;

    let page = app_state
        .chats
        .paginate(&exclude_ids, request.per_page, &request.search)
        .await
        .map_err(|e| {
            error!("Error Fetch Chat List: {}", e);
            chat_server_error(e)
        })?;

    Ok(Json(json!({
        "data": page.data,
        "totalInDB": page.total_in_db,
        "totalMatching": page.total_matching,
        "hasMore": page.has_more,
    })))
}
