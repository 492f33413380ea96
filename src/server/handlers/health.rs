use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::state::AppState;

/// Readiness probe for the chat widget. The `chromadb_ready` field name is
/// part of the published client contract and reflects whether the vector
/// index is loaded and non-empty.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let index_ready = match state.index.count().await {
        Ok(count) => count > 0,
        Err(_) => false,
    };

    Json(json!({
        "status": "ok",
        "chromadb_ready": index_ready
    }))
}
