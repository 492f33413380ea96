use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::core::errors::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequestBody {
    pub message: String,
    pub session_id: Option<String>,
}

/// `POST /api/chat`: one question in, one grounded (or handed-off) answer
/// out. A missing session id gets a server-generated one so the client can
/// correlate follow-ups.
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ChatRequestBody>,
) -> Result<impl IntoResponse, ApiError> {
    let session_id = payload
        .session_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let response = state
        .pipeline
        .answer_query(&payload.message, session_id, None)
        .await?;

    tracing::info!(
        needs_human = response.needs_human,
        num_docs = response.num_docs,
        "chat answered"
    );

    Ok(Json(response))
}
