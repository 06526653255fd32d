use super::state::ApiState;
use crate::query::ConversationTurn;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Deserialize)]
pub(super) struct ChatRequest {
    message: String,
    #[serde(default)]
    history: Vec<ConversationTurn>,
}

#[derive(Serialize)]
pub(super) struct ChatResponse {
    answer: String,
}

#[derive(Serialize)]
pub(super) struct ChatError {
    error: String,
}

pub(super) async fn chat(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, Json<ChatError>)> {
    if request.message.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ChatError {
                error: "message must not be empty".into(),
            }),
        ));
    }

    match state
        .pipeline
        .respond(&request.message, &request.history)
        .await
    {
        Ok(answer) => Ok(Json(ChatResponse { answer })),
        Err(error) => {
            tracing::warn!(%error, "chat request failed");
            Err((
                StatusCode::BAD_GATEWAY,
                Json(ChatError {
                    error: error.to_string(),
                }),
            ))
        }
    }
}
