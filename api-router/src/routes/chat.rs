use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use common::storage::types::chat_exchange::HistoryFilter;
use serde::Deserialize;
use serde_json::json;

use crate::{api_state::ApiState, conversation::ChatRequest, error::ApiError};

const DEFAULT_HISTORY_LIMIT: usize = 50;
const MAX_HISTORY_LIMIT: usize = 500;

pub async fn chat(
    State(state): State<ApiState>,
    Json(request): Json<ChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let reply = state.conversation.handle(request).await?;
    Ok(Json(reply))
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub visitor_id: Option<String>,
    pub chatbot_id: Option<String>,
    pub target_user_id: Option<String>,
    pub limit: Option<usize>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

pub async fn chat_history(
    State(state): State<ApiState>,
    Query(params): Query<HistoryParams>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = HistoryFilter {
        visitor_id: non_blank(params.visitor_id),
        chatbot_id: non_blank(params.chatbot_id),
        owner_id: non_blank(params.target_user_id),
    };
    let limit = params
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .min(MAX_HISTORY_LIMIT);

    let history = state.conversation.history(&filter, limit).await;

    Ok(Json(json!({
        "count": history.len(),
        "history": history,
    })))
}
