use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::api_state::ApiState;

/// Liveness probe: 200 while the process is serving.
pub async fn live() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status": "ok"})))
}

/// Readiness probe: 200 when the row store answers, else 503. The content index is reported
/// but does not gate readiness since chat degrades without it.
pub async fn ready(State(state): State<ApiState>) -> impl IntoResponse {
    let content_index = match state.indexer.store().count(None).await {
        Ok(units) => json!({ "status": "ok", "units": units }),
        Err(e) => json!({ "status": "fail", "reason": e.to_string() }),
    };

    match state.db.client.query("RETURN true").await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "checks": { "db": "ok", "content_index": content_index }
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "error",
                "checks": { "db": "fail", "content_index": content_index },
                "reason": e.to_string()
            })),
        ),
    }
}
