use api_state::ApiState;
use axum::{
    extract::{DefaultBodyLimit, FromRef},
    middleware::from_fn_with_state,
    routing::{delete, get, post, put},
    Router,
};
use middleware_api_auth::api_auth;
use routes::{
    chat::{chat, chat_history},
    documents::{delete_document, process_document, MAX_DOCUMENT_BYTES},
    health::{live, ready},
    profile::{get_profile, update_profile},
    projects::{create_project, delete_project, update_project},
};

pub mod api_state;
pub mod conversation;
pub mod error;
mod middleware_api_auth;
mod routes;

/// Multipart overhead allowed on top of the document itself.
const MULTIPART_OVERHEAD_BYTES: usize = 1_000_000;

/// Router for the chat service API
pub fn api_routes<S>(app_state: &ApiState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    ApiState: FromRef<S>,
{
    let document_body_limit = usize::try_from(MAX_DOCUMENT_BYTES)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    // Public endpoints: probes and the visitor-facing chat
    let public = Router::new()
        .route("/ready", get(ready))
        .route("/live", get(live))
        .route("/chat", post(chat))
        .route("/chat/history", get(chat_history));

    // Owner endpoints (require an API key)
    let protected = Router::new()
        .route("/profile", get(get_profile).put(update_profile))
        .route("/profile/projects", post(create_project))
        .route(
            "/profile/projects/{id}",
            put(update_project).delete(delete_project),
        )
        .route(
            "/documents/process",
            post(process_document).layer(DefaultBodyLimit::max(document_body_limit)),
        )
        .route("/documents/{id}", delete(delete_document))
        .route_layer(from_fn_with_state(app_state.clone(), api_auth));

    public.merge(protected)
}
