use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use common::storage::types::{
    owner::Owner,
    project::{Project, ProjectInput},
};
use tracing::warn;

use crate::{api_state::ApiState, error::ApiError};

/// Rebuilds the owner's project partition. Indexing problems never fail the request.
async fn reindex_projects(state: &ApiState, owner_id: &str) {
    match Project::list_for_owner(owner_id, &state.db).await {
        Ok(projects) => {
            state.indexer.index_projects(&projects, owner_id).await;
        }
        Err(err) => {
            warn!(owner_id = %owner_id, error = %err, "could not list projects for reindexing");
        }
    }
}

pub async fn create_project(
    State(state): State<ApiState>,
    Extension(owner): Extension<Owner>,
    Json(input): Json<ProjectInput>,
) -> Result<impl IntoResponse, ApiError> {
    let project = Project::create(&owner.id, input, &state.db).await?;
    reindex_projects(&state, &owner.id).await;

    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn update_project(
    State(state): State<ApiState>,
    Extension(owner): Extension<Owner>,
    Path(id): Path<String>,
    Json(input): Json<ProjectInput>,
) -> Result<impl IntoResponse, ApiError> {
    let project = Project::update(&id, &owner.id, input, &state.db).await?;
    reindex_projects(&state, &owner.id).await;

    Ok(Json(project))
}

pub async fn delete_project(
    State(state): State<ApiState>,
    Extension(owner): Extension<Owner>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Project::delete(&id, &owner.id, &state.db).await?;
    reindex_projects(&state, &owner.id).await;

    Ok(StatusCode::NO_CONTENT)
}
