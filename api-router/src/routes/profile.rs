use axum::{extract::State, response::IntoResponse, Extension, Json};
use common::storage::types::{
    owner::Owner,
    profile::{Profile, ProfileUpdate},
    project::Project,
};
use serde_json::json;
use tracing::info;

use crate::{api_state::ApiState, error::ApiError};

/// The owner's profile as the assistant sees it (stored values merged with defaults), plus
/// their projects.
pub async fn get_profile(
    State(state): State<ApiState>,
    Extension(owner): Extension<Owner>,
) -> Result<impl IntoResponse, ApiError> {
    let stored = Profile::get_for_owner(&owner.id, &state.db).await?;
    let profile = Profile::merged(stored.as_ref(), &owner.id, &state.config.profile_defaults);
    let projects = Project::list_for_owner(&owner.id, &state.db).await?;

    Ok(Json(json!({
        "profile": profile,
        "projects": projects,
    })))
}

pub async fn update_profile(
    State(state): State<ApiState>,
    Extension(owner): Extension<Owner>,
    Json(update): Json<ProfileUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = Profile::upsert_for_owner(&owner.id, update, &state.db).await?;
    let indexed = state.indexer.index_profile(&profile, &owner.id).await;

    info!(owner_id = %owner.id, indexed, "profile updated");

    Ok(Json(json!({
        "profile": profile,
        "vector_db_indexed": indexed,
    })))
}
