use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use axum_typed_multipart::{FieldData, TryFromMultipart, TypedMultipart};
use common::{
    error::AppError,
    storage::types::{document::Document, owner::Owner},
};
use ingestion_pipeline::utils::file_text_extraction::{extract_text, DocumentKind};
use serde_json::json;
use tempfile::NamedTempFile;
use tracing::info;

use crate::{api_state::ApiState, error::ApiError};

/// Largest accepted upload, in bytes.
pub const MAX_DOCUMENT_BYTES: u64 = 20_000_000;

#[derive(Debug, TryFromMultipart)]
pub struct DocumentUpload {
    #[form_data(limit = "20000000")]
    pub file: FieldData<NamedTempFile>,
    pub title: String,
    pub description: Option<String>,
    pub owner_id: String,
}

pub async fn process_document(
    State(state): State<ApiState>,
    Extension(owner): Extension<Owner>,
    TypedMultipart(input): TypedMultipart<DocumentUpload>,
) -> Result<impl IntoResponse, ApiError> {
    if input.owner_id != owner.id {
        return Err(ApiError::Forbidden(
            "Documents can only be uploaded to your own profile".to_string(),
        ));
    }
    if input.title.trim().is_empty() {
        return Err(ApiError::ValidationError("Document title is required".to_string()));
    }

    let file_name = input.file.metadata.file_name.clone().unwrap_or_default();
    let kind = DocumentKind::detect(&file_name, input.file.metadata.content_type.as_deref())
        .ok_or_else(|| {
            ApiError::ValidationError("Only PDF and plain text documents are supported".to_string())
        })?;

    let size = input
        .file
        .contents
        .as_file()
        .metadata()
        .map_err(AppError::from)?
        .len();
    if size == 0 {
        return Err(ApiError::ValidationError("Uploaded file is empty".to_string()));
    }
    if size > MAX_DOCUMENT_BYTES {
        return Err(ApiError::PayloadTooLarge(format!(
            "Documents are limited to {MAX_DOCUMENT_BYTES} bytes"
        )));
    }

    let bytes = tokio::fs::read(input.file.contents.path())
        .await
        .map_err(AppError::from)?;
    let text = extract_text(kind, bytes).await?;
    let extracted_chars = text.chars().count();

    let document = Document::new(
        owner.id.clone(),
        input.title.trim().to_string(),
        input.description,
        file_name,
        text,
    );
    let document = state
        .db
        .store_item(document)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| ApiError::InternalError("Internal server error".to_string()))?;

    let indexed = state.indexer.index_document(&document, &owner.id).await;

    info!(
        owner_id = %owner.id,
        document_id = %document.id,
        ?kind,
        extracted_chars,
        indexed,
        "document processed"
    );

    Ok((
        StatusCode::OK,
        Json(json!({
            "status": "success",
            "document_id": document.id,
            "extracted_chars": extracted_chars,
            "vector_db_indexed": indexed,
        })),
    ))
}

pub async fn delete_document(
    State(state): State<ApiState>,
    Extension(owner): Extension<Owner>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let document = Document::get_owned(&id, &owner.id, &state.db).await?;
    state
        .db
        .delete_item::<Document>(&document.id)
        .await
        .map_err(AppError::from)?;
    state.indexer.remove_document(&document.id, &owner.id).await;

    Ok(StatusCode::NO_CONTENT)
}
