//! Local blob storage.

use super::blob_path;
use crate::app::AppState;
use crate::error::{RequestError, RequestResult};
use axum::body::Body;
use axum::extract::{Multipart, Path, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use blob_store::{BlobMetadata, DeleteOutcome};

pub const HASH_HEADER: &str = "dx-hash";
pub const SIZE_HEADER: &str = "dx-size";
pub const LAST_UPDATE_HEADER: &str = "dx-last-update";

fn metadata_headers(metadata: &BlobMetadata) -> RequestResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    let hash = HeaderValue::from_str(&metadata.hash)
        .map_err(|_| RequestError::internal("Invalid blob"))?;
    headers.insert(HeaderName::from_static(HASH_HEADER), hash);
    headers.insert(HeaderName::from_static(SIZE_HEADER), HeaderValue::from(metadata.size));
    headers.insert(
        HeaderName::from_static(LAST_UPDATE_HEADER),
        HeaderValue::from(metadata.last_update),
    );
    Ok(headers)
}

pub async fn head_blob(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> RequestResult<Response> {
    let metadata = state.blobs.retrieve_metadata(&blob_path(&path)).await?;
    Ok((StatusCode::NO_CONTENT, metadata_headers(&metadata)?).into_response())
}

pub async fn get_blob(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> RequestResult<Response> {
    let path = blob_path(&path);
    let metadata = state.blobs.retrieve_metadata(&path).await?;
    let content = state.blobs.retrieve(&path).await?;
    Ok((metadata_headers(&metadata)?, Body::from_stream(content)).into_response())
}

/// Store the first file part of a multipart upload.
pub async fn put_blob(
    State(state): State<AppState>,
    Path(path): Path<String>,
    mut multipart: Multipart,
) -> RequestResult<Json<BlobMetadata>> {
    let path = blob_path(&path);
    blob_store::validate_blob_path(&path)?;

    while let Some(field) = multipart.next_field().await? {
        if field.file_name().is_none() && field.name() != Some("blob") {
            continue;
        }
        let metadata = state.blobs.store(&path, Box::pin(field)).await?;
        return Ok(Json(metadata));
    }
    Err(RequestError::bad_request("Missing blob"))
}

pub async fn delete_blob(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> RequestResult<StatusCode> {
    let path = blob_path(&path);
    match state.blobs.delete(&path).await? {
        DeleteOutcome::Deleted { .. } => Ok(StatusCode::NO_CONTENT),
        DeleteOutcome::NothingToDelete => Err(RequestError::not_found("Blob not found")),
    }
}
