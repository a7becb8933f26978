use crate::AppState;
use crate::api::error::AppError;
use crate::services::dicom::MetadataResult;
use crate::utils::validation::parse_metadata_request;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use bytes::Bytes;
use tracing::info;

#[utoipa::path(
    post,
    path = "/api/dicom-metadata",
    request_body = crate::models::MetadataRequest,
    responses(
        (status = 200, description = "Metadata of the DICOM object", body = MetadataResult),
        (status = 400, description = "Invalid request body", body = crate::models::ErrorResponse),
        (
            status = 500,
            description = "Download or parsing failed",
            body = crate::models::ErrorResponse
        )
    ),
    tag = "dicom"
)]
pub async fn get_dicom_metadata(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<MetadataResult>, AppError> {
    let request =
        parse_metadata_request(&body).map_err(|e| AppError::BadRequest(e.to_string()))?;

    info!("🔍 Extracting metadata for {}", request.file_path);
    let metadata = state.extraction.extract(&request.file_path).await?;

    Ok(Json(metadata))
}

#[utoipa::path(
    options,
    path = "/api/dicom-metadata",
    responses(
        (status = 200, description = "Empty preflight response")
    ),
    tag = "dicom"
)]
pub async fn dicom_metadata_options() -> impl IntoResponse {
    StatusCode::OK
}
