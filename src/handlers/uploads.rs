use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use super::common;
use crate::errors::ServiceError;
use crate::services::uploads::PaymentProofUpload;
use crate::{ApiResponse, AppState};

/// Accepts a multipart form with a payment proof file plus optional
/// `order_id` and `customer_name` text fields. The file is archived to both
/// blob and file-share storage.
async fn upload_payment_proof(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ServiceError> {
    let mut parts = common::read_upload(multipart).await?;
    let file = parts.file.take().ok_or_else(|| {
        ServiceError::ValidationError("Please select a file to upload".to_string())
    })?;

    let upload = PaymentProofUpload {
        file_name: file.file_name,
        content: file.content,
        order_id: parts.text_value("order_id").map(str::to_string),
        customer_name: parts.text_value("customer_name").map(str::to_string),
    };

    let receipt = state.services.uploads.store_payment_proof(upload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(receipt))))
}

/// Streams a stored payment proof back as an attachment.
async fn download_payment_proof(
    State(state): State<AppState>,
    Path(file_name): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let content = state
        .services
        .uploads
        .download_payment_proof(&file_name)
        .await?;

    let headers = [
        (
            header::CONTENT_TYPE,
            "application/octet-stream".to_string(),
        ),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", file_name),
        ),
    ];
    Ok((headers, content))
}

pub fn upload_routes() -> Router<AppState> {
    Router::new()
        .route("/payment-proof", post(upload_payment_proof))
        .route("/payment-proof/:file_name", get(download_payment_proof))
}
