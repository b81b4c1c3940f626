use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::errors::ServiceError;
use crate::{ApiResponse, AppState};

#[derive(Debug, Serialize)]
struct QueueReceiveResponse {
    queue: String,
    message: serde_json::Value,
}

async fn dashboard_summary(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ServiceError> {
    let summary = state.services.dashboard.summary().await?;
    Ok(Json(ApiResponse::success(summary)))
}

/// Provisions every table, container, queue, and share the store uses.
/// Safe to call repeatedly.
async fn init_storage(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    let report = state.services.dashboard.init_storage().await?;
    Ok(Json(ApiResponse::success(report)))
}

/// Pops one message off a store queue, mainly for demos and debugging.
/// Replies 204 when the queue is empty.
async fn receive_queue_message(
    State(state): State<AppState>,
    Path(queue): Path<String>,
) -> Result<Response, ServiceError> {
    let message = state.services.dashboard.receive_queue_message(&queue).await?;
    match message {
        Some(message) => Ok(Json(ApiResponse::success(QueueReceiveResponse {
            queue,
            message,
        }))
        .into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

pub fn dashboard_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(dashboard_summary))
        .route("/storage/init", post(init_storage))
        .route("/queues/:queue/receive", post(receive_queue_message))
}
