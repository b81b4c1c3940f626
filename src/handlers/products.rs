use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;

use super::common;
use crate::errors::ServiceError;
use crate::services::products::{CreateProductRequest, UpdateProductRequest};
use crate::{ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub struct QuoteParams {
    #[serde(default = "default_quote_quantity")]
    pub quantity: i32,
}

fn default_quote_quantity() -> i32 {
    1
}

async fn list_products(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    let products = state.services.products.list_products().await?;
    Ok(Json(ApiResponse::success(products)))
}

async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let product = state
        .services
        .products
        .get_product(&id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", id)))?;
    Ok(Json(ApiResponse::success(product)))
}

async fn create_product(
    State(state): State<AppState>,
    Json(request): Json<CreateProductRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let product = state.services.products.create_product(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(product))))
}

async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateProductRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let product = state
        .services
        .products
        .update_product(&id, request)
        .await?;
    Ok(Json(ApiResponse::success(product)))
}

async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.products.delete_product(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Accepts a multipart form with one image file part and stores it as the
/// product's picture.
async fn upload_product_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ServiceError> {
    let mut parts = common::read_upload(multipart).await?;
    let file = parts.file.take().ok_or_else(|| {
        ServiceError::ValidationError("Please select an image file to upload".to_string())
    })?;

    let product = state
        .services
        .products
        .upload_product_image(&id, &file.file_name, file.content)
        .await?;
    Ok(Json(ApiResponse::success(product)))
}

async fn price_quote(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<QuoteParams>,
) -> Result<impl IntoResponse, ServiceError> {
    let quote = state
        .services
        .products
        .price_quote(&id, params.quantity)
        .await?;
    Ok(Json(ApiResponse::success(quote)))
}

pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products))
        .route("/", post(create_product))
        .route("/:id", get(get_product))
        .route("/:id", put(update_product))
        .route("/:id", delete(delete_product))
        .route("/:id/image", post(upload_product_image))
        .route("/:id/quote", get(price_quote))
}
