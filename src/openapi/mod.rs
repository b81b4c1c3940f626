use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront API",
        version = "1.0.0",
        description = r#"
# Storefront Management API

An API for running a small web store: product catalog, customer records,
order placement, payment proof uploads, and a landing-page dashboard.

## Features

- **Product Management**: Catalog CRUD with image uploads and price quotes
- **Customer Management**: Customer records with shipping details
- **Order Placement**: Stock-checked ordering with optimistic concurrency
- **Payment Proofs**: Uploaded receipts archived to blob and file-share storage
- **Notifications**: Order and stock events queued for downstream consumers

## Error Handling

The API uses consistent error response formats with appropriate HTTP status codes:

```json
{
  "error": "Not Found",
  "message": "Product abc not found",
  "timestamp": "2024-01-01T00:00:00Z"
}
```

Conflicting writes are rejected with `409` when a stale version token is
supplied; retry with the version from a fresh read.
        "#
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Orders", description = "Order placement and management endpoints")
    ),
    paths(
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::create_order,
        crate::handlers::orders::update_order,
        crate::handlers::orders::update_order_status,
    ),
    components(
        schemas(
            crate::ApiResponse<serde_json::Value>,

            crate::services::orders::OrderResponse,
            crate::services::orders::CreateOrderRequest,
            crate::services::orders::UpdateOrderRequest,
            crate::services::orders::UpdateOrderStatusRequest,

            crate::storage::ReadinessReport,

            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
