mod common;

use axum::http::{header, Method, StatusCode};
use rust_decimal_macros::dec;
use serde_json::json;
use storefront_api::{
    events::outbox,
    services::orders::CreateOrderRequest,
};
use uuid::Uuid;

use common::{multipart_body, read_bytes, read_json, TestApp};

#[tokio::test]
async fn product_crud_round_trip() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/products",
            Some(json!({
                "product_name": "Gadget",
                "description": "A desk gadget",
                "price": "12.50",
                "stock_available": 4
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json(response).await;
    assert!(body["success"].as_bool().unwrap_or(false));
    let product_id = body["data"]["id"].as_str().expect("product id").to_string();
    let first_version = body["data"]["version"].as_str().expect("version").to_string();
    assert_eq!(body["data"]["product_name"], "Gadget");
    assert_eq!(body["data"]["price"], "12.50");
    assert_eq!(body["data"]["stock_available"], 4);
    assert!(!first_version.is_empty());

    let response = app.request(Method::GET, "/api/v1/products", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["data"].as_array().map(|a| a.len()), Some(1));

    let uri = format!("/api/v1/products/{}", product_id);
    let response = app
        .request(Method::PUT, &uri, Some(json!({ "price": "15.00" })))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["data"]["price"], "15.00");
    assert_ne!(body["data"]["version"], first_version.as_str());

    let response = app.request(Method::DELETE, &uri, None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.request(Method::GET, &uri, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = read_json(response).await;
    assert_eq!(body["error"], "Not Found");
    assert!(body["message"]
        .as_str()
        .unwrap_or_default()
        .contains("not found"));
}

#[tokio::test]
async fn product_validation_rejects_bad_input() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/products",
            Some(json!({ "product_name": "Cheap", "price": "-1.00" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert!(body["message"]
        .as_str()
        .unwrap_or_default()
        .contains("Price must be greater than $0.00"));

    let response = app
        .request(
            Method::POST,
            "/api/v1/products",
            Some(json!({ "product_name": "Backorder", "price": "2.00", "stock_available": -3 })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert!(body["message"]
        .as_str()
        .unwrap_or_default()
        .contains("Stock available cannot be negative"));

    let response = app
        .request(
            Method::POST,
            "/api/v1/products",
            Some(json!({ "product_name": "", "price": "2.00" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert!(body["message"]
        .as_str()
        .unwrap_or_default()
        .contains("Product name is required"));
}

#[tokio::test]
async fn price_quotes_follow_stock() {
    let app = TestApp::new().await;
    let product = app.seed_product("Widget", dec!(4.00), 5).await;

    let uri = format!("/api/v1/products/{}/quote?quantity=3", product.id);
    let response = app.request(Method::GET, &uri, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["data"]["quantity"], 3);
    assert_eq!(body["data"]["total_price"], "12.00");
    assert_eq!(body["data"]["in_stock"], true);

    let uri = format!("/api/v1/products/{}/quote?quantity=9", product.id);
    let body = read_json(app.request(Method::GET, &uri, None).await).await;
    assert_eq!(body["data"]["in_stock"], false);

    // Quantity defaults to one.
    let uri = format!("/api/v1/products/{}/quote", product.id);
    let body = read_json(app.request(Method::GET, &uri, None).await).await;
    assert_eq!(body["data"]["quantity"], 1);
    assert_eq!(body["data"]["total_price"], "4.00");

    let uri = format!("/api/v1/products/{}/quote?quantity=0", product.id);
    let response = app.request(Method::GET, &uri, None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let uri = format!("/api/v1/products/{}/quote", Uuid::new_v4());
    let response = app.request(Method::GET, &uri, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn customer_crud_round_trip() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/customers",
            Some(json!({
                "username": "alice",
                "first_name": "Alice",
                "surname": "Smith",
                "email": "alice@example.com",
                "shipping_address": "12 High Street"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json(response).await;
    let customer_id = body["data"]["id"].as_str().expect("customer id").to_string();
    assert_eq!(body["data"]["display_name"], "Alice Smith");

    let uri = format!("/api/v1/customers/{}", customer_id);
    let response = app
        .request(Method::PUT, &uri, Some(json!({ "surname": "Jones" })))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["data"]["display_name"], "Alice Jones");

    let response = app.request(Method::DELETE, &uri, None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.request(Method::GET, &uri, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Deleting the already-removed customer reports 404 rather than succeeding.
    let response = app.request(Method::DELETE, &uri, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn customer_email_is_validated() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/customers",
            Some(json!({
                "username": "bob",
                "first_name": "Bob",
                "surname": "Brown",
                "email": "not-an-email"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert!(body["message"]
        .as_str()
        .unwrap_or_default()
        .contains("Email address is invalid"));
}

#[tokio::test]
async fn order_endpoints_cover_the_lifecycle() {
    let app = TestApp::new().await;
    let customer = app.seed_customer("alice").await;
    let product = app.seed_product("Widget", dec!(9.99), 10).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "customer_id": customer.id,
                "product_id": product.id,
                "quantity": 2
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json(response).await;
    assert!(body["success"].as_bool().unwrap_or(false));
    let order_id = body["data"]["id"].as_str().expect("order id").to_string();
    assert_eq!(body["data"]["username"], "alice");
    assert_eq!(body["data"]["product_name"], "Widget");
    assert_eq!(body["data"]["total_price"], "19.98");
    assert_eq!(body["data"]["status"], "Submitted");

    let response = app.request(Method::GET, "/api/v1/orders", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["data"].as_array().map(|a| a.len()), Some(1));

    let uri = format!("/api/v1/orders/{}", order_id);
    let response = app
        .request(Method::PUT, &uri, Some(json!({ "quantity": 3 })))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["data"]["quantity"], 3);
    assert_eq!(body["data"]["total_price"], "29.97");

    let status_uri = format!("/api/v1/orders/{}/status", order_id);
    let response = app
        .request(Method::PUT, &status_uri, Some(json!({ "status": "Shipped" })))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["data"]["status"], "Shipped");

    let response = app.request(Method::DELETE, &uri, None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.request(Method::GET, &uri, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn order_creation_is_validated_over_http() {
    let app = TestApp::new().await;

    // Validator failures come back as a field-by-field error list.
    let response = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "customer_id": "c1",
                "product_id": "p1",
                "quantity": 0
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Validation failed");
    let errors = body["errors"].to_string();
    assert!(errors.contains("Quantity must be at least 1"));

    // References must resolve to stored records.
    let response = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "customer_id": Uuid::new_v4().to_string(),
                "product_id": Uuid::new_v4().to_string(),
                "quantity": 1
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert!(body["message"]
        .as_str()
        .unwrap_or_default()
        .contains("Please select a valid customer and product"));

    // Stock shortfalls are a semantic rejection, not a bad request.
    let customer = app.seed_customer("carol").await;
    let product = app.seed_product("Rare Widget", dec!(4.50), 1).await;
    let response = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "customer_id": customer.id,
                "product_id": product.id,
                "quantity": 5
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = read_json(response).await;
    assert!(body["message"]
        .as_str()
        .unwrap_or_default()
        .contains("Insufficient stock"));
}

#[tokio::test]
async fn payment_proof_round_trip() {
    let app = TestApp::new().await;

    let body = multipart_body(
        &[("order_id", "ord-123"), ("customer_name", "Alice Smith")],
        Some(("file", "receipt.pdf", b"PDFDATA".as_slice())),
    );
    let response = app
        .request_multipart("/api/v1/uploads/payment-proof", body)
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json(response).await;
    let stored_name = body["data"]["file_name"]
        .as_str()
        .expect("stored file name")
        .to_string();
    assert!(stored_name.ends_with("_receipt.pdf"));
    assert_ne!(stored_name, "receipt.pdf");
    assert_eq!(body["data"]["share_location"], "contracts/payments");
    assert_eq!(body["data"]["order_id"], "ord-123");
    assert_eq!(body["data"]["customer_name"], "Alice Smith");

    let uri = format!("/api/v1/uploads/payment-proof/{}", stored_name);
    let response = app.request(Method::GET, &uri, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok()),
        Some("application/octet-stream")
    );
    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(disposition.contains(&stored_name));
    let content = read_bytes(response).await;
    assert_eq!(content.as_ref(), b"PDFDATA".as_slice());

    let response = app
        .request(
            Method::GET,
            "/api/v1/uploads/payment-proof/20000101_000000_nothing.pdf",
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn payment_proof_requires_a_file_part() {
    let app = TestApp::new().await;

    let body = multipart_body(&[("order_id", "ord-456")], None);
    let response = app
        .request_multipart("/api/v1/uploads/payment-proof", body)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert!(body["message"]
        .as_str()
        .unwrap_or_default()
        .contains("Please select a file to upload"));
}

#[tokio::test]
async fn product_image_upload_sets_the_image_url() {
    let app = TestApp::new().await;
    let product = app.seed_product("Widget", dec!(9.99), 10).await;
    let uri = format!("/api/v1/products/{}/image", product.id);

    let body = multipart_body(&[], Some(("file", "photo.png", b"\x89PNGdata".as_slice())));
    let response = app.request_multipart(&uri, body).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    let first_url = body["data"]["image_url"]
        .as_str()
        .expect("image url")
        .to_string();
    assert!(first_url.contains("product-images/"));
    assert!(first_url.ends_with(".png"));

    // A second upload replaces the recorded URI.
    let body = multipart_body(&[], Some(("file", "photo.jpg", b"JPEGdata".as_slice())));
    let response = app.request_multipart(&uri, body).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    let second_url = body["data"]["image_url"]
        .as_str()
        .expect("image url")
        .to_string();
    assert!(second_url.ends_with(".jpg"));
    assert_ne!(second_url, first_url);

    let fetch_uri = format!("/api/v1/products/{}", product.id);
    let body = read_json(app.request(Method::GET, &fetch_uri, None).await).await;
    assert_eq!(body["data"]["image_url"], second_url.as_str());

    let body = multipart_body(&[], None);
    let response = app.request_multipart(&uri, body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let missing_uri = format!("/api/v1/products/{}/image", Uuid::new_v4());
    let body = multipart_body(&[], Some(("file", "photo.png", b"data".as_slice())));
    let response = app.request_multipart(&missing_uri, body).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn dashboard_reflects_store_contents() {
    let app = TestApp::new().await;

    let body = read_json(app.request(Method::GET, "/api/v1/dashboard", None).await).await;
    assert_eq!(body["data"]["product_count"], 0);
    assert_eq!(body["data"]["customer_count"], 0);
    assert_eq!(body["data"]["order_count"], 0);

    let customer = app.seed_customer("dana").await;
    let product = app.seed_product("Widget", dec!(9.99), 10).await;
    app.seed_product("Gizmo", dec!(3.25), 2).await;
    app.state
        .services
        .orders
        .create_order(CreateOrderRequest {
            customer_id: customer.id.clone(),
            product_id: product.id.clone(),
            quantity: 1,
            order_date: None,
        })
        .await
        .expect("create order");

    let body = read_json(app.request(Method::GET, "/api/v1/dashboard", None).await).await;
    assert_eq!(body["data"]["product_count"], 2);
    assert_eq!(body["data"]["customer_count"], 1);
    assert_eq!(body["data"]["order_count"], 1);
    assert_eq!(
        body["data"]["featured_products"].as_array().map(|a| a.len()),
        Some(2)
    );
}

#[tokio::test]
async fn storage_init_reports_provisioned_resources() {
    let app = TestApp::new().await;

    let response = app
        .request(Method::POST, "/api/v1/dashboard/storage/init", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    let tables: Vec<&str> = body["data"]["tables"]
        .as_array()
        .expect("tables list")
        .iter()
        .filter_map(|v| v.as_str())
        .collect();
    assert!(tables.contains(&"Customer"));
    assert!(tables.contains(&"Product"));
    assert!(tables.contains(&"Order"));
    assert!(tables.contains(&"OutboxMessages"));

    let containers = body["data"]["containers"].to_string();
    assert!(containers.contains("product-images"));
    assert!(containers.contains("payment-proofs"));
    assert_eq!(body["data"]["queues"].as_array().map(|a| a.len()), Some(2));
    assert_eq!(body["data"]["shares"][0], "contracts/payments");
}

#[tokio::test]
async fn queue_inspection_consumes_one_message_at_a_time() {
    let app = TestApp::new().await;
    let uri = "/api/v1/dashboard/queues/order-notifications/receive";

    // Nothing queued yet.
    let response = app.request(Method::POST, uri, None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let customer = app.seed_customer("erin").await;
    let product = app.seed_product("Widget", dec!(9.99), 10).await;
    let order = app
        .state
        .services
        .orders
        .create_order(CreateOrderRequest {
            customer_id: customer.id.clone(),
            product_id: product.id.clone(),
            quantity: 1,
            order_date: None,
        })
        .await
        .expect("create order");
    outbox::drain_once(&app.state.storage, 10)
        .await
        .expect("dispatch intents");

    let response = app.request(Method::POST, uri, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["data"]["queue"], "order-notifications");
    assert_eq!(body["data"]["message"]["order_id"], order.id);

    let response = app
        .request(Method::POST, "/api/v1/dashboard/queues/nope/receive", None)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert!(body["message"]
        .as_str()
        .unwrap_or_default()
        .contains("Unknown queue"));
}

#[tokio::test]
async fn status_and_health_endpoints_respond() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/api/v1/status", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["data"]["service"], "storefront-api");
    assert_eq!(body["data"]["status"], "ok");

    let response = app.request(Method::GET, "/api/v1/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["data"]["status"], "healthy");
    assert_eq!(body["data"]["checks"]["tables"], "healthy");
    assert_eq!(body["data"]["checks"]["queues"], "healthy");
}
