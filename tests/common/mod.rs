use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{header, Method, Request},
    Router,
};
use rust_decimal::Decimal;
use serde_json::Value;
use storefront_api::{
    config::AppConfig,
    events::{self, EventSender},
    handlers::AppServices,
    services::{
        customers::{CreateCustomerRequest, CustomerResponse},
        products::{CreateProductRequest, ProductResponse},
    },
    storage::StorageClient,
    AppState,
};
use tokio::sync::mpsc;
use tower::ServiceExt;

/// Boundary used by [`multipart_body`].
#[allow(dead_code)]
pub const BOUNDARY: &str = "storefront-test-boundary";

/// Helper harness for spinning up an application state backed by in-memory
/// storage primitives.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Construct a new test application with fresh storage state.
    pub async fn new() -> Self {
        let cfg = AppConfig::new(
            "memory://".to_string(),
            "redis://127.0.0.1:6379".to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );

        let storage = StorageClient::in_memory();
        storage
            .ensure_ready()
            .await
            .expect("provision in-memory storage for tests");

        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let services = AppServices::new(storage.clone(), Arc::new(event_sender.clone()));

        let state = AppState {
            config: cfg,
            storage,
            event_sender,
            services,
        };

        let router = Router::new()
            .nest("/api/v1", storefront_api::api_v1_routes())
            .with_state(state.clone());

        Self {
            router,
            state,
            _event_task: event_task,
        }
    }

    /// Send a request against the router with an optional JSON body.
    #[allow(dead_code)]
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        let body = if let Some(json) = body {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// POST a multipart/form-data body built with [`multipart_body`].
    #[allow(dead_code)]
    pub async fn request_multipart(&self, uri: &str, body: Vec<u8>) -> axum::response::Response {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .expect("failed to build multipart request");

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    #[allow(dead_code)]
    pub async fn seed_customer(&self, username: &str) -> CustomerResponse {
        self.state
            .services
            .customers
            .create_customer(CreateCustomerRequest {
                username: username.to_string(),
                first_name: "Test".to_string(),
                surname: "Customer".to_string(),
                email: Some(format!("{}@example.com", username)),
                shipping_address: Some("1 Test Street".to_string()),
            })
            .await
            .expect("seed customer for tests")
    }

    #[allow(dead_code)]
    pub async fn seed_product(&self, name: &str, price: Decimal, stock: i32) -> ProductResponse {
        self.state
            .services
            .products
            .create_product(CreateProductRequest {
                product_name: name.to_string(),
                description: format!("{} seeded for integration tests", name),
                price,
                stock_available: stock,
            })
            .await
            .expect("seed product for tests")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

/// Builds a multipart/form-data body: text fields first, then at most one
/// file part, delimited by [`BOUNDARY`].
#[allow(dead_code)]
pub fn multipart_body(
    text_fields: &[(&str, &str)],
    file: Option<(&str, &str, &[u8])>,
) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in text_fields {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                name, value
            )
            .as_bytes(),
        );
    }
    if let Some((name, file_name, content)) = file {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                name, file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

/// Reads a response body and parses it as JSON.
#[allow(dead_code)]
pub async fn read_json(response: axum::response::Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    serde_json::from_slice(&bytes).expect("parse response body")
}

/// Reads a raw response body.
#[allow(dead_code)]
pub async fn read_bytes(response: axum::response::Response) -> bytes::Bytes {
    body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body")
}
