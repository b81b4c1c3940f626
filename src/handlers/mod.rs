pub mod common;
pub mod customers;
pub mod dashboard;
pub mod orders;
pub mod products;
pub mod uploads;

use std::sync::Arc;

use crate::events::EventSender;
use crate::services::{
    CustomerService, DashboardService, OrderService, ProductService, UploadService,
};
use crate::storage::StorageClient;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub products: Arc<ProductService>,
    pub customers: Arc<CustomerService>,
    pub orders: Arc<OrderService>,
    pub uploads: Arc<UploadService>,
    pub dashboard: Arc<DashboardService>,
}

impl AppServices {
    /// Build the service container shared by every handler.
    pub fn new(storage: StorageClient, event_sender: Arc<EventSender>) -> Self {
        let products = Arc::new(ProductService::new(
            storage.clone(),
            Some(event_sender.clone()),
        ));
        let customers = Arc::new(CustomerService::new(
            storage.clone(),
            Some(event_sender.clone()),
        ));
        let orders = Arc::new(OrderService::new(
            storage.clone(),
            Some(event_sender.clone()),
        ));
        let uploads = Arc::new(UploadService::new(storage.clone(), Some(event_sender)));
        let dashboard = Arc::new(DashboardService::new(storage));

        Self {
            products,
            customers,
            orders,
            uploads,
            dashboard,
        }
    }
}
