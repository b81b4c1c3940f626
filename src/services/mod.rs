// Core services
pub mod customers;
pub mod dashboard;
pub mod orders;
pub mod products;
pub mod uploads;

pub use customers::CustomerService;
pub use dashboard::DashboardService;
pub use orders::OrderService;
pub use products::ProductService;
pub use uploads::UploadService;
