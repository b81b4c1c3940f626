use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::entities::Customer;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::storage::StorageClient;

/// Request/Response types for the customer service
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateCustomerRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "Surname is required"))]
    pub surname: String,
    #[validate(email(message = "Email address is invalid"))]
    pub email: Option<String>,
    pub shipping_address: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, Default)]
pub struct UpdateCustomerRequest {
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub surname: Option<String>,
    #[validate(email(message = "Email address is invalid"))]
    pub email: Option<String>,
    pub shipping_address: Option<String>,
    /// Version token from a previous read; omitted means "replace what is
    /// there now".
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerResponse {
    pub id: String,
    pub username: String,
    pub first_name: String,
    pub surname: String,
    pub display_name: String,
    pub email: String,
    pub shipping_address: String,
    pub version: String,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<Customer> for CustomerResponse {
    fn from(customer: Customer) -> Self {
        Self {
            display_name: customer.display_name(),
            id: customer.row_key,
            username: customer.username,
            first_name: customer.first_name,
            surname: customer.surname,
            email: customer.email,
            shipping_address: customer.shipping_address,
            version: customer.etag.to_string(),
            updated_at: customer.timestamp,
        }
    }
}

/// Service for managing customers
#[derive(Clone)]
pub struct CustomerService {
    storage: StorageClient,
    event_sender: Option<Arc<EventSender>>,
}

impl CustomerService {
    /// Creates a new customer service instance
    pub fn new(storage: StorageClient, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            storage,
            event_sender,
        }
    }

    /// Lists all customers
    #[instrument(skip(self))]
    pub async fn list_customers(&self) -> Result<Vec<CustomerResponse>, ServiceError> {
        let customers = self.storage.list_entities::<Customer>().await?;
        Ok(customers.into_iter().map(CustomerResponse::from).collect())
    }

    /// Gets a customer by id
    #[instrument(skip(self))]
    pub async fn get_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<CustomerResponse>, ServiceError> {
        let customer = self.storage.get_entity::<Customer>(customer_id).await?;
        Ok(customer.map(CustomerResponse::from))
    }

    /// Creates a new customer
    #[instrument(skip(self, request), fields(username = %request.username))]
    pub async fn create_customer(
        &self,
        request: CreateCustomerRequest,
    ) -> Result<CustomerResponse, ServiceError> {
        request.validate()?;

        let mut customer =
            Customer::new(request.username, request.first_name, request.surname);
        if let Some(email) = request.email {
            customer.email = email;
        }
        if let Some(shipping_address) = request.shipping_address {
            customer.shipping_address = shipping_address;
        }
        self.storage.add_entity(&mut customer).await?;

        info!(customer_id = %customer.id(), "Customer created successfully");
        self.send_event(Event::CustomerCreated(customer.id().to_string()))
            .await;
        Ok(CustomerResponse::from(customer))
    }

    /// Replaces a customer's fields
    #[instrument(skip(self, request), fields(customer_id = %customer_id))]
    pub async fn update_customer(
        &self,
        customer_id: &str,
        request: UpdateCustomerRequest,
    ) -> Result<CustomerResponse, ServiceError> {
        request.validate()?;

        let mut customer = self
            .storage
            .get_entity::<Customer>(customer_id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Customer {} not found", customer_id))
            })?;

        if let Some(username) = request.username {
            if username.is_empty() {
                return Err(ServiceError::ValidationError(
                    "Username is required".to_string(),
                ));
            }
            customer.username = username;
        }
        if let Some(first_name) = request.first_name {
            customer.first_name = first_name;
        }
        if let Some(surname) = request.surname {
            customer.surname = surname;
        }
        if let Some(email) = request.email {
            customer.email = email;
        }
        if let Some(shipping_address) = request.shipping_address {
            customer.shipping_address = shipping_address;
        }
        if let Some(version) = request.version {
            customer.etag = version.into();
        }

        self.storage.update_entity(&mut customer).await?;

        info!(customer_id = %customer.id(), "Customer updated successfully");
        self.send_event(Event::CustomerUpdated(customer.id().to_string()))
            .await;
        Ok(CustomerResponse::from(customer))
    }

    /// Deletes a customer
    #[instrument(skip(self), fields(customer_id = %customer_id))]
    pub async fn delete_customer(&self, customer_id: &str) -> Result<(), ServiceError> {
        self.storage.delete_entity::<Customer>(customer_id).await?;

        info!(customer_id = %customer_id, "Customer deleted successfully");
        self.send_event(Event::CustomerDeleted(customer_id.to_string()))
            .await;
        Ok(())
    }

    async fn send_event(&self, event: Event) {
        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(event).await {
                warn!(error = %e, "Failed to send customer event");
            }
        }
    }
}
