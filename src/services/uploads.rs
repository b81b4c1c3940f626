use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::storage::{
    StorageClient, CONTRACTS_SHARE, PAYMENT_PROOFS_CONTAINER, PAYMENTS_DIRECTORY,
};

/// A payment proof submitted by a customer.
#[derive(Debug)]
pub struct PaymentProofUpload {
    pub file_name: String,
    pub content: Bytes,
    pub order_id: Option<String>,
    pub customer_name: Option<String>,
}

/// Where an accepted payment proof ended up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentProofReceipt {
    /// Stored file name, prefixed with the upload timestamp.
    pub file_name: String,
    pub blob_uri: String,
    pub share_location: String,
    pub order_id: Option<String>,
    pub customer_name: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

/// Service for payment proof uploads.
///
/// Accepted files are written twice: to the payment-proofs blob container
/// for direct linking, and to the contracts share's payments directory,
/// which the finance side reads back by file name.
#[derive(Clone)]
pub struct UploadService {
    storage: StorageClient,
    event_sender: Option<Arc<EventSender>>,
}

impl UploadService {
    /// Creates a new upload service instance
    pub fn new(storage: StorageClient, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            storage,
            event_sender,
        }
    }

    /// Stores a payment proof under a timestamped name
    #[instrument(skip(self, upload), fields(file_name = %upload.file_name))]
    pub async fn store_payment_proof(
        &self,
        upload: PaymentProofUpload,
    ) -> Result<PaymentProofReceipt, ServiceError> {
        if upload.content.is_empty() {
            return Err(ServiceError::ValidationError(
                "Please select a file to upload".to_string(),
            ));
        }
        let safe_name = sanitize_file_name(&upload.file_name)?;

        let uploaded_at = Utc::now();
        let stored_name = format!("{}_{}", uploaded_at.format("%Y%m%d_%H%M%S"), safe_name);

        let blob_uri = self
            .storage
            .blobs()
            .upload(
                PAYMENT_PROOFS_CONTAINER,
                &stored_name,
                upload.content.clone(),
            )
            .await?;
        self.storage
            .files()
            .upload_file(
                CONTRACTS_SHARE,
                PAYMENTS_DIRECTORY,
                &stored_name,
                upload.content,
            )
            .await?;

        info!(stored_name = %stored_name, "Payment proof stored");
        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender
                .send(Event::PaymentProofStored {
                    file_name: stored_name.clone(),
                    order_id: upload.order_id.clone(),
                })
                .await
            {
                warn!(error = %e, "Failed to send upload event");
            }
        }

        Ok(PaymentProofReceipt {
            file_name: stored_name,
            blob_uri,
            share_location: format!("{}/{}", CONTRACTS_SHARE, PAYMENTS_DIRECTORY),
            order_id: upload.order_id,
            customer_name: upload.customer_name,
            uploaded_at,
        })
    }

    /// Reads a stored payment proof back from the file share
    #[instrument(skip(self), fields(file_name = %file_name))]
    pub async fn download_payment_proof(&self, file_name: &str) -> Result<Bytes, ServiceError> {
        let safe_name = sanitize_file_name(file_name)?;
        let content = self
            .storage
            .files()
            .download_file(CONTRACTS_SHARE, PAYMENTS_DIRECTORY, &safe_name)
            .await?;
        Ok(content)
    }
}

/// Strips any client-supplied path and rejects traversal attempts.
fn sanitize_file_name(file_name: &str) -> Result<String, ServiceError> {
    if file_name.contains("..") {
        return Err(ServiceError::ValidationError(
            "File name is invalid".to_string(),
        ));
    }
    let name = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if name.is_empty() {
        return Err(ServiceError::ValidationError(
            "File name is invalid".to_string(),
        ));
    }
    Ok(name.to_string())
}
