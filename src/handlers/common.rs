use axum::extract::multipart::{Multipart, MultipartError};
use bytes::Bytes;

use crate::errors::ServiceError;

/// A file part pulled out of a multipart request.
pub struct UploadedFile {
    pub file_name: String,
    pub content: Bytes,
}

/// Everything a multipart upload carried: at most one file part plus any
/// plain text parts that accompanied it.
#[derive(Default)]
pub struct UploadParts {
    pub file: Option<UploadedFile>,
    text: Vec<(String, String)>,
}

impl UploadParts {
    /// Looks up a text part by field name.
    pub fn text_value(&self, name: &str) -> Option<&str> {
        self.text
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Drains a multipart request, keeping the first file part and every text
/// part. Later file parts are read and discarded so the request body is
/// fully consumed.
pub async fn read_upload(mut multipart: Multipart) -> Result<UploadParts, ServiceError> {
    let mut parts = UploadParts::default();

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let name = field.name().unwrap_or_default().to_string();
        match field.file_name() {
            Some(file_name) => {
                let file_name = file_name.to_string();
                let content = field.bytes().await.map_err(bad_multipart)?;
                if parts.file.is_none() {
                    parts.file = Some(UploadedFile { file_name, content });
                }
            }
            None => {
                let value = field.text().await.map_err(bad_multipart)?;
                if !name.is_empty() {
                    parts.text.push((name, value));
                }
            }
        }
    }

    Ok(parts)
}

fn bad_multipart(err: MultipartError) -> ServiceError {
    ServiceError::InvalidInput(format!("Invalid multipart payload: {}", err))
}
