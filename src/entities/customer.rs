use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{EntityKind, TableEntity};
use crate::storage::tables::Etag;

/// A registered customer account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    #[serde(skip)]
    pub row_key: String,
    #[serde(skip)]
    pub etag: Etag,
    #[serde(skip)]
    pub timestamp: Option<DateTime<Utc>>,

    pub username: String,
    pub first_name: String,
    pub surname: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub shipping_address: String,
}

impl Customer {
    pub fn new(username: String, first_name: String, surname: String) -> Self {
        Self {
            row_key: Uuid::new_v4().to_string(),
            etag: Etag::default(),
            timestamp: None,
            username,
            first_name,
            surname,
            email: String::new(),
            shipping_address: String::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.row_key
    }

    /// Display name used on notifications ("{first} {surname}").
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.surname)
    }
}

impl TableEntity for Customer {
    fn kind() -> EntityKind {
        EntityKind::Customer
    }

    fn row_key(&self) -> &str {
        &self.row_key
    }

    fn set_row_key(&mut self, row_key: String) {
        self.row_key = row_key;
    }

    fn etag(&self) -> &Etag {
        &self.etag
    }

    fn set_etag(&mut self, etag: Etag) {
        self.etag = etag;
    }

    fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    fn set_timestamp(&mut self, timestamp: Option<DateTime<Utc>>) {
        self.timestamp = timestamp;
    }
}
