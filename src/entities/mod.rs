/*!
 * Entity model for the table store.
 *
 * Every stored record belongs to a closed set of entity kinds. The kind fixes
 * both the partition key shared by all rows of that kind and the physical
 * collection (table) the rows live in.
 */

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use strum::Display;

use crate::storage::tables::Etag;

pub mod customer;
pub mod order;
pub mod product;

pub use customer::Customer;
pub use order::Order;
pub use product::Product;

/// Logical entity kinds known to the application.
///
/// The three domain kinds map to collections of the same name. `Custom` exists
/// for auxiliary tables (such as the notification outbox); those pluralize
/// their collection name by appending `s`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum EntityKind {
    #[strum(to_string = "Customer")]
    Customer,
    #[strum(to_string = "Product")]
    Product,
    #[strum(to_string = "Order")]
    Order,
    #[strum(to_string = "{0}")]
    Custom(&'static str),
}

impl EntityKind {
    /// Partition key shared by every row of this kind.
    pub const fn partition_key(&self) -> &'static str {
        match *self {
            EntityKind::Customer => "Customer",
            EntityKind::Product => "Product",
            EntityKind::Order => "Order",
            EntityKind::Custom(name) => name,
        }
    }

    /// Physical collection name for this kind.
    pub fn collection_name(&self) -> String {
        match self {
            EntityKind::Customer | EntityKind::Product | EntityKind::Order => self.to_string(),
            EntityKind::Custom(name) => format!("{}s", name),
        }
    }
}

/// A record that can be stored in the table service.
///
/// Row metadata (row key, version token, timestamp) lives outside the
/// serialized payload; implementors skip those fields during serde and the
/// storage client re-attaches them from the row on read.
pub trait TableEntity: Clone + Send + Sync + Serialize + DeserializeOwned {
    /// The kind tag governing partition key and collection name.
    fn kind() -> EntityKind;

    fn row_key(&self) -> &str;
    fn set_row_key(&mut self, row_key: String);

    fn etag(&self) -> &Etag;
    fn set_etag(&mut self, etag: Etag);

    fn timestamp(&self) -> Option<DateTime<Utc>>;
    fn set_timestamp(&mut self, timestamp: Option<DateTime<Utc>>);
}
