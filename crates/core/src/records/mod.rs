//! Finance records and their period keys.
//!
//! Every record carries its date as a display-formatted string. Period
//! lookups reparse that string; records whose date cannot be parsed are
//! reported through [`PeriodError`] and left to the caller to skip.

mod error;
mod expense;
mod goal;
mod investment;
mod period;

use chrono::NaiveDate;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::storage::{Document, Fields, RepositoryError};

pub use error::{PeriodError, Result};
pub use expense::Expense;
pub use goal::Goal;
pub use investment::{Investment, InvestmentDates, RecurringFrequency};
pub use period::{format_iso_date, format_slash_date, parse_iso_date, parse_slash_date, Period};

/// A record kind backed by one remote collection.
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Remote collection name. Also used as the entity-kind segment of
    /// local storage keys.
    const COLLECTION: &'static str;

    /// Human readable name used in errors.
    const ENTITY_TYPE: &'static str;

    /// Store-generated id. Empty for records not yet inserted.
    fn id(&self) -> &str;

    /// Returns whether the record belongs to `period`.
    fn matches_period(&self, period: Period) -> Result<bool>;

    /// Canonical date used for client-side ordering.
    fn sort_key(&self) -> Option<NaiveDate>;

    /// Decodes a remote document, injecting its id.
    fn from_document(document: Document) -> std::result::Result<Self, RepositoryError> {
        let Document { id, mut fields } = document;
        fields.insert("id".to_string(), Value::String(id));
        serde_json::from_value(Value::Object(fields))
            .map_err(|e| RepositoryError::Malformed {
                entity_type: Self::ENTITY_TYPE,
                reason: e.to_string(),
            })
    }

    /// Encodes the record as a field map without its id.
    fn to_fields(&self) -> std::result::Result<Fields, RepositoryError> {
        match serde_json::to_value(self) {
            Ok(Value::Object(mut fields)) => {
                fields.remove("id");
                Ok(fields)
            }
            Ok(_) => Err(RepositoryError::Malformed {
                entity_type: Self::ENTITY_TYPE,
                reason: "not a JSON object".to_string(),
            }),
            Err(e) => Err(RepositoryError::Malformed {
                entity_type: Self::ENTITY_TYPE,
                reason: e.to_string(),
            }),
        }
    }
}
