use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{format_slash_date, parse_slash_date, Period, Record, Result};

/// A single expense. `date` is `"M/D/YYYY"` and `price` a decimal string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub date: String,
    pub tag: String,
    #[serde(default)]
    pub description: String,
    pub price: String,
}

impl Expense {
    /// Creates an expense that has not been stored yet.
    pub fn new(
        date: NaiveDate,
        tag: impl Into<String>,
        description: impl Into<String>,
        price: Decimal,
    ) -> Self {
        Self {
            id: String::new(),
            date: format_slash_date(date),
            tag: tag.into(),
            description: description.into(),
            price: price.to_string(),
        }
    }

    /// Builder-style id setter, mostly useful in fixtures.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn parsed_date(&self) -> Result<NaiveDate> {
        parse_slash_date(&self.date)
    }

    /// The price as a decimal, if it parses.
    pub fn amount(&self) -> Option<Decimal> {
        Decimal::from_str(self.price.trim()).ok()
    }
}

impl Record for Expense {
    const COLLECTION: &'static str = "expenses";
    const ENTITY_TYPE: &'static str = "Expense";

    fn id(&self) -> &str {
        &self.id
    }

    fn matches_period(&self, period: Period) -> Result<bool> {
        Ok(period.contains(self.parsed_date()?))
    }

    fn sort_key(&self) -> Option<NaiveDate> {
        self.parsed_date().ok()
    }
}
