use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::{parse_iso_date, Period, Record, Result};

/// A monthly goal. `month_year` is `"MonthName YYYY"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub completed: bool,
    pub month_year: String,
    #[serde(default)]
    pub created_at: String,
}

impl Goal {
    pub fn new(text: impl Into<String>, period: Period, created_at: DateTime<Utc>) -> Self {
        Self {
            id: String::new(),
            text: text.into(),
            completed: false,
            month_year: period.to_string(),
            created_at: created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn period(&self) -> Result<Period> {
        self.month_year.parse()
    }
}

impl Record for Goal {
    const COLLECTION: &'static str = "goals";
    const ENTITY_TYPE: &'static str = "Goal";

    fn id(&self) -> &str {
        &self.id
    }

    fn matches_period(&self, period: Period) -> Result<bool> {
        Ok(self.period()? == period)
    }

    fn sort_key(&self) -> Option<NaiveDate> {
        parse_iso_date(&self.created_at)
            .ok()
            .or_else(|| self.period().ok().and_then(|p| p.first_day()))
    }
}
