use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{parse_iso_date, Period, PeriodError, Record, Result};

/// Dates of an investment: a single ISO timestamp, or one per occurrence
/// for recurring investments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InvestmentDates {
    Single(String),
    Many(Vec<String>),
}

impl InvestmentDates {
    pub fn as_slice(&self) -> &[String] {
        match self {
            Self::Single(date) => std::slice::from_ref(date),
            Self::Many(dates) => dates,
        }
    }

    /// Parsed dates, skipping entries that fail to parse.
    pub fn parsed(&self) -> Vec<NaiveDate> {
        self.as_slice()
            .iter()
            .filter_map(|d| parse_iso_date(d).ok())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecurringFrequency {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl FromStr for RecurringFrequency {
    type Err = PeriodError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "quarterly" => Ok(Self::Quarterly),
            "yearly" | "annually" => Ok(Self::Yearly),
            _ => Err(PeriodError::InvalidPeriod(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Investment {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub amount: f64,
    pub date: InvestmentDates,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_recurring: bool,
    /// Raw frequency as stored; see [`Investment::frequency`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurring_frequency: Option<String>,
    #[serde(default)]
    pub taxable: bool,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub created_at: String,
}

impl Investment {
    /// The recurrence frequency, if the investment recurs and the stored
    /// value is recognised.
    pub fn frequency(&self) -> Option<RecurringFrequency> {
        if !self.is_recurring {
            return None;
        }
        self.recurring_frequency.as_deref()?.parse().ok()
    }
}

impl Record for Investment {
    const COLLECTION: &'static str = "investments";
    const ENTITY_TYPE: &'static str = "Investment";

    fn id(&self) -> &str {
        &self.id
    }

    /// Matches if any recorded occurrence falls inside `period`. Fails only
    /// when no date parses at all.
    fn matches_period(&self, period: Period) -> Result<bool> {
        let dates = self.date.parsed();
        if dates.is_empty() {
            return Err(PeriodError::InvalidDate(self.date.as_slice().join(",")));
        }
        Ok(dates.into_iter().any(|d| period.contains(d)))
    }

    fn sort_key(&self) -> Option<NaiveDate> {
        self.date.parsed().into_iter().max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Document;
    use serde_json::json;

    fn investment(date: serde_json::Value) -> Investment {
        let fields = json!({
            "userId": "u1",
            "type": "mutual_fund",
            "title": "Index fund",
            "amount": 5000,
            "date": date,
            "isRecurring": true,
            "recurringFrequency": "monthly",
            "category": "equity"
        });
        Investment::from_document(Document::new("inv-1", fields.as_object().unwrap().clone()))
            .unwrap()
    }

    #[test]
    fn test_decodes_single_date() {
        let inv = investment(json!("2025-01-10T00:00:00.000Z"));

        assert_eq!(inv.id, "inv-1");
        assert_eq!(inv.kind, "mutual_fund");
        assert_eq!(
            inv.date,
            InvestmentDates::Single("2025-01-10T00:00:00.000Z".to_string())
        );
    }

    #[test]
    fn test_matches_any_occurrence() {
        let inv = investment(json!([
            "2025-01-10T00:00:00.000Z",
            "2025-02-10T00:00:00.000Z"
        ]));

        assert!(inv.matches_period(Period::new(2025, 2).unwrap()).unwrap());
        assert!(!inv.matches_period(Period::new(2025, 3).unwrap()).unwrap());
        assert_eq!(inv.sort_key(), NaiveDate::from_ymd_opt(2025, 2, 10));
    }

    #[test]
    fn test_unparsable_dates_report_error() {
        let inv = investment(json!(["soon"]));

        assert!(inv.matches_period(Period::new(2025, 2).unwrap()).is_err());
    }

    #[test]
    fn test_frequency_requires_recurring_flag() {
        let mut inv = investment(json!("2025-01-10"));
        assert_eq!(inv.frequency(), Some(RecurringFrequency::Monthly));

        inv.is_recurring = false;
        assert_eq!(inv.frequency(), None);
    }

    #[test]
    fn test_unknown_frequency_is_ignored() {
        let mut inv = investment(json!("2025-01-10"));
        inv.recurring_frequency = Some("fortnightly".to_string());

        assert_eq!(inv.frequency(), None);
    }

    #[test]
    fn test_to_fields_keeps_wire_names() {
        let inv = investment(json!("2025-01-10"));
        let fields = inv.to_fields().unwrap();

        assert_eq!(fields.get("type"), Some(&json!("mutual_fund")));
        assert_eq!(fields.get("userId"), Some(&json!("u1")));
        assert!(!fields.contains_key("id"));
    }
}
