//! Once-per-day backfill of recurring investment occurrences.
//!
//! A recurring investment keeps one ISO date per occurrence in its `date`
//! list. The job fills in the occurrences between the first recorded date
//! and today by rewriting that list on the same document; it never inserts
//! new documents. Missing dates are recomputed from authoritative remote
//! state on every run, so running twice leaves the remote unchanged.

use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::Value;

use finsync_core::cache::{last_backfill_key, LocalStore};
use finsync_core::records::{format_iso_date, Investment, Record};
use finsync_core::recurring::missing_occurrences;
use finsync_core::storage::Fields;

use crate::cache::{DomainCache, RefreshOutcome, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackfillReport {
    /// Recurring investments inspected.
    pub examined: usize,
    /// Investments whose date list was extended.
    pub updated: usize,
    /// Occurrence dates added across all investments.
    pub added_dates: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackfillOutcome {
    /// The job already completed today.
    AlreadyRan,
    /// The remote could not be reached; nothing was written.
    SourceUnavailable,
    Completed(BackfillReport),
}

pub struct BackfillJob {
    investments: DomainCache<Investment>,
    store: Arc<dyn LocalStore>,
}

impl BackfillJob {
    pub fn new(investments: DomainCache<Investment>, store: Arc<dyn LocalStore>) -> Self {
        Self { investments, store }
    }

    /// Runs the backfill unless it already completed on `today`. The day is
    /// only recorded after a completed run.
    pub async fn run_once_per_day(&self, today: NaiveDate) -> Result<BackfillOutcome> {
        let key = last_backfill_key(Investment::COLLECTION);
        let marker = today.to_string();

        match self.store.get(&key).await {
            Ok(Some(last)) if last == marker => {
                tracing::trace!(day = %marker, "Backfill already ran today");
                return Ok(BackfillOutcome::AlreadyRan);
            }
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(error = %err, "Failed to read backfill marker, running anyway");
            }
        }

        let outcome = self.run(today).await?;

        if matches!(outcome, BackfillOutcome::Completed(_)) {
            if let Err(err) = self.store.set(&key, &marker).await {
                tracing::warn!(error = %err, "Failed to persist backfill marker");
            }
        }
        Ok(outcome)
    }

    /// Backfills every recurring investment up to `today`, regardless of
    /// when the job last ran.
    pub async fn run(&self, today: NaiveDate) -> Result<BackfillOutcome> {
        // Work from authoritative state, never from a fallback copy.
        if let RefreshOutcome::Degraded { .. } = self.investments.refresh(true).await? {
            tracing::warn!("Skipping backfill, remote source unavailable");
            return Ok(BackfillOutcome::SourceUnavailable);
        }

        let mut report = BackfillReport::default();
        let mut updates = Vec::new();

        for investment in self.investments.snapshot().iter() {
            if investment.frequency().is_none() {
                continue;
            }
            report.examined += 1;

            let missing = missing_occurrences(investment, today);
            if missing.is_empty() {
                continue;
            }

            report.added_dates += missing.len();
            updates.push((investment.id.clone(), extended_dates(investment, &missing)));
        }

        if !updates.is_empty() {
            report.updated = self.investments.update_many(updates).await?;
        }

        tracing::debug!(
            examined = report.examined,
            updated = report.updated,
            added_dates = report.added_dates,
            "Recurring backfill completed"
        );
        Ok(BackfillOutcome::Completed(report))
    }
}

/// Partial update replacing the investment's date list with the recorded
/// dates followed by the missing ones.
fn extended_dates(investment: &Investment, missing: &[NaiveDate]) -> Fields {
    let dates: Vec<Value> = investment
        .date
        .as_slice()
        .iter()
        .cloned()
        .chain(missing.iter().map(|d| format_iso_date(*d)))
        .map(Value::String)
        .collect();

    let mut fields = Fields::new();
    fields.insert("date".to_string(), Value::Array(dates));
    fields
}
