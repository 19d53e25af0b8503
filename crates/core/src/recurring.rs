//! Occurrence generation for recurring investments.
//!
//! A recurring investment stores one ISO date per occurrence. Missing
//! occurrences are computed from the earliest recorded date, so running the
//! computation again after the gaps are filled yields nothing.

use std::collections::BTreeSet;

use chrono::{Days, Months, NaiveDate};

use crate::records::{Investment, RecurringFrequency};

/// Returns the `n`th occurrence after `start` (0 is `start` itself).
///
/// Month-based steps are taken from `start` rather than chained, so a
/// schedule starting on the 31st clamps per month without drifting.
pub fn nth_occurrence(
    start: NaiveDate,
    frequency: RecurringFrequency,
    n: u32,
) -> Option<NaiveDate> {
    match frequency {
        RecurringFrequency::Daily => start.checked_add_days(Days::new(u64::from(n))),
        RecurringFrequency::Weekly => start.checked_add_days(Days::new(7 * u64::from(n))),
        RecurringFrequency::Monthly => start.checked_add_months(Months::new(n)),
        RecurringFrequency::Quarterly => start.checked_add_months(Months::new(n.checked_mul(3)?)),
        RecurringFrequency::Yearly => start.checked_add_months(Months::new(n.checked_mul(12)?)),
    }
}

/// All occurrences from `start` up to and including `until`.
pub fn occurrences(
    start: NaiveDate,
    frequency: RecurringFrequency,
    until: NaiveDate,
) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    let mut n = 0;
    while let Some(date) = nth_occurrence(start, frequency, n) {
        if date > until {
            break;
        }
        dates.push(date);
        n += 1;
    }
    dates
}

/// Occurrences of a recurring investment up to `today` that are not yet
/// recorded, in chronological order.
pub fn missing_occurrences(investment: &Investment, today: NaiveDate) -> Vec<NaiveDate> {
    let Some(frequency) = investment.frequency() else {
        return Vec::new();
    };
    let recorded: BTreeSet<NaiveDate> = investment.date.parsed().into_iter().collect();
    let Some(start) = recorded.first().copied() else {
        return Vec::new();
    };

    occurrences(start, frequency, today)
        .into_iter()
        .filter(|d| !recorded.contains(d))
        .collect()
}
