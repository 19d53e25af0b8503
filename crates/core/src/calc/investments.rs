use std::collections::BTreeMap;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use crate::records::Investment;

/// Amount invested across all recorded occurrences of one investment.
pub fn invested_amount(investment: &Investment) -> Decimal {
    let occurrences = Decimal::from(investment.date.len());
    Decimal::from_f64(investment.amount).unwrap_or(Decimal::ZERO) * occurrences
}

/// Sum of [`invested_amount`] over a snapshot.
pub fn total_invested(investments: &[Investment]) -> Decimal {
    investments.iter().map(invested_amount).sum()
}

/// Invested amount per category.
pub fn by_category(investments: &[Investment]) -> BTreeMap<String, Decimal> {
    let mut totals = BTreeMap::new();
    for investment in investments {
        *totals
            .entry(investment.category.clone())
            .or_insert(Decimal::ZERO) += invested_amount(investment);
    }
    totals
}
