use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::records::Expense;

/// Sum of all parsable prices.
pub fn total(expenses: &[Expense]) -> Decimal {
    expenses.iter().filter_map(Expense::amount).sum()
}

/// Sum of parsable prices per tag.
pub fn totals_by_tag(expenses: &[Expense]) -> BTreeMap<String, Decimal> {
    let mut totals = BTreeMap::new();
    for expense in expenses {
        if let Some(amount) = expense.amount() {
            *totals.entry(expense.tag.clone()).or_insert(Decimal::ZERO) += amount;
        }
    }
    totals
}
