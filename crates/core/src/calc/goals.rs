use std::collections::BTreeMap;

use crate::records::{Goal, Period};

/// Completed vs total goal counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Completion {
    pub completed: usize,
    pub total: usize,
}

impl Completion {
    /// Completed share in `[0, 1]`, or `None` when there are no goals.
    pub fn ratio(&self) -> Option<f64> {
        (self.total > 0).then(|| self.completed as f64 / self.total as f64)
    }
}

pub fn completion(goals: &[Goal]) -> Completion {
    Completion {
        completed: goals.iter().filter(|g| g.completed).count(),
        total: goals.len(),
    }
}

/// Groups goals by their `monthYear` period. Goals whose period does not
/// parse are left out.
pub fn group_by_period(goals: &[Goal]) -> BTreeMap<Period, Vec<Goal>> {
    let mut grouped: BTreeMap<Period, Vec<Goal>> = BTreeMap::new();
    for goal in goals {
        if let Ok(period) = goal.period() {
            grouped.entry(period).or_default().push(goal.clone());
        }
    }
    grouped
}
