/// Returns the storage key holding the persisted snapshot of an entity kind.
pub fn snapshot_key(kind: &str) -> String {
    format!("cached_{}", kind)
}

/// Returns the storage key holding the last successful refresh time.
pub fn last_refresh_key(kind: &str) -> String {
    format!("last_refresh_{}", kind)
}

/// Returns the storage key holding the day the recurring backfill last ran.
pub fn last_backfill_key(kind: &str) -> String {
    format!("last_backfill_{}", kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_key() {
        assert_eq!(snapshot_key("expenses"), "cached_expenses");
    }

    #[test]
    fn test_last_refresh_key() {
        assert_eq!(last_refresh_key("goals"), "last_refresh_goals");
    }

    #[test]
    fn test_last_backfill_key() {
        assert_eq!(
            last_backfill_key("investments"),
            "last_backfill_investments"
        );
    }

    #[test]
    fn test_keys_do_not_collide_across_kinds() {
        let kinds = ["expenses", "goals", "investments"];
        let mut keys: Vec<String> = kinds
            .iter()
            .flat_map(|k| [snapshot_key(k), last_refresh_key(k)])
            .collect();
        keys.sort();
        keys.dedup();

        assert_eq!(keys.len(), 6);
    }
}
