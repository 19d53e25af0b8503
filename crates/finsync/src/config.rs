use std::{env, time::Duration};

use crate::cache::CacheSettings;

/// Sync layer configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Snapshot age in seconds after which a non-forced refresh fetches (default: 300)
    pub cache_stale_seconds: u64,
    /// Change notification debounce window in milliseconds (default: 100)
    pub notify_debounce_ms: u64,
    /// Upper bound on a single remote query in seconds (default: 30)
    pub refresh_timeout_seconds: u64,
    /// Path to the SQLite local store (default: "finsync.db")
    pub local_store_path: String,
    /// When set, investment queries are scoped to this user
    pub user_id: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `CACHE_STALE_SECONDS` - Staleness threshold in seconds (default: 300)
    /// - `NOTIFY_DEBOUNCE_MS` - Debounce window in milliseconds (default: 100)
    /// - `REFRESH_TIMEOUT_SECONDS` - Remote query timeout in seconds (default: 30)
    /// - `LOCAL_STORE_PATH` - SQLite local store path (default: "finsync.db")
    /// - `FINSYNC_USER_ID` - Optional user scope for investments
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup. Unparseable numbers fall
    /// back to their defaults; an empty user id counts as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let number = |key: &str, default: u64| {
            lookup(key)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default)
        };

        Self {
            cache_stale_seconds: number("CACHE_STALE_SECONDS", 300),
            notify_debounce_ms: number("NOTIFY_DEBOUNCE_MS", 100),
            refresh_timeout_seconds: number("REFRESH_TIMEOUT_SECONDS", 30),
            local_store_path: lookup("LOCAL_STORE_PATH")
                .unwrap_or_else(|| "finsync.db".to_string()),
            user_id: lookup("FINSYNC_USER_ID").filter(|id| !id.trim().is_empty()),
        }
    }

    /// Get the staleness threshold as a Duration.
    pub fn stale_threshold(&self) -> Duration {
        Duration::from_secs(self.cache_stale_seconds)
    }

    /// Get the debounce window as a Duration.
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.notify_debounce_ms)
    }

    /// Get the refresh timeout as a Duration.
    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_secs(self.refresh_timeout_seconds)
    }

    pub fn cache_settings(&self) -> CacheSettings {
        CacheSettings {
            stale_threshold: self.stale_threshold(),
            refresh_timeout: self.refresh_timeout(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_values() {
        let config = Config::from_lookup(lookup(&[]));

        assert_eq!(config.cache_stale_seconds, 300);
        assert_eq!(config.notify_debounce_ms, 100);
        assert_eq!(config.refresh_timeout_seconds, 30);
        assert_eq!(config.local_store_path, "finsync.db");
        assert_eq!(config.user_id, None);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("CACHE_STALE_SECONDS", "60"),
            ("NOTIFY_DEBOUNCE_MS", "250"),
            ("REFRESH_TIMEOUT_SECONDS", "5"),
            ("LOCAL_STORE_PATH", "/tmp/cache.db"),
            ("FINSYNC_USER_ID", "user-42"),
        ]));

        assert_eq!(config.stale_threshold(), Duration::from_secs(60));
        assert_eq!(config.debounce(), Duration::from_millis(250));
        assert_eq!(config.refresh_timeout(), Duration::from_secs(5));
        assert_eq!(config.local_store_path, "/tmp/cache.db");
        assert_eq!(config.user_id.as_deref(), Some("user-42"));
    }

    #[test]
    fn test_invalid_numbers_fall_back_to_defaults() {
        let config = Config::from_lookup(lookup(&[
            ("CACHE_STALE_SECONDS", "five minutes"),
            ("NOTIFY_DEBOUNCE_MS", "-1"),
            ("FINSYNC_USER_ID", "  "),
        ]));

        assert_eq!(config.cache_stale_seconds, 300);
        assert_eq!(config.notify_debounce_ms, 100);
        assert_eq!(config.user_id, None);
    }

    #[test]
    fn test_cache_settings_conversion() {
        let config = Config::from_lookup(lookup(&[("CACHE_STALE_SECONDS", "600")]));

        assert_eq!(
            config.cache_settings(),
            CacheSettings {
                stale_threshold: Duration::from_secs(600),
                refresh_timeout: Duration::from_secs(30),
            }
        );
    }
}
