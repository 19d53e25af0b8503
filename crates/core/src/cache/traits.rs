use async_trait::async_trait;

use super::Result;

/// Durable string key-value storage that survives process restarts.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Gets a value by key.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Sets a value, replacing any previous one.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Removes a value. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;
}
