//! Store configuration.

use std::time::Duration;

/// Configuration for opening a document store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Static secret used to derive the whole-file encryption key.
    ///
    /// Only consulted when the catalog has `encryption_enabled` set; opening
    /// an encrypted store without a secret is an error.
    pub encryption_secret: Option<String>,

    /// How often the background sweeper checks whether the cache is due for
    /// a full clear.
    pub sweep_tick: Duration,

    /// Whether to spawn the background cache sweeper thread on open.
    ///
    /// When disabled, the cache is still swept opportunistically at the start
    /// of every public operation.
    pub background_sweeper: bool,

    /// Optional actor label stamped on every transaction-log entry.
    pub actor: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            encryption_secret: None,
            sweep_tick: Duration::from_secs(60),
            background_sweeper: true,
            actor: None,
        }
    }
}

impl StoreConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the encryption secret.
    #[must_use]
    pub fn encryption_secret(mut self, secret: impl Into<String>) -> Self {
        self.encryption_secret = Some(secret.into());
        self
    }

    /// Sets the sweeper tick interval.
    #[must_use]
    pub const fn sweep_tick(mut self, tick: Duration) -> Self {
        self.sweep_tick = tick;
        self
    }

    /// Enables or disables the background sweeper thread.
    #[must_use]
    pub const fn background_sweeper(mut self, enabled: bool) -> Self {
        self.background_sweeper = enabled;
        self
    }

    /// Sets the actor label for transaction-log entries.
    #[must_use]
    pub fn actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = StoreConfig::default();
        assert!(config.encryption_secret.is_none());
        assert!(config.background_sweeper);
        assert!(config.actor.is_none());
    }

    #[test]
    fn builder_pattern() {
        let config = StoreConfig::new()
            .encryption_secret("s3cret")
            .sweep_tick(Duration::from_secs(5))
            .background_sweeper(false)
            .actor("api");

        assert_eq!(config.encryption_secret.as_deref(), Some("s3cret"));
        assert_eq!(config.sweep_tick, Duration::from_secs(5));
        assert!(!config.background_sweeper);
        assert_eq!(config.actor.as_deref(), Some("api"));
    }
}
