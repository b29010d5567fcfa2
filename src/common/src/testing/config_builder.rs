//! Test configuration builder for creating test setups quickly.

use crate::config::{Configuration, DeepStorageConfig, StorageConfig};

/// Builder for creating test configurations.
///
/// # Example
///
/// ```rust,ignore
/// use common::testing::TestConfigBuilder;
///
/// let config = TestConfigBuilder::new()
///     .in_memory()
///     .with_purge_location("segments", "druid/segments")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct TestConfigBuilder {
    config: Configuration,
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestConfigBuilder {
    /// Create a new test configuration builder with in-memory storage and no
    /// purge location.
    pub fn new() -> Self {
        Self {
            config: Configuration::default(),
        }
    }

    /// Use the in-memory object store.
    pub fn in_memory(mut self) -> Self {
        self.config.storage = StorageConfig {
            dsn: "memory://".to_string(),
        };
        self
    }

    /// Use a custom storage DSN.
    pub fn with_storage_dsn(mut self, dsn: impl Into<String>) -> Self {
        self.config.storage.dsn = dsn.into();
        self
    }

    /// Set both the bucket and base key, enabling a full purge.
    pub fn with_purge_location(
        mut self,
        bucket: impl Into<String>,
        base_key: impl Into<String>,
    ) -> Self {
        self.config.deep_storage.bucket = Some(bucket.into());
        self.config.deep_storage.base_key = Some(base_key.into());
        self
    }

    /// Set the listing page bound.
    pub fn with_max_listing_length(mut self, max_listing_length: usize) -> Self {
        self.config.deep_storage.max_listing_length = max_listing_length;
        self
    }

    /// Replace the whole deep storage section.
    pub fn with_deep_storage(mut self, deep_storage: DeepStorageConfig) -> Self {
        self.config.deep_storage = deep_storage;
        self
    }

    pub fn build(self) -> Configuration {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = TestConfigBuilder::new().build();
        assert_eq!(config.storage.dsn, "memory://");
        assert!(config.deep_storage.purge_location().is_none());
    }

    #[test]
    fn test_builder_with_purge_location() {
        let config = TestConfigBuilder::new()
            .in_memory()
            .with_purge_location("segments", "druid/segments")
            .with_max_listing_length(5)
            .build();

        assert_eq!(
            config.deep_storage.purge_location(),
            Some(("segments", "druid/segments"))
        );
        assert_eq!(config.deep_storage.max_listing_length, 5);
    }

    #[test]
    fn test_builder_with_deep_storage_replaces_section() {
        let config = TestConfigBuilder::new()
            .with_purge_location("segments", "druid/segments")
            .with_deep_storage(DeepStorageConfig {
                bucket: Some("archive".to_string()),
                base_key: None,
                max_listing_length: 50,
            })
            .build();

        assert_eq!(config.deep_storage.bucket.as_deref(), Some("archive"));
        assert!(config.deep_storage.purge_location().is_none());
        assert_eq!(config.deep_storage.max_listing_length, 50);
    }
}
