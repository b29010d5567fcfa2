use std::path::Path;

use serde::{Deserialize, Serialize};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

/// Default file consulted by [`Configuration::load`].
pub const DEFAULT_CONFIG_FILE: &str = "deepstore.toml";

/// Prefix for environment overrides, nested with `__`.
pub const ENV_PREFIX: &str = "DEEPSTORE__";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Object store DSN (`memory://`, `file:///path`, `s3://host/bucket`)
    pub dsn: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dsn: String::from("memory://"),
        }
    }
}

/// Deep storage location that segments are pushed to and killed from.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeepStorageConfig {
    /// Bucket holding segment files.
    ///
    /// Env: DEEPSTORE__DEEP_STORAGE__BUCKET
    #[serde(default)]
    pub bucket: Option<String>,

    /// Key prefix under which all segment files live.
    ///
    /// Env: DEEPSTORE__DEEP_STORAGE__BASE_KEY
    #[serde(default)]
    pub base_key: Option<String>,

    /// Maximum number of keys requested per listing page.
    ///
    /// Default: 1024
    ///
    /// Env: DEEPSTORE__DEEP_STORAGE__MAX_LISTING_LENGTH
    #[serde(default = "default_max_listing_length")]
    pub max_listing_length: usize,
}

fn default_max_listing_length() -> usize {
    1024
}

impl Default for DeepStorageConfig {
    fn default() -> Self {
        Self {
            bucket: None,
            base_key: None,
            max_listing_length: default_max_listing_length(),
        }
    }
}

impl DeepStorageConfig {
    /// Validate the deep storage configuration.
    ///
    /// `bucket` and `base_key` stay optional here: they are only required by a
    /// full purge, which checks them itself.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_listing_length == 0 {
            anyhow::bail!(
                "max_listing_length must be positive, got {}",
                self.max_listing_length
            );
        }

        if matches!(&self.bucket, Some(bucket) if bucket.is_empty()) {
            anyhow::bail!("bucket cannot be empty when set");
        }

        Ok(())
    }

    /// Returns `(bucket, base_key)` when both are configured.
    pub fn purge_location(&self) -> Option<(&str, &str)> {
        match (&self.bucket, &self.base_key) {
            (Some(bucket), Some(base_key)) => Some((bucket.as_str(), base_key.as_str())),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Configuration {
    /// Object storage connection
    #[serde(default)]
    pub storage: StorageConfig,
    /// Segment location in deep storage
    #[serde(default)]
    pub deep_storage: DeepStorageConfig,
}

impl Configuration {
    fn figment() -> Figment {
        Figment::from(Serialized::defaults(Configuration::default()))
    }

    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config = Self::figment()
            .merge(Toml::file(DEFAULT_CONFIG_FILE))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(Box::new)?;

        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, Box<figment::Error>> {
        let config = Self::figment()
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(Box::new)?;

        Ok(config)
    }
}
