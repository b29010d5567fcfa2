//! Object store operations the killer depends on.
//!
//! Every call is addressed by bucket so a single client can serve segments
//! spread across buckets. Implementations must be shareable across tasks.

use async_trait::async_trait;
use std::fmt;

use crate::error::BoxError;

/// Protocol limit on keys in one multi-key delete request.
pub const MAX_KEYS_PER_DELETE: usize = 1000;

/// One page of a prefix listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    pub keys: Vec<String>,
    /// Cursor for the next page, `None` once the listing is exhausted.
    pub next_continuation: Option<String>,
}

/// A key a multi-key delete reported as not deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFailure {
    pub key: String,
    pub message: String,
}

impl fmt::Display for KeyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.message)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// A whole request failed (network, permissions, throttling, ...).
    #[error("object store request failed: {0}")]
    Service(#[from] object_store::Error),

    /// The store for a bucket could not be constructed.
    #[error("no object store available for bucket {bucket}: {source}")]
    Unavailable {
        bucket: String,
        #[source]
        source: BoxError,
    },

    /// A multi-key delete went through but some keys were not deleted.
    #[error("{} of {attempted} keys could not be deleted", failed.len())]
    PartialFailure {
        attempted: usize,
        failed: Vec<KeyFailure>,
    },
}

impl ClientError {
    /// Keys this error proves were not deleted. Empty for errors that do not
    /// carry per-key detail.
    pub fn failed_keys(&self) -> impl Iterator<Item = &str> {
        let failed: &[KeyFailure] = match self {
            ClientError::PartialFailure { failed, .. } => failed.as_slice(),
            _ => &[],
        };
        failed.iter().map(|failure| failure.key.as_str())
    }
}

#[async_trait]
pub trait ObjectStoreClient: Send + Sync {
    async fn exists(&self, bucket: &str, key: &str) -> Result<bool, ClientError>;

    /// Delete one object. Deleting an absent object succeeds.
    async fn delete_one(&self, bucket: &str, key: &str) -> Result<(), ClientError>;

    /// Quiet multi-key delete: only failures are reported. Absent objects
    /// count as deleted. Callers keep `keys` within [`MAX_KEYS_PER_DELETE`].
    async fn delete_many(&self, bucket: &str, keys: &[String]) -> Result<(), ClientError>;

    /// List up to `max_keys` keys under `prefix`, resuming after
    /// `continuation` when given.
    async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        max_keys: usize,
        continuation: Option<&str>,
    ) -> Result<ListPage, ClientError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_keys_from_partial_failure() {
        let err = ClientError::PartialFailure {
            attempted: 3,
            failed: vec![
                KeyFailure {
                    key: "a/index.zip".to_string(),
                    message: "AccessDenied".to_string(),
                },
                KeyFailure {
                    key: "b/index.zip".to_string(),
                    message: "InternalError".to_string(),
                },
            ],
        };

        let keys: Vec<&str> = err.failed_keys().collect();
        assert_eq!(keys, vec!["a/index.zip", "b/index.zip"]);
        assert_eq!(err.to_string(), "2 of 3 keys could not be deleted");
    }

    #[test]
    fn test_opaque_error_names_no_keys() {
        let err = ClientError::Service(object_store::Error::Generic {
            store: "S3",
            source: "throttled".into(),
        });
        assert_eq!(err.failed_keys().count(), 0);
    }
}
