//! Garbage collection of everything under a key prefix.

use std::sync::Arc;

use crate::batch::BatchDeleter;
use crate::client::ObjectStoreClient;
use crate::error::{BatchDeleteError, KillError, PurgeFailure};

/// Counters of a completed purge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeSummary {
    pub pages: usize,
    pub listed: usize,
    pub matched: usize,
}

/// Predicate matching every key.
pub fn all_keys(_key: &str) -> bool {
    true
}

pub struct PrefixPurger {
    client: Arc<dyn ObjectStoreClient>,
    deleter: BatchDeleter,
}

impl PrefixPurger {
    pub fn new(client: Arc<dyn ObjectStoreClient>) -> Self {
        let deleter = BatchDeleter::new(Arc::clone(&client));
        Self { client, deleter }
    }

    /// Delete every key under `prefix` in `bucket` accepted by `predicate`.
    ///
    /// Listing pages hold at most `max_listing_length` keys. Matching keys of
    /// each page go through the batch deleter. A failed chunk does not stop
    /// paging, a failed listing does. Deleted files stay deleted either way,
    /// so a purge can simply be run again.
    pub async fn purge<P>(
        &self,
        bucket: &str,
        prefix: &str,
        max_listing_length: usize,
        predicate: P,
    ) -> Result<PurgeSummary, KillError>
    where
        P: Fn(&str) -> bool + Send + Sync,
    {
        let max_keys = max_listing_length.max(1);
        let mut summary = PurgeSummary::default();
        let mut failures = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let page = self
                .client
                .list(bucket, prefix, max_keys, continuation.as_deref())
                .await
                .map_err(|source| purge_error(bucket, prefix, PurgeFailure::Listing(source)))?;

            summary.pages += 1;
            summary.listed += page.keys.len();

            let matching: Vec<String> = page
                .keys
                .into_iter()
                .filter(|key| predicate(key))
                .collect();
            summary.matched += matching.len();

            tracing::debug!(
                bucket = %bucket,
                prefix = %prefix,
                page = summary.pages,
                matching = matching.len(),
                "Listed page of segment files"
            );

            self.deleter
                .delete_chunks(bucket, &matching, &mut failures)
                .await;

            match page.next_continuation {
                Some(next) => continuation = Some(next),
                None => break,
            }
        }

        if let Some(err) = BatchDeleteError::from_failures(bucket, failures) {
            return Err(purge_error(bucket, prefix, PurgeFailure::Deletion(err)));
        }

        tracing::info!(
            bucket = %bucket,
            prefix = %prefix,
            pages = summary.pages,
            listed = summary.listed,
            deleted = summary.matched,
            "Purged segment files"
        );

        Ok(summary)
    }
}

fn purge_error(bucket: &str, prefix: &str, source: PurgeFailure) -> KillError {
    KillError::Purge {
        bucket: bucket.to_string(),
        prefix: prefix.to_string(),
        source,
    }
}
