//! Chunked multi-key deletion that keeps going past failed chunks.
//!
//! Every chunk is attempted. Failures are collected in attempt order and
//! reported once at the end, so one throttled request does not leave the rest
//! of the keys behind, and the report names every key still known to exist.

use std::sync::Arc;

use crate::client::{MAX_KEYS_PER_DELETE, ObjectStoreClient};
use crate::error::{BatchDeleteError, ChunkFailure};

pub struct BatchDeleter {
    client: Arc<dyn ObjectStoreClient>,
    chunk_size: usize,
}

impl BatchDeleter {
    pub fn new(client: Arc<dyn ObjectStoreClient>) -> Self {
        Self::with_chunk_size(client, MAX_KEYS_PER_DELETE)
    }

    /// Use chunks of `chunk_size` keys, clamped to `1..=MAX_KEYS_PER_DELETE`.
    pub fn with_chunk_size(client: Arc<dyn ObjectStoreClient>, chunk_size: usize) -> Self {
        Self {
            client,
            chunk_size: chunk_size.clamp(1, MAX_KEYS_PER_DELETE),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Delete `keys` from `bucket` in chunks.
    ///
    /// # Errors
    ///
    /// Returns a [`BatchDeleteError`] after all chunks were attempted if any of
    /// them failed.
    pub async fn delete_all(&self, bucket: &str, keys: &[String]) -> Result<(), BatchDeleteError> {
        let mut failures = Vec::new();
        self.delete_chunks(bucket, keys, &mut failures).await;
        match BatchDeleteError::from_failures(bucket, failures) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Attempt every chunk of `keys`, appending failed chunks to `failures`.
    pub(crate) async fn delete_chunks(
        &self,
        bucket: &str,
        keys: &[String],
        failures: &mut Vec<ChunkFailure>,
    ) {
        if keys.is_empty() {
            return;
        }

        let total_chunks = keys.len().div_ceil(self.chunk_size);
        for (chunk_idx, chunk) in keys.chunks(self.chunk_size).enumerate() {
            tracing::info!(
                bucket = %bucket,
                chunk = chunk_idx + 1,
                total_chunks = total_chunks,
                keys = chunk.len(),
                "Removing segment files from deep storage"
            );
            tracing::debug!(bucket = %bucket, keys = ?chunk, "Chunk keys");

            if let Err(error) = self.client.delete_many(bucket, chunk).await {
                tracing::warn!(
                    bucket = %bucket,
                    chunk = chunk_idx + 1,
                    error = %error,
                    "Failed to delete chunk, continuing with remaining chunks"
                );
                failures.push(ChunkFailure {
                    attempted: chunk.to_vec(),
                    error,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Fault, RecordingClient};

    fn keys(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("ds/{i:05}/index.zip")).collect()
    }

    #[tokio::test]
    async fn test_empty_keys_make_no_calls() {
        let client = Arc::new(RecordingClient::new());
        let deleter = BatchDeleter::new(client.clone());

        deleter.delete_all("deep", &[]).await.unwrap();

        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_chunks_bounded_by_protocol_limit() {
        let all = keys(2002);
        let client = Arc::new(RecordingClient::with_objects("deep", all.clone()));
        let deleter = BatchDeleter::new(client.clone());

        deleter.delete_all("deep", &all).await.unwrap();

        let sizes: Vec<usize> = client.delete_many_calls().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![1000, 1000, 2]);
        assert_eq!(client.object_count("deep"), 0);
    }

    #[tokio::test]
    async fn test_chunk_count_is_ceiling() {
        for (total, expected) in [(1, 1), (999, 1), (1000, 1), (1001, 2), (3000, 3), (3001, 4)] {
            let client = Arc::new(RecordingClient::new());
            let deleter = BatchDeleter::new(client.clone());

            deleter.delete_all("deep", &keys(total)).await.unwrap();

            let calls = client.delete_many_calls();
            assert_eq!(calls.len(), expected, "total keys {total}");
            assert!(calls.iter().all(|chunk| chunk.len() <= MAX_KEYS_PER_DELETE));
            assert_eq!(calls.iter().map(Vec::len).sum::<usize>(), total);
        }
    }

    #[tokio::test]
    async fn test_chunks_preserve_order() {
        let all = keys(5);
        let client = Arc::new(RecordingClient::new());
        let deleter = BatchDeleter::with_chunk_size(client.clone(), 2);

        deleter.delete_all("deep", &all).await.unwrap();

        let flattened: Vec<String> = client.delete_many_calls().concat();
        assert_eq!(flattened, all);
    }

    #[test]
    fn test_chunk_size_is_clamped() {
        let client = Arc::new(RecordingClient::new());
        assert_eq!(BatchDeleter::with_chunk_size(client.clone(), 0).chunk_size(), 1);
        assert_eq!(BatchDeleter::with_chunk_size(client.clone(), 1024).chunk_size(), 1000);
        assert_eq!(BatchDeleter::with_chunk_size(client, 10).chunk_size(), 10);
    }

    #[tokio::test]
    async fn test_failed_chunk_does_not_stop_later_chunks() {
        let all = keys(1500);
        let client = Arc::new(RecordingClient::with_objects("deep", all.clone()));
        client.fail_delete_many(0, Fault::Partial(all[..1000].to_vec()));
        let deleter = BatchDeleter::new(client.clone());

        let err = deleter.delete_all("deep", &all).await.unwrap_err();

        // The second chunk was still attempted and went through
        assert_eq!(client.delete_many_calls().len(), 2);
        assert!(all[1000..].iter().all(|key| !client.contains("deep", key)));

        assert_eq!(err.bucket(), "deep");
        assert_eq!(err.not_deleted(), &all[..1000]);
        assert!(err.suppressed().is_empty());
    }

    #[tokio::test]
    async fn test_opaque_failure_reports_no_keys() {
        let all = keys(1001);
        let client = Arc::new(RecordingClient::with_objects("deep", all.clone()));
        client.fail_delete_many(0, Fault::Service("SlowDown".to_string()));
        let deleter = BatchDeleter::new(client.clone());

        let err = deleter.delete_all("deep", &all).await.unwrap_err();

        assert_eq!(client.delete_many_calls().len(), 2);
        assert!(err.not_deleted().is_empty());
        assert_eq!(err.primary().attempted.len(), 1000);
        assert!(err.primary().to_string().contains("SlowDown"));
    }

    #[tokio::test]
    async fn test_every_failure_is_kept_in_attempt_order() {
        let all = keys(3000);
        let client = Arc::new(RecordingClient::with_objects("deep", all.clone()));
        client.fail_delete_many(0, Fault::Service("InternalError".to_string()));
        client.fail_delete_many(2, Fault::Partial(vec![all[2500].clone()]));
        let deleter = BatchDeleter::new(client.clone());

        let err = deleter.delete_all("deep", &all).await.unwrap_err();

        assert_eq!(client.delete_many_calls().len(), 3);
        assert!(err.primary().to_string().contains("InternalError"));
        assert_eq!(err.suppressed().len(), 1);
        assert_eq!(err.suppressed()[0].attempted, &all[2000..]);
        assert_eq!(err.not_deleted(), [all[2500].clone()]);
        assert!(client.contains("deep", &all[0]));
        assert!(!client.contains("deep", &all[1500]));
    }
}
