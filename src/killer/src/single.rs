use std::sync::Arc;

use crate::client::{ClientError, ObjectStoreClient};
use crate::error::KillError;
use crate::segment::{self, Segment};

/// Existence-gated deletion of one segment's files.
pub struct SingleSegmentKiller {
    client: Arc<dyn ObjectStoreClient>,
}

impl SingleSegmentKiller {
    pub fn new(client: Arc<dyn ObjectStoreClient>) -> Self {
        Self { client }
    }

    /// Delete the segment's index file, then its descriptor, whichever exist.
    ///
    /// The first client error ends the call; nothing is retried.
    pub async fn kill(&self, segment: &Segment) -> Result<(), KillError> {
        let keys = segment::resolve(segment)?;

        self.remove_if_exists(&keys.bucket, &keys.primary, "index")
            .await
            .map_err(|source| wrap(segment, source))?;

        // descriptor.json used to hold segment metadata in deep storage. It is
        // not written anymore, but old segments may still have one.
        self.remove_if_exists(&keys.bucket, &keys.descriptor, "descriptor")
            .await
            .map_err(|source| wrap(segment, source))?;

        Ok(())
    }

    async fn remove_if_exists(
        &self,
        bucket: &str,
        key: &str,
        kind: &'static str,
    ) -> Result<(), ClientError> {
        if self.client.exists(bucket, key).await? {
            tracing::info!(bucket = %bucket, key = %key, kind, "Removing {kind} file from deep storage");
            self.client.delete_one(bucket, key).await?;
        }
        Ok(())
    }
}

fn wrap(segment: &Segment, source: ClientError) -> KillError {
    KillError::Segment {
        segment_id: segment.id.clone(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Call, RecordingClient};

    const PRIMARY: &str = "ds/2024-01-01/v1/0/index.zip";
    const DESCRIPTOR: &str = "ds/2024-01-01/v1/0/descriptor.json";

    fn segment() -> Segment {
        Segment::new("ds_2024-01-01_v1", "deep", PRIMARY)
    }

    #[tokio::test]
    async fn test_deletes_primary_then_descriptor() {
        let client = Arc::new(RecordingClient::with_objects("deep", [PRIMARY, DESCRIPTOR]));
        let killer = SingleSegmentKiller::new(client.clone());

        killer.kill(&segment()).await.unwrap();

        assert_eq!(client.delete_one_calls(), vec![PRIMARY, DESCRIPTOR]);
        assert!(client.delete_many_calls().is_empty());
        assert_eq!(client.object_count("deep"), 0);
    }

    #[tokio::test]
    async fn test_only_descriptor_present() {
        let client = Arc::new(RecordingClient::with_objects("deep", [DESCRIPTOR]));
        let killer = SingleSegmentKiller::new(client.clone());

        killer.kill(&segment()).await.unwrap();

        assert_eq!(client.delete_one_calls(), vec![DESCRIPTOR]);
    }

    #[tokio::test]
    async fn test_nothing_present_deletes_nothing() {
        let client = Arc::new(RecordingClient::new());
        let killer = SingleSegmentKiller::new(client.clone());

        killer.kill(&segment()).await.unwrap();

        let calls = client.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|call| matches!(call, Call::Exists { .. })));
        assert!(!calls.iter().any(Call::is_network_mutation));
    }

    #[tokio::test]
    async fn test_client_error_names_segment() {
        let client = Arc::new(RecordingClient::with_objects("deep", [PRIMARY, DESCRIPTOR]));
        client.fail_delete_one(PRIMARY, "AccessDenied");
        let killer = SingleSegmentKiller::new(client.clone());

        let err = killer.kill(&segment()).await.unwrap_err();

        assert!(matches!(
            &err,
            KillError::Segment { segment_id, source: ClientError::Service(_) }
                if segment_id == "ds_2024-01-01_v1"
        ));
        assert!(err.to_string().contains("Couldn't kill segment[ds_2024-01-01_v1]"));
        // Fatal for the call, the descriptor is left alone
        assert!(client.contains("deep", DESCRIPTOR));
    }

    #[tokio::test]
    async fn test_existence_check_failure_is_fatal() {
        let client = Arc::new(RecordingClient::with_objects("deep", [PRIMARY]));
        client.fail_exists(PRIMARY, "ExpiredToken");
        let killer = SingleSegmentKiller::new(client.clone());

        let err = killer.kill(&segment()).await.unwrap_err();

        assert!(matches!(err, KillError::Segment { .. }));
        assert!(client.delete_one_calls().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_load_spec_makes_no_calls() {
        let client = Arc::new(RecordingClient::new());
        let killer = SingleSegmentKiller::new(client.clone());

        let err = killer
            .kill(&Segment::new("bad", "deep", "index.zip"))
            .await
            .unwrap_err();

        assert!(matches!(err, KillError::LoadSpec { .. }));
        assert!(client.calls().is_empty());
    }
}
