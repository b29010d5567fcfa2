use std::sync::Arc;

use common::config::DeepStorageConfig;

use crate::backend::ObjectStoreBackend;
use crate::batch::BatchDeleter;
use crate::client::ObjectStoreClient;
use crate::error::{BoxError, KillError};
use crate::lazy::LazyClient;
use crate::purge::{PrefixPurger, PurgeSummary, all_keys};
use crate::segment::{self, Segment, SegmentKeys};
use crate::single::SingleSegmentKiller;

/// Removes segment files from deep storage.
///
/// The object store client is built on the first call that needs one and
/// shared by every call after that.
#[derive(Debug)]
pub struct SegmentKiller {
    client: LazyClient,
    config: DeepStorageConfig,
}

impl SegmentKiller {
    pub fn new(client: LazyClient, config: DeepStorageConfig) -> Self {
        Self { client, config }
    }

    /// Killer talking to the object stores behind `dsn`.
    pub fn from_dsn(dsn: impl Into<String>, config: DeepStorageConfig) -> Self {
        let dsn = dsn.into();
        let client = LazyClient::new(move || {
            common::storage::validate_dsn(&dsn).map_err(BoxError::from)?;
            Ok(Arc::new(ObjectStoreBackend::from_dsn(dsn.clone())) as Arc<dyn ObjectStoreClient>)
        });
        Self::new(client, config)
    }

    pub fn config(&self) -> &DeepStorageConfig {
        &self.config
    }

    fn client(&self) -> Result<Arc<dyn ObjectStoreClient>, KillError> {
        self.client.get().map(Arc::clone)
    }

    /// Delete one segment's files, checking for each one first.
    pub async fn kill(&self, segment: &Segment) -> Result<(), KillError> {
        SingleSegmentKiller::new(self.client()?).kill(segment).await
    }

    /// Delete the files of all `segments`.
    ///
    /// All segments are assumed to live in the bucket of the first one.
    pub async fn kill_segments(&self, segments: &[Segment]) -> Result<(), KillError> {
        match segments {
            [] => return Ok(()),
            [only] => return self.kill(only).await,
            _ => {}
        }

        let resolved: Vec<SegmentKeys> = segments
            .iter()
            .map(segment::resolve)
            .collect::<Result<_, _>>()?;
        let Some(bucket) = resolved.first().map(|first| first.bucket.clone()) else {
            return Ok(());
        };
        let keys: Vec<String> = resolved
            .into_iter()
            .flat_map(|resolved| [resolved.primary, resolved.descriptor])
            .collect();

        tracing::info!(
            bucket = %bucket,
            segments = segments.len(),
            keys = keys.len(),
            "Killing segments"
        );

        BatchDeleter::new(self.client()?)
            .delete_all(&bucket, &keys)
            .await?;
        Ok(())
    }

    /// Delete every file under the configured bucket and base key.
    pub async fn kill_all(&self) -> Result<PurgeSummary, KillError> {
        self.kill_all_matching(all_keys).await
    }

    /// Delete the files under the configured bucket and base key accepted by
    /// `predicate`.
    pub async fn kill_all_matching<P>(&self, predicate: P) -> Result<PurgeSummary, KillError>
    where
        P: Fn(&str) -> bool + Send + Sync,
    {
        let (bucket, base_key) = self.config.purge_location().ok_or(KillError::Config)?;

        tracing::info!(
            bucket = %bucket,
            prefix = %base_key,
            "Deleting all segment files from deep storage"
        );

        let result = match self.client() {
            Ok(client) => {
                PrefixPurger::new(client)
                    .purge(bucket, base_key, self.config.max_listing_length, predicate)
                    .await
            }
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            tracing::error!(error = %e, "Error occurred while deleting segment files from deep storage");
        }
        result
    }
}
