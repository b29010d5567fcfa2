use crate::client::ClientError;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum KillError {
    #[error("Couldn't kill segment[{segment_id}]: malformed load spec: {reason}")]
    LoadSpec { segment_id: String, reason: String },

    #[error("Couldn't kill segment[{segment_id}]: {source}")]
    Segment {
        segment_id: String,
        #[source]
        source: ClientError,
    },

    #[error(transparent)]
    Batch(#[from] BatchDeleteError),

    #[error(
        "Cannot delete all segment files from deep storage since deep_storage.bucket and deep_storage.base_key are not both set"
    )]
    Config,

    #[error("Failed to delete segment files under [bucket: '{bucket}' prefix: '{prefix}']: {source}")]
    Purge {
        bucket: String,
        prefix: String,
        #[source]
        source: PurgeFailure,
    },

    #[error("Failed to construct object store client: {0}")]
    Client(#[source] BoxError),
}

/// Why a prefix purge stopped or finished with errors.
#[derive(Debug, thiserror::Error)]
pub enum PurgeFailure {
    #[error("listing failed: {0}")]
    Listing(#[source] ClientError),

    #[error(transparent)]
    Deletion(#[from] BatchDeleteError),
}

/// One multi-key delete request that failed.
#[derive(Debug, thiserror::Error)]
#[error("delete of {} keys failed: {error}", attempted.len())]
pub struct ChunkFailure {
    pub attempted: Vec<String>,
    #[source]
    pub error: ClientError,
}

/// Every failed chunk of a batch delete, reported once all chunks were tried.
///
/// `not_deleted` only names keys some error proved were left behind; chunks
/// that failed without per-key detail contribute no names.
#[derive(Debug, thiserror::Error)]
#[error("For bucket: {bucket} unable to delete some or all segments {not_deleted:?}")]
pub struct BatchDeleteError {
    bucket: String,
    not_deleted: Vec<String>,
    #[source]
    primary: ChunkFailure,
    suppressed: Vec<ChunkFailure>,
}

impl BatchDeleteError {
    /// Aggregate `failures` in attempt order. `None` when nothing failed.
    pub fn from_failures(bucket: impl Into<String>, failures: Vec<ChunkFailure>) -> Option<Self> {
        let mut failures = failures.into_iter();
        let primary = failures.next()?;
        let suppressed: Vec<ChunkFailure> = failures.collect();

        let mut not_deleted: Vec<String> = Vec::new();
        for key in std::iter::once(&primary)
            .chain(suppressed.iter())
            .flat_map(|failure| failure.error.failed_keys())
        {
            if !not_deleted.iter().any(|seen| seen == key) {
                not_deleted.push(key.to_string());
            }
        }

        Some(Self {
            bucket: bucket.into(),
            not_deleted,
            primary,
            suppressed,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Keys known to still be present, safe to retry.
    pub fn not_deleted(&self) -> &[String] {
        &self.not_deleted
    }

    /// The first chunk failure, also exposed as the error source.
    pub fn primary(&self) -> &ChunkFailure {
        &self.primary
    }

    /// Chunk failures after the first, in attempt order.
    pub fn suppressed(&self) -> &[ChunkFailure] {
        &self.suppressed
    }

    /// All chunk failures in attempt order.
    pub fn failures(&self) -> impl Iterator<Item = &ChunkFailure> {
        std::iter::once(&self.primary).chain(self.suppressed.iter())
    }
}
