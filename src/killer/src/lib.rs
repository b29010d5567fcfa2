//! Deep storage segment killer.
//!
//! Permanently removes segment files from object storage once the metadata
//! layer has marked them unused. Three call shapes are supported:
//!
//! - a single segment, existence-checked key by key
//! - a list of segments, deleted with bounded multi-key requests that keep
//!   going past failed chunks and report every failure once at the end
//! - a full purge of the configured bucket and base key
//!
//! Deleting a file that is already gone is never an error, so every
//! operation can be repeated after a partial failure.
//!
//! ```no_run
//! use common::config::DeepStorageConfig;
//! use killer::{Segment, SegmentKiller};
//!
//! # async fn run() -> Result<(), killer::KillError> {
//! let killer = SegmentKiller::from_dsn("s3://minio:9000", DeepStorageConfig::default());
//! killer
//!     .kill(&Segment::new("wiki_v1", "deep", "wiki/v1/0/index.zip"))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod batch;
pub mod client;
pub mod error;
pub mod killer;
pub mod lazy;
pub mod purge;
pub mod segment;
pub mod single;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use backend::ObjectStoreBackend;
pub use batch::BatchDeleter;
pub use client::{ClientError, KeyFailure, ListPage, MAX_KEYS_PER_DELETE, ObjectStoreClient};
pub use error::{BatchDeleteError, ChunkFailure, KillError, PurgeFailure};
pub use killer::SegmentKiller;
pub use lazy::LazyClient;
pub use purge::{PrefixPurger, PurgeSummary};
pub use segment::{Segment, SegmentKeys, parse_segments};
pub use single::SingleSegmentKiller;
