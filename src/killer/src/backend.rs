//! [`ObjectStoreClient`] on top of `object_store`.
//!
//! `object_store` instances are bound to a single bucket, so the backend keeps
//! one store per bucket, created on first use from the storage DSN.
//!
//! Listings are paged off a single open stream. The stream is parked between
//! pages under the continuation token it handed out, so paging does not rely
//! on the store listing keys in order. Local filesystems do not.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use object_store::path::Path as ObjectPath;
use object_store::{ObjectMeta, ObjectStore};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use crate::client::{ClientError, KeyFailure, ListPage, ObjectStoreClient};
use crate::error::BoxError;

type StoreFactory = dyn Fn(&str) -> anyhow::Result<Arc<dyn ObjectStore>> + Send + Sync;

type Listing = BoxStream<'static, object_store::Result<ObjectMeta>>;

/// An open listing waiting for its next page.
struct Cursor {
    listing: Listing,
    peeked: Option<ObjectMeta>,
}

impl Cursor {
    fn new(listing: Listing) -> Self {
        Self {
            listing,
            peeked: None,
        }
    }

    async fn next(&mut self) -> object_store::Result<Option<ObjectMeta>> {
        match self.peeked.take() {
            Some(meta) => Ok(Some(meta)),
            None => self.listing.try_next().await,
        }
    }

    async fn has_more(&mut self) -> object_store::Result<bool> {
        if self.peeked.is_none() {
            self.peeked = self.listing.try_next().await?;
        }
        Ok(self.peeked.is_some())
    }
}

/// Parked cursors by `(bucket, prefix)`, with the token they continue from.
type Cursors = HashMap<(String, String), (String, Cursor)>;

pub struct ObjectStoreBackend {
    stores: RwLock<HashMap<String, Arc<dyn ObjectStore>>>,
    factory: Box<StoreFactory>,
    cursors: Mutex<Cursors>,
}

/// Object path for `key`, taken verbatim.
///
/// `ObjectPath::from` would percent-encode reserved characters and address a
/// different object than the one that was listed.
fn parse_path(key: &str) -> Result<ObjectPath, ClientError> {
    ObjectPath::parse(key).map_err(|e| ClientError::Service(e.into()))
}

/// Match `delete_stream` results to the keys they were issued for.
///
/// Results line up with the input unless a whole bulk request failed, in
/// which case there is no per-key attribution to be had and the batch fails
/// as one.
fn attribute_deletes(
    keys: &[&str],
    results: Vec<object_store::Result<ObjectPath>>,
) -> Result<Vec<KeyFailure>, ClientError> {
    let got = results.len();
    if got != keys.len() {
        return match results.into_iter().find_map(|result| match result {
            Err(object_store::Error::NotFound { .. }) | Ok(_) => None,
            Err(e) => Some(e),
        }) {
            Some(e) => Err(e.into()),
            None => Err(ClientError::Service(object_store::Error::Generic {
                store: "delete_stream",
                source: format!("expected {} delete results, got {got}", keys.len()).into(),
            })),
        };
    }

    Ok(keys
        .iter()
        .zip(results)
        .filter_map(|(key, result)| match result {
            Ok(_) | Err(object_store::Error::NotFound { .. }) => None,
            Err(e) => Some(KeyFailure {
                key: key.to_string(),
                message: e.to_string(),
            }),
        })
        .collect())
}

impl ObjectStoreBackend {
    /// Backend creating bucket stores from a storage DSN.
    pub fn from_dsn(dsn: impl Into<String>) -> Self {
        let dsn = dsn.into();
        Self::with_factory(move |bucket| common::storage::create_bucket_store(&dsn, bucket))
    }

    /// Backend creating bucket stores with `factory`.
    pub fn with_factory<F>(factory: F) -> Self
    where
        F: Fn(&str) -> anyhow::Result<Arc<dyn ObjectStore>> + Send + Sync + 'static,
    {
        Self {
            stores: RwLock::new(HashMap::new()),
            factory: Box::new(factory),
            cursors: Mutex::new(HashMap::new()),
        }
    }

    /// Backend serving only the given, already constructed stores.
    pub fn with_stores(stores: impl IntoIterator<Item = (String, Arc<dyn ObjectStore>)>) -> Self {
        let backend = Self::with_factory(|bucket| {
            Err(anyhow::anyhow!("no object store registered for bucket {bucket}"))
        });
        {
            let mut registered = backend
                .stores
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            registered.extend(stores);
        }
        backend
    }

    fn store(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>, ClientError> {
        if let Some(store) = self
            .stores
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(bucket)
        {
            return Ok(Arc::clone(store));
        }

        let mut stores = self
            .stores
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(store) = stores.get(bucket) {
            return Ok(Arc::clone(store));
        }

        let store = (self.factory)(bucket).map_err(|e| ClientError::Unavailable {
            bucket: bucket.to_string(),
            source: BoxError::from(e),
        })?;
        tracing::debug!(bucket = %bucket, store = %store, "Created object store for bucket");
        stores.insert(bucket.to_string(), Arc::clone(&store));
        Ok(store)
    }

    /// Remove the cursor parked for `bucket` and `prefix`, returning it when
    /// it continues from `token`.
    fn take_cursor(&self, bucket: &str, prefix: &str, token: Option<&str>) -> Option<Cursor> {
        let mut cursors = self
            .cursors
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match cursors.remove(&(bucket.to_string(), prefix.to_string())) {
            Some((parked, cursor)) if Some(parked.as_str()) == token => Some(cursor),
            _ => None,
        }
    }

    fn park_cursor(&self, bucket: &str, prefix: &str, token: String, cursor: Cursor) {
        self.cursors
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert((bucket.to_string(), prefix.to_string()), (token, cursor));
    }
}

#[async_trait]
impl ObjectStoreClient for ObjectStoreBackend {
    async fn exists(&self, bucket: &str, key: &str) -> Result<bool, ClientError> {
        let store = self.store(bucket)?;
        match store.head(&parse_path(key)?).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_one(&self, bucket: &str, key: &str) -> Result<(), ClientError> {
        let store = self.store(bucket)?;
        match store.delete(&parse_path(key)?).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_many(&self, bucket: &str, keys: &[String]) -> Result<(), ClientError> {
        if keys.is_empty() {
            return Ok(());
        }

        let store = self.store(bucket)?;

        let mut failed = Vec::new();
        let mut issued: Vec<&str> = Vec::with_capacity(keys.len());
        let mut locations = Vec::with_capacity(keys.len());
        for key in keys {
            match ObjectPath::parse(key) {
                Ok(path) => {
                    issued.push(key.as_str());
                    locations.push(Ok(path));
                }
                Err(e) => failed.push(KeyFailure {
                    key: key.clone(),
                    message: e.to_string(),
                }),
            }
        }

        if !locations.is_empty() {
            let results: Vec<object_store::Result<ObjectPath>> = store
                .delete_stream(stream::iter(locations).boxed())
                .collect()
                .await;
            failed.extend(attribute_deletes(&issued, results)?);
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(ClientError::PartialFailure {
                attempted: keys.len(),
                failed,
            })
        }
    }

    /// Page through the keys under `prefix`.
    ///
    /// A token this backend handed out continues the parked listing. Any
    /// other token restarts the listing after that key, which is only
    /// complete for stores that list in key order.
    async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        max_keys: usize,
        continuation: Option<&str>,
    ) -> Result<ListPage, ClientError> {
        let store = self.store(bucket)?;
        let max_keys = max_keys.max(1);

        let parked = self.take_cursor(bucket, prefix, continuation);
        let mut cursor = match (parked, continuation) {
            (Some(cursor), _) => cursor,
            (None, Some(token)) => Cursor::new(
                store.list_with_offset(Some(&parse_path(prefix)?), &parse_path(token)?),
            ),
            (None, None) => Cursor::new(store.list(Some(&parse_path(prefix)?))),
        };

        let mut keys = Vec::new();
        while keys.len() < max_keys {
            match cursor.next().await? {
                Some(meta) => keys.push(meta.location.to_string()),
                None => break,
            }
        }

        // Peeking one entry tells whether another page exists.
        let next_continuation = if keys.len() == max_keys && cursor.has_more().await? {
            keys.last().cloned()
        } else {
            None
        };

        if let Some(token) = &next_continuation {
            self.park_cursor(bucket, prefix, token.clone(), cursor);
        }

        Ok(ListPage {
            keys,
            next_continuation,
        })
    }
}
