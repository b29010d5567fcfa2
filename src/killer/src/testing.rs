//! In-memory [`ObjectStoreClient`] that records every call and can be told to
//! fail specific requests.
//!
//! Available with the `testing` feature or during tests.

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

use crate::client::{ClientError, KeyFailure, ListPage, ObjectStoreClient};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Exists {
        bucket: String,
        key: String,
    },
    DeleteOne {
        bucket: String,
        key: String,
    },
    DeleteMany {
        bucket: String,
        keys: Vec<String>,
    },
    List {
        bucket: String,
        prefix: String,
        max_keys: usize,
        continuation: Option<String>,
    },
}

impl Call {
    pub fn is_network_mutation(&self) -> bool {
        matches!(self, Call::DeleteOne { .. } | Call::DeleteMany { .. })
    }
}

/// How an injected failure surfaces.
#[derive(Debug, Clone)]
pub enum Fault {
    /// The whole request fails, nothing is deleted.
    Service(String),
    /// The listed keys survive and are reported, the rest of the chunk is deleted.
    Partial(Vec<String>),
}

#[derive(Default)]
struct State {
    objects: BTreeSet<(String, String)>,
    calls: Vec<Call>,
    delete_many_count: usize,
    delete_many_faults: HashMap<usize, Fault>,
    list_count: usize,
    list_faults: HashMap<usize, String>,
    exists_faults: HashMap<String, String>,
    delete_one_faults: HashMap<String, String>,
}

#[derive(Default)]
pub struct RecordingClient {
    state: Mutex<State>,
}

fn service_error(message: &str) -> ClientError {
    ClientError::Service(object_store::Error::Generic {
        store: "RecordingClient",
        source: message.to_string().into(),
    })
}

impl RecordingClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_objects<I, K>(bucket: &str, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let client = Self::new();
        for key in keys {
            client.put(bucket, key);
        }
        client
    }

    pub fn put(&self, bucket: &str, key: impl Into<String>) {
        let mut state = self.state.lock().unwrap();
        state.objects.insert((bucket.to_string(), key.into()));
    }

    pub fn contains(&self, bucket: &str, key: &str) -> bool {
        let state = self.state.lock().unwrap();
        state.objects.contains(&(bucket.to_string(), key.to_string()))
    }

    pub fn object_count(&self, bucket: &str) -> usize {
        let state = self.state.lock().unwrap();
        state.objects.iter().filter(|(b, _)| b == bucket).count()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Key lists of every multi-key delete, in call order.
    pub fn delete_many_calls(&self) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::DeleteMany { keys, .. } => Some(keys),
                _ => None,
            })
            .collect()
    }

    /// Keys of every single-key delete, in call order.
    pub fn delete_one_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::DeleteOne { key, .. } => Some(key),
                _ => None,
            })
            .collect()
    }

    pub fn list_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::List { .. }))
            .count()
    }

    /// Fail the `nth` (0-based) multi-key delete.
    pub fn fail_delete_many(&self, nth: usize, fault: Fault) {
        self.state.lock().unwrap().delete_many_faults.insert(nth, fault);
    }

    /// Fail the `nth` (0-based) listing request.
    pub fn fail_list(&self, nth: usize, message: &str) {
        self.state
            .lock()
            .unwrap()
            .list_faults
            .insert(nth, message.to_string());
    }

    /// Fail existence checks for `key`.
    pub fn fail_exists(&self, key: &str, message: &str) {
        self.state
            .lock()
            .unwrap()
            .exists_faults
            .insert(key.to_string(), message.to_string());
    }

    /// Fail single deletes of `key`.
    pub fn fail_delete_one(&self, key: &str, message: &str) {
        self.state
            .lock()
            .unwrap()
            .delete_one_faults
            .insert(key.to_string(), message.to_string());
    }
}

#[async_trait]
impl ObjectStoreClient for RecordingClient {
    async fn exists(&self, bucket: &str, key: &str) -> Result<bool, ClientError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Exists {
            bucket: bucket.to_string(),
            key: key.to_string(),
        });
        if let Some(message) = state.exists_faults.get(key) {
            return Err(service_error(message));
        }
        Ok(state.objects.contains(&(bucket.to_string(), key.to_string())))
    }

    async fn delete_one(&self, bucket: &str, key: &str) -> Result<(), ClientError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::DeleteOne {
            bucket: bucket.to_string(),
            key: key.to_string(),
        });
        if let Some(message) = state.delete_one_faults.get(key) {
            return Err(service_error(message));
        }
        state.objects.remove(&(bucket.to_string(), key.to_string()));
        Ok(())
    }

    async fn delete_many(&self, bucket: &str, keys: &[String]) -> Result<(), ClientError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::DeleteMany {
            bucket: bucket.to_string(),
            keys: keys.to_vec(),
        });
        let nth = state.delete_many_count;
        state.delete_many_count += 1;

        match state.delete_many_faults.get(&nth).cloned() {
            Some(Fault::Service(message)) => Err(service_error(&message)),
            Some(Fault::Partial(survivors)) => {
                for key in keys.iter().filter(|key| !survivors.contains(key)) {
                    state.objects.remove(&(bucket.to_string(), key.clone()));
                }
                Err(ClientError::PartialFailure {
                    attempted: keys.len(),
                    failed: survivors
                        .into_iter()
                        .map(|key| KeyFailure {
                            key,
                            message: "AccessDenied".to_string(),
                        })
                        .collect(),
                })
            }
            None => {
                for key in keys {
                    state.objects.remove(&(bucket.to_string(), key.clone()));
                }
                Ok(())
            }
        }
    }

    async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        max_keys: usize,
        continuation: Option<&str>,
    ) -> Result<ListPage, ClientError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::List {
            bucket: bucket.to_string(),
            prefix: prefix.to_string(),
            max_keys,
            continuation: continuation.map(str::to_string),
        });
        let nth = state.list_count;
        state.list_count += 1;
        if let Some(message) = state.list_faults.get(&nth) {
            return Err(service_error(message));
        }

        let mut keys: Vec<String> = state
            .objects
            .iter()
            .filter(|(b, key)| {
                b == bucket
                    && key.starts_with(prefix)
                    && continuation.is_none_or(|token| key.as_str() > token)
            })
            .map(|(_, key)| key.clone())
            .take(max_keys + 1)
            .collect();

        let has_more = keys.len() > max_keys;
        keys.truncate(max_keys);
        let next_continuation = if has_more { keys.last().cloned() } else { None };

        Ok(ListPage {
            keys,
            next_continuation,
        })
    }
}
