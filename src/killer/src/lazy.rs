//! Deferred client construction.
//!
//! Killers get wired up whenever the deletion subsystem is loaded, even if no
//! segment is ever killed. Building an object store client validates
//! credentials and endpoints, so it waits until the first call that needs it.

use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::Arc;

use crate::client::ObjectStoreClient;
use crate::error::{BoxError, KillError};

type ClientInit = dyn Fn() -> Result<Arc<dyn ObjectStoreClient>, BoxError> + Send + Sync;

/// Builds the client on first use and hands out the same instance afterwards.
///
/// A failed build is not cached; the next call tries again.
pub struct LazyClient {
    cell: OnceCell<Arc<dyn ObjectStoreClient>>,
    init: Box<ClientInit>,
}

impl LazyClient {
    pub fn new<F>(init: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn ObjectStoreClient>, BoxError> + Send + Sync + 'static,
    {
        Self {
            cell: OnceCell::new(),
            init: Box::new(init),
        }
    }

    /// Wrap a client that already exists.
    pub fn ready(client: Arc<dyn ObjectStoreClient>) -> Self {
        let cell = OnceCell::new();
        let _ = cell.set(Arc::clone(&client));
        Self {
            cell,
            init: Box::new(move || Ok(Arc::clone(&client))),
        }
    }

    pub fn get(&self) -> Result<&Arc<dyn ObjectStoreClient>, KillError> {
        self.cell
            .get_or_try_init(|| {
                tracing::debug!("Constructing object store client");
                (self.init)()
            })
            .map_err(KillError::Client)
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl fmt::Debug for LazyClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyClient")
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingClient;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_not_built_until_first_use() {
        let builds = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&builds);
        let lazy = LazyClient::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(RecordingClient::new()) as Arc<dyn ObjectStoreClient>)
        });

        assert!(!lazy.is_initialized());
        assert_eq!(builds.load(Ordering::SeqCst), 0);

        let first = Arc::clone(lazy.get().unwrap());
        let second = Arc::clone(lazy.get().unwrap());

        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_failed_build_is_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let lazy = LazyClient::new(move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err("missing credentials".into())
            } else {
                Ok(Arc::new(RecordingClient::new()) as Arc<dyn ObjectStoreClient>)
            }
        });

        let Err(err) = lazy.get() else {
            panic!("first build should fail");
        };
        assert!(matches!(err, KillError::Client(_)));
        assert!(err.to_string().contains("missing credentials"));
        assert!(!lazy.is_initialized());

        assert!(lazy.get().is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_concurrent_first_use_builds_once() {
        let builds = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&builds);
        let lazy = Arc::new(LazyClient::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(10));
            Ok(Arc::new(RecordingClient::new()) as Arc<dyn ObjectStoreClient>)
        }));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let lazy = Arc::clone(&lazy);
                std::thread::spawn(move || lazy.get().is_ok())
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap());
        }
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }
}
