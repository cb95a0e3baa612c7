// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;

use crate::traits::{Command, KvStore};

/// Macro to run the same test logic against all store backend implementations.
///
/// This macro takes a closure that will be executed against each store type:
/// - In-memory store (`MemoryStore`)
/// - SQLite store (`SqliteStore`)
///
/// ## Example
///
/// ```rust
/// # use authcache_store::KvStore;
/// # use authcache_store::assert_all_stores;
/// # async fn run() {
/// assert_all_stores!(|store| async {
///     store.sadd("/set/accounts", "1a940615").await.unwrap();
///     assert_eq!(store.scard("/set/accounts").await.unwrap(), 1);
/// });
/// # }
/// ```
#[macro_export]
macro_rules! assert_all_stores {
    (|$store:ident| $test_body:expr) => {
        // Test with MemoryStore.
        {
            let $store = $crate::memory::MemoryStore::default();
            $test_body.await;
        }

        // Test with SqliteStore.
        {
            let $store = $crate::sqlite::SqliteStoreBuilder::new()
                .random_memory_url()
                // We're running in a single test thread and can't have more parallel connections.
                .max_connections(1)
                .build()
                .await
                .unwrap();
            $test_body.await;
        }
    };
}

/// Store wrapper which fails to commit while armed, reads are passed through.
///
/// Used to verify that failed commits leave the wrapped store untouched.
#[derive(Clone, Debug)]
pub struct FailingStore<S> {
    inner: S,
    armed: Arc<AtomicBool>,
}

impl<S> FailingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            armed: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Let the next commits fail (`true`) or pass through (`false`).
    pub fn arm(&self, armed: bool) {
        self.armed.store(armed, Ordering::SeqCst);
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S> KvStore for FailingStore<S>
where
    S: KvStore,
{
    type Error = FailingStoreError<S::Error>;

    async fn get(&self, key: &str) -> Result<Option<String>, Self::Error> {
        self.inner.get(key).await.map_err(FailingStoreError::Inner)
    }

    async fn sismember(&self, set: &str, member: &str) -> Result<bool, Self::Error> {
        self.inner
            .sismember(set, member)
            .await
            .map_err(FailingStoreError::Inner)
    }

    async fn scard(&self, set: &str) -> Result<usize, Self::Error> {
        self.inner.scard(set).await.map_err(FailingStoreError::Inner)
    }

    async fn exec(&self, commands: &[Command]) -> Result<(), Self::Error> {
        if self.armed.load(Ordering::SeqCst) {
            return Err(FailingStoreError::Injected);
        }
        self.inner
            .exec(commands)
            .await
            .map_err(FailingStoreError::Inner)
    }
}

#[derive(Debug, Error)]
pub enum FailingStoreError<E> {
    #[error("injected transport failure")]
    Injected,

    #[error(transparent)]
    Inner(E),
}
