// SPDX-License-Identifier: MIT OR Apache-2.0

//! Key-value store interface and atomic write batches for the authorization cache.
//!
//! The cache is a plain key-value store holding two kinds of values: strings (encoded records and
//! name indices) and unordered sets of strings (membership sets). [`KvStore`] describes the
//! operations the cache needs from such a store, with an in-memory and an SQLite
//! implementation provided here. A Redis client only needs to implement the same trait.
//!
//! ## Write batches
//!
//! All writes resulting from one change are grouped into one [`Batch`] and committed as one
//! single, atomic transaction. Either _all_ writes occur or _none_ do, a cache reader never
//! observes half of a change.
//!
//! ```rust
//! # use authcache_store::{BatchExt, KvStore, MemoryStore};
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = MemoryStore::new();
//!
//! let mut batch = store.batch();
//! batch
//!     .set("/uuid/1a940615", r#"{"type":"account","login":"bmc"}"#)
//!     .set("/account/bmc", "1a940615")
//!     .sadd("/set/accounts", "1a940615");
//!
//! // Nothing is visible before the commit.
//! assert_eq!(store.get("/account/bmc").await?, None);
//!
//! batch.commit().await?;
//! assert!(store.sismember("/set/accounts", "1a940615").await?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Store implementations
//!
//! An in-memory store is provided in the form of `MemoryStore`, gated by the `memory` feature
//! flag and enabled by default.
//!
//! An SQLite store is provided in the form of `SqliteStore`, gated by the `sqlite` feature flag
//! and disabled by default.
mod batch;
pub mod codec;
#[cfg(feature = "memory")]
pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
mod traits;

pub use batch::{Batch, BatchError, BatchExt, CommitError};
#[cfg(feature = "memory")]
pub use memory::{MemoryStore, MemoryStoreError};
#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteError, SqliteStore, SqliteStoreBuilder};
pub use traits::{Command, KvStore};
