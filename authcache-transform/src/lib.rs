// SPDX-License-Identifier: MIT OR Apache-2.0

//! Projection of directory change-log entries into a denormalized authentication cache.
//!
//! The directory emits one change-log entry for every added, modified or deleted object. A
//! [`Transformer`] turns each entry into the cache writes which keep the cache in sync with the
//! directory: a JSON record per object under `/uuid/{uuid}`, name indices resolving logins and
//! names to UUIDs, and membership sets per account. All writes of one entry land in one
//! [`Batch`](authcache_store::Batch) which is committed atomically.
//!
//! ```rust
//! # use authcache_store::{KvStore, MemoryStore};
//! # use authcache_transform::{ChangeLogEntry, Transformer};
//! # use serde_json::json;
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = MemoryStore::new();
//! let transformer = Transformer::new(|text: &str| {
//!     Ok::<_, authcache_transform::PolicyError>(json!({ "text": text }))
//! });
//!
//! let entry: ChangeLogEntry = serde_json::from_value(json!({
//!     "targetdn": "uuid=1a940615-65e9-4856-95f9-f4c530e86ca4, ou=users, o=smartdc",
//!     "changetype": "add",
//!     "changenumber": "6",
//!     "changes": {
//!         "login": ["bcantrill"],
//!         "objectclass": ["sdcperson"],
//!         "approved_for_provisioning": ["false"]
//!     }
//! }))?;
//!
//! let writes = transformer.process(&store, &entry).await?;
//! assert_eq!(writes, 3);
//! assert_eq!(
//!     store.get("/account/bcantrill").await?.as_deref(),
//!     Some("1a940615-65e9-4856-95f9-f4c530e86ca4")
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ## Object classes
//!
//! Accounts (`sdcperson`), their sub-users (`sdcaccountuser`), groups (`sdcaccountgroup`), roles
//! (`sdcaccountpolicy`) and SSH keys (`sdckey`) are cached, as well as the legacy directory
//! groups (`groupofuniquenames`). Entries of any other object class don't touch the cache.
//!
//! Memberships are denormalized: member records list the groups they are in and group records
//! list their roles. Changing a membership therefore rewrites the records on the other side of
//! the relation as well.
//!
//! ## Ordering
//!
//! Entries must be processed strictly one after another, in the order of the change-log. Handlers
//! read the current records of related objects and rely on them not changing before the batch is
//! committed.
mod config;
mod diff;
mod dn;
mod entry;
mod error;
mod handlers;
pub mod keys;
mod policy;
mod record;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
mod transformer;

pub use config::Config;
pub use diff::Delta;
pub use dn::{Dn, MalformedDnError, Rdn};
pub use entry::{
    Attributes, ChangeLogEntry, ChangeType, Changes, EntryError, Modification, Operation,
};
pub use error::TransformError;
pub use handlers::{ObjectClass, UnknownObjectClassError};
pub use policy::{PolicyError, PolicyParser};
pub use record::{CacheRecord, Memberships, Policy, RecordType};
pub use transformer::Transformer;
