// SPDX-License-Identifier: MIT OR Apache-2.0

use authcache_store::{Batch, BatchExt, KvStore};
use tracing::{debug, trace};

use crate::config::{Config, default_users_container};
use crate::dn::{Dn, MalformedDnError};
use crate::entry::ChangeLogEntry;
use crate::error::TransformError;
use crate::handlers::{Context, Handler, ObjectClass};
use crate::policy::PolicyParser;

/// Turns directory change-log entries into cache writes.
///
/// Entries must be processed one at a time and in change-log order: handlers read the current
/// records of related objects and the resulting writes rely on nobody else changing them before
/// the batch is committed.
#[derive(Clone, Debug)]
pub struct Transformer<P> {
    users: Dn,
    parser: P,
}

impl<P> Transformer<P>
where
    P: PolicyParser,
{
    /// Transformer for accounts living under the default `ou=users, o=smartdc` container.
    pub fn new(parser: P) -> Self {
        Self {
            users: default_users_container(),
            parser,
        }
    }

    pub fn from_config(config: &Config, parser: P) -> Result<Self, MalformedDnError> {
        Ok(Self {
            users: config.users_container()?,
            parser,
        })
    }

    /// Container all accounts live in.
    pub fn users_container(&self) -> &Dn {
        &self.users
    }

    /// Queues all cache writes resulting from one change-log entry into the batch.
    ///
    /// The batch is handed back for the caller to commit. Entries without any known object class
    /// leave the batch untouched. On error the batch is dropped and with it everything queued so
    /// far.
    pub async fn transform<'a, S: KvStore>(
        &self,
        entry: &ChangeLogEntry,
        mut batch: Batch<'a, S>,
    ) -> Result<Batch<'a, S>, TransformError<S::Error>> {
        let ctx = Context {
            users: &self.users,
            parser: &self.parser,
        };

        let classes = ObjectClass::resolve(&entry.object_classes);
        if classes.is_empty() {
            trace!(dn = %entry.target_dn, "no handler for entry");
        }

        for class in classes {
            trace!(dn = %entry.target_dn, %class, "apply handler");
            class.apply(&ctx, entry, &mut batch).await?;
        }

        debug!(
            dn = %entry.target_dn,
            change_type = %entry.change_type(),
            change_number = ?entry.change_number,
            writes = batch.writes().len(),
            "transformed change-log entry"
        );

        Ok(batch)
    }

    /// Transforms the entry into a fresh batch and commits it.
    ///
    /// Returns the number of committed writes. If an error is returned nothing was written and the
    /// same entry can be processed again.
    pub async fn process<S: KvStore>(
        &self,
        store: &S,
        entry: &ChangeLogEntry,
    ) -> Result<usize, TransformError<S::Error>> {
        let batch = self.transform(entry, store.batch()).await?;
        let writes = batch.writes().len();
        batch.commit().await?;
        Ok(writes)
    }
}
