// SPDX-License-Identifier: MIT OR Apache-2.0

use authcache_store::{Batch, KvStore};
use tracing::trace;

use crate::entry::{ChangeLogEntry, Changes, Operation};
use crate::error::TransformError;
use crate::handlers::{Context, Handler, move_index, replaced, required, target_dn};
use crate::keys;
use crate::record::{CacheRecord, RecordType};

const LOGIN: &str = "login";
const APPROVED: &str = "approved_for_provisioning";

/// Top-level accounts.
///
/// Only the login and the provisioning approval are cached, changes to any other attribute don't
/// touch the cache.
pub(crate) struct Account;

impl Handler for Account {
    async fn apply<S: KvStore>(
        &self,
        _ctx: &Context<'_>,
        entry: &ChangeLogEntry,
        batch: &mut Batch<'_, S>,
    ) -> Result<(), TransformError<S::Error>> {
        let dn = target_dn(entry)?;
        let uuid = dn.rdn().value();

        match &entry.changes {
            Changes::Add(attributes) => {
                let login = required(entry, LOGIN)?;
                let approved = attributes.first(APPROVED).is_some_and(is_true);
                batch
                    .set_value(
                        keys::uuid(uuid),
                        &CacheRecord::account(uuid, login, approved),
                    )?
                    .set(keys::account(login), uuid)
                    .sadd(keys::ACCOUNTS, uuid);
            }
            Changes::Modify { .. } => {
                if entry.modifications_of(&[LOGIN, APPROVED]).next().is_none() {
                    trace!(account = uuid, "no relevant attribute changed");
                    return Ok(());
                }

                let mut record: CacheRecord = batch.read_value(&keys::uuid(uuid)).await?;
                let mut changed = false;

                let new_login = replaced(entry, &[LOGIN])
                    .filter(|login| record.login.as_deref() != Some(*login));
                if let Some(login) = new_login {
                    move_index(batch, keys::account, record.login.as_deref(), login, uuid);
                    record.login = Some(login.to_string());
                    changed = true;
                }

                let approved = entry.modifications_of(&[APPROVED]).fold(
                    record.approved_for_provisioning,
                    |_, modification| match modification.operation {
                        Operation::Delete => Some(false),
                        Operation::Add | Operation::Replace => {
                            Some(modification.values.first().is_some_and(|value| is_true(value)))
                        }
                    },
                );
                if approved != record.approved_for_provisioning {
                    record.approved_for_provisioning = approved;
                    changed = true;
                }

                if changed {
                    record.identify(RecordType::Account, uuid);
                    batch.set_value(keys::uuid(uuid), &record)?;
                } else {
                    trace!(account = uuid, "account record unchanged");
                }
            }
            Changes::Delete(_) => {
                let login = required(entry, LOGIN)?;
                batch
                    .del(keys::uuid(uuid))
                    .del(keys::account(login))
                    .srem(keys::ACCOUNTS, uuid)
                    .del(keys::users(uuid))
                    .del(keys::groups(uuid))
                    .del(keys::roles(uuid));
            }
        }

        Ok(())
    }
}

/// Directory booleans are the strings `"true"` and `"false"`.
fn is_true(value: &str) -> bool {
    value.eq_ignore_ascii_case("true")
}
