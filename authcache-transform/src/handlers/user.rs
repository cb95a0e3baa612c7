// SPDX-License-Identifier: MIT OR Apache-2.0

use authcache_store::{Batch, KvStore};
use tracing::trace;

use crate::entry::{ChangeLogEntry, Changes};
use crate::error::TransformError;
use crate::handlers::{Context, Handler, move_index, owner, replaced, target_dn};
use crate::keys;
use crate::record::{CacheRecord, RecordType};

/// Sub-users of an account.
///
/// The directory stores sub-user logins as `{account}/{login}`, the cache only the login itself.
pub(crate) struct User;

impl Handler for User {
    async fn apply<S: KvStore>(
        &self,
        ctx: &Context<'_>,
        entry: &ChangeLogEntry,
        batch: &mut Batch<'_, S>,
    ) -> Result<(), TransformError<S::Error>> {
        let dn = target_dn(entry)?;
        let uuid = dn.rdn().value();
        let account = owner(ctx, &dn)?;

        match &entry.changes {
            Changes::Add(_) => {
                let login = login(entry, account)?;
                batch
                    .set_value(keys::uuid(uuid), &CacheRecord::user(uuid, account, login))?
                    .set(keys::user(account, login), uuid)
                    .sadd(keys::users(account), uuid);
            }
            Changes::Modify { .. } => {
                let Some(new_login) = replaced(entry, &["login"]) else {
                    trace!(user = uuid, "no login change");
                    return Ok(());
                };
                let new_login = strip_account(new_login, account);

                let mut record: CacheRecord = batch.read_value(&keys::uuid(uuid)).await?;
                if record.login.as_deref() == Some(new_login) {
                    trace!(user = uuid, login = new_login, "login unchanged");
                    return Ok(());
                }

                move_index(
                    batch,
                    |login| keys::user(account, login),
                    record.login.as_deref(),
                    new_login,
                    uuid,
                );

                record.identify(RecordType::User, uuid);
                if record.account.is_none() {
                    record.account = Some(account.to_string());
                }
                record.login = Some(new_login.to_string());
                batch.set_value(keys::uuid(uuid), &record)?;
            }
            Changes::Delete(_) => {
                let login = login(entry, account)?;
                batch
                    .del(keys::uuid(uuid))
                    .del(keys::user(account, login))
                    .srem(keys::users(account), uuid);
            }
        }

        Ok(())
    }
}

fn login<'a, E>(entry: &'a ChangeLogEntry, account: &str) -> Result<&'a str, TransformError<E>> {
    let attributes = entry.attributes();
    match attributes.first("login") {
        Some(login) => Ok(strip_account(login, account)),
        None => attributes
            .first("alias")
            .ok_or_else(|| TransformError::MissingAttribute {
                dn: entry.target_dn.clone(),
                attribute: "login",
            }),
    }
}

fn strip_account<'a>(login: &'a str, account: &str) -> &'a str {
    login
        .strip_prefix(account)
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(login)
}

#[cfg(test)]
mod tests {
    use super::strip_account;

    #[test]
    fn account_prefix() {
        let account = "390c229a-8c77-445f-b227-88e41c2bb3cf";
        assert_eq!(
            strip_account("390c229a-8c77-445f-b227-88e41c2bb3cf/subuser", account),
            "subuser"
        );
        assert_eq!(strip_account("subuser3", account), "subuser3");
        assert_eq!(strip_account("390c229a-other", account), "390c229a-other");
    }
}
