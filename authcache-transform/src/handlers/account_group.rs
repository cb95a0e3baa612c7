// SPDX-License-Identifier: MIT OR Apache-2.0

use authcache_store::{Batch, KvStore};
use tracing::{trace, warn};

use crate::diff::Delta;
use crate::entry::{ChangeLogEntry, Changes};
use crate::error::TransformError;
use crate::handlers::{
    Context, Handler, move_index, owner, read_records, referenced, referenced_delta, replaced,
    target_dn,
};
use crate::keys;
use crate::record::{CacheRecord, RecordType};

const NAMES: &[&str] = &["cn", "name"];
const MEMBERS: &str = "uniquemember";
const ROLES: &str = "memberrole";

/// Groups of sub-users scoped to an account.
///
/// The group record lists the UUIDs of the group's roles, every member record lists the UUIDs of
/// the member's groups.
pub(crate) struct AccountGroup;

impl Handler for AccountGroup {
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
            Changes::Add(attributes) => {
                let name = group_name(entry)?;
                let roles = referenced(attributes.values(ROLES))?;
                let members = Delta::between(&[], &referenced(attributes.values(MEMBERS))?);
                let member_records = read_records(batch, &members.added).await?;

                batch
                    .set_value(
                        keys::uuid(uuid),
                        &CacheRecord::group(uuid, name, account, roles),
                    )?
                    .set(keys::group(account, name), uuid)
                    .sadd(keys::groups(account), uuid);

                update_members(batch, uuid, &members, member_records)?;
            }
            Changes::Modify { .. } => {
                let mut record: CacheRecord = batch.read_value(&keys::uuid(uuid)).await?;
                let old_name = record.name.clone();
                let new_name =
                    replaced(entry, NAMES).filter(|name| old_name.as_deref() != Some(*name));

                let roles =
                    referenced_delta(entry, ROLES, record.roles.as_deref().unwrap_or_default())?;
                let members = referenced_delta(entry, MEMBERS, &[])?;
                let member_records = read_records(batch, &members.added_and_removed()).await?;

                let mut changed = !roles.is_empty() && roles.apply_to(record.roles_mut());
                if let Some(name) = new_name {
                    move_index(
                        batch,
                        |name| keys::group(account, name),
                        old_name.as_deref(),
                        name,
                        uuid,
                    );
                    record.name = Some(name.to_string());
                    changed = true;
                }

                if changed {
                    record.identify(RecordType::Group, uuid);
                    if record.account.is_none() {
                        record.account = Some(account.to_string());
                    }
                    batch.set_value(keys::uuid(uuid), &record)?;
                } else {
                    trace!(group = uuid, "group record unchanged");
                }

                update_members(batch, uuid, &members, member_records)?;
            }
            Changes::Delete(_) => {
                // Former members keep referencing the group, readers treat unknown UUIDs as
                // deleted groups.
                let name = group_name(entry)?;
                batch
                    .del(keys::uuid(uuid))
                    .del(keys::group(account, name))
                    .srem(keys::groups(account), uuid);
            }
        }

        Ok(())
    }
}

/// Groups are named by `cn`, some directory versions use `name`.
fn group_name<E>(entry: &ChangeLogEntry) -> Result<&str, TransformError<E>> {
    let attributes = entry.attributes();
    attributes
        .first("cn")
        .or_else(|| attributes.first("name"))
        .ok_or_else(|| TransformError::MissingAttribute {
            dn: entry.target_dn.clone(),
            attribute: "cn",
        })
}

/// Adds the group to or removes it from the `groups` list of each affected member.
fn update_members<S: KvStore>(
    batch: &mut Batch<'_, S>,
    group: &str,
    members: &Delta<String>,
    records: Vec<CacheRecord>,
) -> Result<(), TransformError<S::Error>> {
    let uuids = members.added_and_removed();

    for (index, (uuid, mut record)) in uuids.iter().zip(records).enumerate() {
        let Some(groups) = record.account_groups_mut() else {
            warn!(member = %uuid, group, "member record holds legacy groups, skip");
            continue;
        };

        let delta = if index < members.added.len() {
            Delta::adding(vec![group.to_string()])
        } else {
            Delta::removing(vec![group.to_string()])
        };
        delta.apply_to(groups);

        batch.set_value(keys::uuid(uuid), &record)?;
    }

    Ok(())
}
