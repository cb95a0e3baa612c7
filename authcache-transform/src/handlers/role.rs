// SPDX-License-Identifier: MIT OR Apache-2.0

use authcache_store::{Batch, KvStore};
use tracing::{trace, warn};

use crate::diff::Delta;
use crate::entry::{ChangeLogEntry, Changes};
use crate::error::TransformError;
use crate::handlers::{
    Context, Handler, move_index, owner, read_records, referenced, referenced_delta, replaced,
    required, target_dn,
};
use crate::keys;
use crate::record::{CacheRecord, Policy, RecordType};

const NAME: &str = "name";
const POLICIES: &str = "policydocument";
const GROUPS: &str = "membergroup";

/// Roles carrying policy documents, scoped to an account.
///
/// Every policy is cached as its raw text next to the parsed tree. Groups listed in
/// `membergroup` carry the role's UUID in their own `roles` list.
pub(crate) struct Role;

impl Handler for Role {
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
                let name = required(entry, NAME)?;
                let policies = parse_policies(ctx, attributes.values(POLICIES))?;
                let groups = Delta::between(&[], &referenced(attributes.values(GROUPS))?);
                let group_records = read_records(batch, &groups.added).await?;

                batch
                    .set_value(
                        keys::uuid(uuid),
                        &CacheRecord::role(uuid, name, account, policies),
                    )?
                    .sadd(keys::roles(account), uuid)
                    .set(keys::role(account, name), uuid);

                update_groups(batch, uuid, &groups, group_records)?;
            }
            Changes::Modify { .. } => {
                let mut record: CacheRecord = batch.read_value(&keys::uuid(uuid)).await?;
                let old_name = record.name.clone();
                let new_name =
                    replaced(entry, &[NAME]).filter(|name| old_name.as_deref() != Some(*name));

                let directives = entry
                    .modifications_of(&[POLICIES])
                    .map(|modification| (modification.operation, modification.values.clone()));
                let policies = Delta::from_modifications(&record.policy_texts(), directives);
                let parsed = parse_policies(ctx, &policies.added)?;

                let groups = referenced_delta(entry, GROUPS, &[])?;
                let group_records = read_records(batch, &groups.added_and_removed()).await?;

                let mut changed = false;
                if let Some(name) = new_name {
                    move_index(
                        batch,
                        |name| keys::role(account, name),
                        old_name.as_deref(),
                        name,
                        uuid,
                    );
                    record.name = Some(name.to_string());
                    changed = true;
                }

                if !policies.is_empty() {
                    let cached = record.policies_mut();
                    let before = cached.len();
                    cached.retain(|policy| {
                        !policies.removed.iter().any(|text| text == policy.text())
                    });
                    changed |= cached.len() != before;

                    for policy in parsed {
                        if !cached.iter().any(|cached| cached.text() == policy.text()) {
                            cached.push(policy);
                            changed = true;
                        }
                    }
                }

                if changed {
                    record.identify(RecordType::Role, uuid);
                    if record.account.is_none() {
                        record.account = Some(account.to_string());
                    }
                    batch.set_value(keys::uuid(uuid), &record)?;
                } else {
                    trace!(role = uuid, "role record unchanged");
                }

                update_groups(batch, uuid, &groups, group_records)?;
            }
            Changes::Delete(_) => {
                let name = required(entry, NAME)?;
                batch
                    .del(keys::uuid(uuid))
                    .del(keys::role(account, name))
                    .srem(keys::roles(account), uuid);
            }
        }

        Ok(())
    }
}

/// Parses every policy document before anything gets queued.
fn parse_policies<E>(
    ctx: &Context<'_>,
    texts: &[String],
) -> Result<Vec<Policy>, TransformError<E>> {
    texts
        .iter()
        .map(|text| match ctx.parser.parse(text) {
            Ok(ast) => Ok(Policy(text.clone(), ast)),
            Err(source) => Err(TransformError::Policy {
                text: text.clone(),
                source,
            }),
        })
        .collect()
}

/// Adds the role to or removes it from the `roles` list of each affected group.
fn update_groups<S: KvStore>(
    batch: &mut Batch<'_, S>,
    role: &str,
    groups: &Delta<String>,
    records: Vec<CacheRecord>,
) -> Result<(), TransformError<S::Error>> {
    let uuids = groups.added_and_removed();

    for (index, (uuid, mut record)) in uuids.iter().zip(records).enumerate() {
        let delta = if index < groups.added.len() {
            Delta::adding(vec![role.to_string()])
        } else {
            Delta::removing(vec![role.to_string()])
        };

        if record.kind.is_some_and(|kind| kind != RecordType::Group) {
            warn!(group = %uuid, role, "referenced record is not a group, skip");
            continue;
        }

        delta.apply_to(record.roles_mut());
        batch.set_value(keys::uuid(uuid), &record)?;
    }

    Ok(())
}
