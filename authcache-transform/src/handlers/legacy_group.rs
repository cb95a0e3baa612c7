// SPDX-License-Identifier: MIT OR Apache-2.0

use authcache_store::{Batch, KvStore};
use tracing::{trace, warn};

use crate::diff::Delta;
use crate::entry::{ChangeLogEntry, Changes};
use crate::error::TransformError;
use crate::handlers::{Context, Handler, read_records, referenced, referenced_delta, target_dn};
use crate::keys;

const MEMBERS: &str = "uniquemember";

/// Legacy directory groups.
///
/// The group itself is not cached, every member record carries a `groups` map from group name to
/// `true` instead.
pub(crate) struct LegacyGroup;

impl Handler for LegacyGroup {
    async fn apply<S: KvStore>(
        &self,
        _ctx: &Context<'_>,
        entry: &ChangeLogEntry,
        batch: &mut Batch<'_, S>,
    ) -> Result<(), TransformError<S::Error>> {
        let dn = target_dn(entry)?;
        let name = dn.rdn().value();

        // Member lists of legacy groups are not cached, directives are applied to nothing.
        let delta = match &entry.changes {
            Changes::Add(attributes) => {
                Delta::between(&[], &referenced(attributes.values(MEMBERS))?)
            }
            Changes::Delete(attributes) => {
                Delta::between(&referenced(attributes.values(MEMBERS))?, &[])
            }
            Changes::Modify { .. } => referenced_delta(entry, MEMBERS, &[])?,
        };

        if delta.is_empty() {
            trace!(group = name, "no membership changes");
            return Ok(());
        }

        let members = delta.added_and_removed();
        let records = read_records(batch, &members).await?;

        for (index, (uuid, mut record)) in members.iter().zip(records).enumerate() {
            let Some(groups) = record.legacy_groups_mut() else {
                warn!(member = %uuid, group = name, "member record holds account groups, skip");
                continue;
            };

            if index < delta.added.len() {
                groups.insert(name.to_string(), true);
            } else {
                groups.remove(name);
            }

            batch.set_value(keys::uuid(uuid), &record)?;
        }

        Ok(())
    }
}
