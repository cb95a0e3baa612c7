// SPDX-License-Identifier: MIT OR Apache-2.0

use authcache_store::{Batch, KvStore};
use tracing::trace;

use crate::dn::MalformedDnError;
use crate::entry::{ChangeLogEntry, Changes};
use crate::error::TransformError;
use crate::handlers::{Context, Handler, replaced, required, target_dn};
use crate::keys;
use crate::record::CacheRecord;

const MATERIAL: &str = "pkcs";

/// SSH keys, cached as a fingerprint to PKCS material map on the record of the owning account or
/// sub-user.
pub(crate) struct Key;

impl Handler for Key {
    async fn apply<S: KvStore>(
        &self,
        _ctx: &Context<'_>,
        entry: &ChangeLogEntry,
        batch: &mut Batch<'_, S>,
    ) -> Result<(), TransformError<S::Error>> {
        let dn = target_dn(entry)?;
        let owner = dn
            .parent_uuid()
            .ok_or_else(|| MalformedDnError::MissingComponent {
                dn: entry.target_dn.clone(),
                attribute: "uuid",
            })?;
        let fingerprint = entry
            .attributes()
            .first("fingerprint")
            .unwrap_or(dn.rdn().value());

        let material = match &entry.changes {
            Changes::Add(_) => Some(required(entry, MATERIAL)?),
            Changes::Delete(_) => None,
            Changes::Modify { .. } => match replaced(entry, &[MATERIAL]) {
                Some(material) => Some(material),
                None => {
                    trace!(owner, fingerprint, "no key material change");
                    return Ok(());
                }
            },
        };

        let key = keys::uuid(owner);
        let mut record: CacheRecord = batch.read_value(&key).await?;
        match material {
            Some(material) => {
                record
                    .keys_mut()
                    .insert(fingerprint.to_string(), material.to_string());
            }
            None => {
                // An empty map is kept, it still differs from an uncached owner.
                record.keys_mut().remove(fingerprint);
            }
        }
        batch.set_value(key, &record)?;

        Ok(())
    }
}
