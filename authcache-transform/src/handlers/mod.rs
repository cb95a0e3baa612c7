// SPDX-License-Identifier: MIT OR Apache-2.0

//! Projection of each directory object class into the cache.
//!
//! Every handler first gathers everything it needs (parsed DNs, current records of affected
//! objects, parsed policies) and only then queues its writes, an error never leaves a half-built
//! batch behind.
mod account;
mod account_group;
mod key;
mod legacy_group;
mod role;
mod user;

use std::fmt::Display;
use std::str::FromStr;

use authcache_store::{Batch, BatchError, KvStore};
use futures_util::future::try_join_all;
use thiserror::Error;
use tracing::debug;

use crate::diff::Delta;
use crate::dn::{Dn, MalformedDnError};
use crate::entry::{ChangeLogEntry, Operation};
use crate::error::TransformError;
use crate::keys;
use crate::policy::PolicyParser;
use crate::record::CacheRecord;

use account::Account;
use account_group::AccountGroup;
use key::Key;
use legacy_group::LegacyGroup;
use role::Role;
use user::User;

/// Everything a handler needs besides the entry and the batch.
pub(crate) struct Context<'a> {
    /// Container holding all accounts.
    pub users: &'a Dn,
    pub parser: &'a dyn PolicyParser,
}

/// Queues the cache writes for one change-log entry of a specific object class.
///
/// Handlers never commit the batch.
pub(crate) trait Handler {
    fn apply<S: KvStore>(
        &self,
        ctx: &Context<'_>,
        entry: &ChangeLogEntry,
        batch: &mut Batch<'_, S>,
    ) -> impl Future<Output = Result<(), TransformError<S::Error>>>;
}

/// Directory object classes with a cache projection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectClass {
    /// Legacy directory group (`groupofuniquenames`), membership is tracked by group name on the
    /// member records.
    LegacyGroup,

    /// Group of sub-users scoped to an account (`sdcaccountgroup`).
    AccountGroup,

    /// Role with policy documents scoped to an account (`sdcaccountpolicy`).
    Role,

    /// Sub-user of an account (`sdcaccountuser`).
    AccountUser,

    /// SSH key of an account or sub-user (`sdckey`).
    Key,

    /// Account (`sdcperson`).
    Person,
}

impl ObjectClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectClass::LegacyGroup => "groupofuniquenames",
            ObjectClass::AccountGroup => "sdcaccountgroup",
            ObjectClass::Role => "sdcaccountpolicy",
            ObjectClass::AccountUser => "sdcaccountuser",
            ObjectClass::Key => "sdckey",
            ObjectClass::Person => "sdcperson",
        }
    }

    /// Object classes of an entry which have a handler, in order and without duplicates.
    ///
    /// Unknown classes are skipped. Sub-users are persons as well but are not accounts, only the
    /// sub-user class is kept when both are present.
    pub fn resolve(names: &[String]) -> Vec<ObjectClass> {
        let mut classes = Vec::new();
        for name in names {
            match name.parse::<ObjectClass>() {
                Ok(class) if !classes.contains(&class) => classes.push(class),
                Ok(_) => (),
                Err(err) => debug!(%err, "skip object class"),
            }
        }

        if classes.contains(&ObjectClass::AccountUser) {
            classes.retain(|class| *class != ObjectClass::Person);
        }

        classes
    }
}

impl FromStr for ObjectClass {
    type Err = UnknownObjectClassError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let class = match s.trim().to_lowercase().as_str() {
            "groupofuniquenames" => ObjectClass::LegacyGroup,
            "sdcaccountgroup" => ObjectClass::AccountGroup,
            "sdcaccountpolicy" => ObjectClass::Role,
            "sdcaccountuser" => ObjectClass::AccountUser,
            "sdckey" => ObjectClass::Key,
            "sdcperson" => ObjectClass::Person,
            _ => return Err(UnknownObjectClassError(s.to_string())),
        };
        Ok(class)
    }
}

impl Display for ObjectClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Handler for ObjectClass {
    async fn apply<S: KvStore>(
        &self,
        ctx: &Context<'_>,
        entry: &ChangeLogEntry,
        batch: &mut Batch<'_, S>,
    ) -> Result<(), TransformError<S::Error>> {
        match self {
            ObjectClass::LegacyGroup => LegacyGroup.apply(ctx, entry, batch).await,
            ObjectClass::AccountGroup => AccountGroup.apply(ctx, entry, batch).await,
            ObjectClass::Role => Role.apply(ctx, entry, batch).await,
            ObjectClass::AccountUser => User.apply(ctx, entry, batch).await,
            ObjectClass::Key => Key.apply(ctx, entry, batch).await,
            ObjectClass::Person => Account.apply(ctx, entry, batch).await,
        }
    }
}

/// No handler recognizes the object class.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("unknown object class '{0}'")]
pub struct UnknownObjectClassError(pub String);

fn target_dn(entry: &ChangeLogEntry) -> Result<Dn, MalformedDnError> {
    Dn::parse(&entry.target_dn)
}

/// UUID of the account owning the object.
fn owner<'a>(ctx: &Context<'_>, dn: &'a Dn) -> Result<&'a str, MalformedDnError> {
    dn.owner(ctx.users)
        .ok_or_else(|| MalformedDnError::MissingOwner {
            dn: dn.to_string(),
            container: ctx.users.to_string(),
        })
}

/// First value of an attribute the object can't be cached without.
fn required<'a, E>(
    entry: &'a ChangeLogEntry,
    attribute: &'static str,
) -> Result<&'a str, TransformError<E>> {
    entry
        .attributes()
        .first(attribute)
        .ok_or_else(|| TransformError::MissingAttribute {
            dn: entry.target_dn.clone(),
            attribute,
        })
}

/// Identifiers of the objects referenced by DN-valued attribute values.
fn referenced(values: &[String]) -> Result<Vec<String>, MalformedDnError> {
    values
        .iter()
        .map(|value| Dn::parse(value).map(|dn| dn.rdn().value().to_string()))
        .collect()
}

/// Referenced objects added and removed by the directives of a DN-valued attribute.
fn referenced_delta(
    entry: &ChangeLogEntry,
    attribute: &str,
    baseline: &[String],
) -> Result<Delta<String>, MalformedDnError> {
    let directives = entry
        .modifications()
        .iter()
        .filter(|modification| modification.attribute == attribute)
        .map(|modification| Ok((modification.operation, referenced(&modification.values)?)))
        .collect::<Result<Vec<_>, MalformedDnError>>()?;

    Ok(Delta::from_modifications(baseline, directives))
}

/// Value set by the last add or replace directive of one of the given attributes.
fn replaced<'a>(entry: &'a ChangeLogEntry, attributes: &'a [&'a str]) -> Option<&'a str> {
    entry
        .modifications_of(attributes)
        .filter(|modification| modification.operation != Operation::Delete)
        .filter_map(|modification| modification.values.first())
        .last()
        .map(String::as_str)
}

/// Reads the current records of several objects concurrently.
async fn read_records<S: KvStore>(
    batch: &Batch<'_, S>,
    uuids: &[String],
) -> Result<Vec<CacheRecord>, BatchError<S::Error>> {
    try_join_all(uuids.iter().map(|uuid| async move {
        let key = keys::uuid(uuid);
        batch.read_value::<CacheRecord>(&key).await
    }))
    .await
}

/// Queues moving a name index from the old to the new name.
fn move_index<S: KvStore>(
    batch: &mut Batch<'_, S>,
    index: impl Fn(&str) -> String,
    old: Option<&str>,
    new: &str,
    uuid: &str,
) {
    if let Some(old) = old {
        batch.del(index(old));
    }
    batch.set(index(new), uuid);
}
