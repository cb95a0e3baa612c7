// SPDX-License-Identifier: MIT OR Apache-2.0

use std::error::Error;
use std::fmt;

/// Single write command against the key-value store.
///
/// Commands are only ever executed in groups through [`KvStore::exec`], a group is applied
/// atomically: either every command of it takes effect or none does.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Marks the beginning of a transaction. Has no effect on the stored data.
    Multi,

    /// Stores a string value under a key, replacing whatever the key held before.
    Set { key: String, value: String },

    /// Removes a key, no matter if it holds a string value or a set.
    Del { key: String },

    /// Adds a member to a set, creating the set if it doesn't exist yet.
    Sadd { set: String, member: String },

    /// Removes a member from a set.
    Srem { set: String, member: String },
}

impl Command {
    pub fn set(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Set {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn del(key: impl Into<String>) -> Self {
        Self::Del { key: key.into() }
    }

    pub fn sadd(set: impl Into<String>, member: impl Into<String>) -> Self {
        Self::Sadd {
            set: set.into(),
            member: member.into(),
        }
    }

    pub fn srem(set: impl Into<String>, member: impl Into<String>) -> Self {
        Self::Srem {
            set: set.into(),
            member: member.into(),
        }
    }

    /// Key this command writes to, `None` for the transaction sentinel.
    pub fn key(&self) -> Option<&str> {
        match self {
            Command::Multi => None,
            Command::Set { key, .. } | Command::Del { key } => Some(key),
            Command::Sadd { set, .. } | Command::Srem { set, .. } => Some(set),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Multi => write!(f, "multi"),
            Command::Set { key, value } => write!(f, "set {key} {value}"),
            Command::Del { key } => write!(f, "del {key}"),
            Command::Sadd { set, member } => write!(f, "sadd {set} {member}"),
            Command::Srem { set, member } => write!(f, "srem {set} {member}"),
        }
    }
}

/// Interface of the key-value store holding the authorization cache.
///
/// The store keeps two kinds of values: plain strings (records and name indices) and unordered
/// sets of strings (membership sets). Reads are executed directly, writes are grouped into
/// commands which are executed atomically via `exec`.
pub trait KvStore {
    type Error: Error + 'static;

    /// Get the string value stored under a key.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, Self::Error>>;

    /// Query the existence of a member in a set.
    ///
    /// Returns `false` if the set doesn't exist.
    fn sismember(&self, set: &str, member: &str)
    -> impl Future<Output = Result<bool, Self::Error>>;

    /// Number of members in a set, `0` if the set doesn't exist.
    fn scard(&self, set: &str) -> impl Future<Output = Result<usize, Self::Error>>;

    /// Executes all given commands as one atomic unit.
    ///
    /// If an error is returned none of the commands took effect.
    fn exec(&self, commands: &[Command]) -> impl Future<Output = Result<(), Self::Error>>;

    /// Stores a string value under a key.
    fn set(&self, key: &str, value: &str) -> impl Future<Output = Result<(), Self::Error>> {
        async move { self.exec(&[Command::set(key, value)]).await }
    }

    /// Removes a key.
    fn del(&self, key: &str) -> impl Future<Output = Result<(), Self::Error>> {
        async move { self.exec(&[Command::del(key)]).await }
    }

    /// Adds a member to a set.
    fn sadd(&self, set: &str, member: &str) -> impl Future<Output = Result<(), Self::Error>> {
        async move { self.exec(&[Command::sadd(set, member)]).await }
    }

    /// Removes a member from a set.
    fn srem(&self, set: &str, member: &str) -> impl Future<Output = Result<(), Self::Error>> {
        async move { self.exec(&[Command::srem(set, member)]).await }
    }
}
