// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory key-value store.
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;

use crate::traits::{Command, KvStore};

/// String values and sets held by a [`MemoryStore`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InnerMemoryStore {
    values: HashMap<String, String>,
    sets: HashMap<String, BTreeSet<String>>,
}

impl InnerMemoryStore {
    fn apply(&mut self, command: &Command) -> Result<(), MemoryStoreError> {
        match command {
            Command::Multi => (),
            Command::Set { key, value } => {
                self.sets.remove(key);
                self.values.insert(key.clone(), value.clone());
            }
            Command::Del { key } => {
                self.values.remove(key);
                self.sets.remove(key);
            }
            Command::Sadd { set, member } => {
                self.ensure_not_value(set)?;
                self.sets
                    .entry(set.clone())
                    .or_default()
                    .insert(member.clone());
            }
            Command::Srem { set, member } => {
                self.ensure_not_value(set)?;
                if let Some(members) = self.sets.get_mut(set) {
                    members.remove(member);
                    // Empty sets don't exist.
                    if members.is_empty() {
                        self.sets.remove(set);
                    }
                }
            }
        }
        Ok(())
    }

    fn ensure_not_value(&self, key: &str) -> Result<(), MemoryStoreError> {
        if self.values.contains_key(key) {
            return Err(MemoryStoreError::WrongType(key.to_string()));
        }
        Ok(())
    }

    /// Total number of keys, string values and sets combined.
    pub fn len(&self) -> usize {
        self.values.len() + self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An in-memory key-value store.
///
/// `MemoryStore` supports usage in asynchronous and multi-threaded contexts by wrapping an
/// `InnerMemoryStore` with an `RwLock` and `Arc`. Cloned instances share the same data.
///
/// This does not persist data permamently, all changes are lost when the process ends. Use this
/// only in development or test contexts.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<InnerMemoryStore>>,
}

impl MemoryStore {
    /// Create a new in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Obtain a read-lock on the store.
    pub fn read_store(&self) -> RwLockReadGuard<'_, InnerMemoryStore> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Obtain a write-lock on the store.
    pub fn write_store(&self) -> RwLockWriteGuard<'_, InnerMemoryStore> {
        self.inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Copy of the current state, useful to compare the store before and after a commit.
    pub fn snapshot(&self) -> InnerMemoryStore {
        self.read_store().clone()
    }
}

impl KvStore for MemoryStore {
    type Error = MemoryStoreError;

    async fn get(&self, key: &str) -> Result<Option<String>, Self::Error> {
        let store = self.read_store();
        if store.sets.contains_key(key) {
            return Err(MemoryStoreError::WrongType(key.to_string()));
        }
        Ok(store.values.get(key).cloned())
    }

    async fn sismember(&self, set: &str, member: &str) -> Result<bool, Self::Error> {
        let store = self.read_store();
        store.ensure_not_value(set)?;
        Ok(store
            .sets
            .get(set)
            .is_some_and(|members| members.contains(member)))
    }

    async fn scard(&self, set: &str) -> Result<usize, Self::Error> {
        let store = self.read_store();
        store.ensure_not_value(set)?;
        Ok(store.sets.get(set).map(BTreeSet::len).unwrap_or_default())
    }

    async fn exec(&self, commands: &[Command]) -> Result<(), Self::Error> {
        let mut store = self.write_store();

        // Stage all commands on a copy and only swap it in when every one of them succeeded.
        let mut staged = store.clone();
        for command in commands {
            staged.apply(command)?;
        }
        *store = staged;

        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum MemoryStoreError {
    /// A set operation was issued against a string value or vice versa.
    #[error("operation against key '{0}' holding the wrong kind of value")]
    WrongType(String),
}
