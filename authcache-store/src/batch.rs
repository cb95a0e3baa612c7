// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ordered, atomically committed groups of write commands.
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::codec::{self, CodecError};
use crate::traits::{Command, KvStore};

/// Append-only list of write commands which are committed as one atomic unit.
///
/// A batch separates deciding _what_ to write from _committing_ it: writes are only queued and
/// have no effect until `commit` is called, reads go straight to the store. Dropping a batch
/// without committing it discards all queued writes.
///
/// The queue always starts with a [`Command::Multi`] sentinel marking the beginning of the
/// transaction.
#[derive(Debug)]
pub struct Batch<'a, S> {
    store: &'a S,
    queue: Vec<Command>,
}

impl<'a, S> Batch<'a, S>
where
    S: KvStore,
{
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            queue: vec![Command::Multi],
        }
    }

    /// Appends a command to the queue.
    pub fn queue(&mut self, command: Command) -> &mut Self {
        trace!(%command, "queue command");
        self.queue.push(command);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.queue(Command::set(key, value))
    }

    /// Encodes a structured value and queues storing it under the given key.
    pub fn set_value<T: Serialize>(
        &mut self,
        key: impl Into<String>,
        value: &T,
    ) -> Result<&mut Self, BatchError<S::Error>> {
        let key = key.into();
        let encoded = codec::encode(value).map_err(|err| BatchError::Encode(key.clone(), err))?;
        Ok(self.queue(Command::set(key, encoded)))
    }

    pub fn del(&mut self, key: impl Into<String>) -> &mut Self {
        self.queue(Command::del(key))
    }

    pub fn sadd(&mut self, set: impl Into<String>, member: impl Into<String>) -> &mut Self {
        self.queue(Command::sadd(set, member))
    }

    pub fn srem(&mut self, set: impl Into<String>, member: impl Into<String>) -> &mut Self {
        self.queue(Command::srem(set, member))
    }

    /// Reads the current value of a key from the store.
    ///
    /// The read is executed immediately and is not part of the transaction, it does not observe
    /// writes queued in this batch.
    pub async fn read(&self, key: &str) -> Result<Option<String>, BatchError<S::Error>> {
        self.store
            .get(key)
            .await
            .map_err(|source| BatchError::Read {
                key: key.to_string(),
                source,
            })
    }

    /// Reads and decodes the current value of a key, falling back to the type's default when the
    /// key is absent.
    pub async fn read_value<T>(&self, key: &str) -> Result<T, BatchError<S::Error>>
    where
        T: DeserializeOwned + Default,
    {
        match self.read(key).await? {
            Some(value) => {
                codec::decode(&value).map_err(|err| BatchError::Decode(key.to_string(), err))
            }
            None => Ok(T::default()),
        }
    }

    /// All queued commands, including the leading transaction sentinel.
    pub fn commands(&self) -> &[Command] {
        &self.queue
    }

    /// Queued write commands without the transaction sentinel.
    pub fn writes(&self) -> &[Command] {
        &self.queue[1..]
    }

    /// Returns `true` if anything besides the transaction sentinel was queued.
    pub fn has_writes(&self) -> bool {
        self.queue.len() > 1
    }

    /// Executes all queued commands as one atomic transaction against the store.
    ///
    /// If an error is returned the caller must assume that none of the writes took effect.
    pub async fn commit(self) -> Result<(), CommitError<S::Error>> {
        let commands = self.queue.len();

        match self.store.exec(&self.queue).await {
            Ok(()) => {
                debug!(commands, "committed batch");
                Ok(())
            }
            Err(source) => {
                warn!(commands, %source, "failed committing batch");
                Err(CommitError { commands, source })
            }
        }
    }
}

/// Convenience method to start a new batch on a store.
pub trait BatchExt: KvStore + Sized {
    fn batch(&self) -> Batch<'_, Self> {
        Batch::new(self)
    }
}

impl<S> BatchExt for S where S: KvStore {}

#[derive(Debug, Error)]
pub enum BatchError<E> {
    /// Reading the current value from the store failed.
    #[error("failed reading '{key}' from store: {source}")]
    Read {
        key: String,
        #[source]
        source: E,
    },

    /// The store holds a value which can't be decoded into the expected type.
    #[error("could not decode value stored at '{0}': {1}")]
    Decode(String, #[source] CodecError),

    #[error("could not encode value for '{0}': {1}")]
    Encode(String, #[source] CodecError),
}

/// The store failed to commit a transaction, none of its writes took effect.
#[derive(Debug, Error)]
#[error("failed committing transaction of {commands} commands: {source}")]
pub struct CommitError<E> {
    /// Number of commands in the failed transaction, including the sentinel.
    pub commands: usize,
    #[source]
    pub source: E,
}
