// SPDX-License-Identifier: MIT OR Apache-2.0

use authcache_store::{BatchError, CommitError};
use thiserror::Error;

use crate::dn::MalformedDnError;
use crate::policy::PolicyError;

/// Error turning a change-log entry into cache writes, generic over the store's error.
///
/// Whenever an error is returned nothing was committed. Retrying the same entry is safe.
#[derive(Debug, Error)]
pub enum TransformError<E> {
    #[error(transparent)]
    MalformedDn(#[from] MalformedDnError),

    /// The entry lacks an attribute required to locate or index the object.
    #[error("entry '{dn}' has no '{attribute}' attribute")]
    MissingAttribute { dn: String, attribute: &'static str },

    /// The policy parser rejected a policy document.
    #[error("invalid policy document '{text}': {source}")]
    Policy {
        text: String,
        #[source]
        source: PolicyError,
    },

    #[error(transparent)]
    Batch(#[from] BatchError<E>),

    #[error(transparent)]
    Commit(#[from] CommitError<E>),
}
