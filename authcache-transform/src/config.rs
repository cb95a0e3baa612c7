// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};

use crate::dn::{Dn, MalformedDnError, Rdn};

/// Container holding all accounts in the directory.
pub const DEFAULT_USERS_CONTAINER: &str = "ou=users, o=smartdc";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Distinguished name of the container holding all accounts.
    ///
    /// Sub-users, account-scoped groups, roles and SSH keys live below their account, the `uuid=`
    /// component directly under this container identifies the owning account.
    pub users_container: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            users_container: DEFAULT_USERS_CONTAINER.to_string(),
        }
    }
}

impl Config {
    pub fn users_container(&self) -> Result<Dn, MalformedDnError> {
        Dn::parse(&self.users_container)
    }
}

/// Parsed form of [`DEFAULT_USERS_CONTAINER`].
pub(crate) fn default_users_container() -> Dn {
    Dn::from(Rdn::new("o", "smartdc")).child(Rdn::new("ou", "users"))
}
