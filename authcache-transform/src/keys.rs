// SPDX-License-Identifier: MIT OR Apache-2.0

//! Key layout of the authentication cache.

/// Set of all account UUIDs.
pub const ACCOUNTS: &str = "/set/accounts";

/// Record of any object.
pub fn uuid(uuid: &str) -> String {
    format!("/uuid/{uuid}")
}

/// Account name index.
pub fn account(login: &str) -> String {
    format!("/account/{login}")
}

/// Sub-user name index.
pub fn user(account: &str, login: &str) -> String {
    format!("/user/{account}/{login}")
}

/// Account-scoped group name index.
pub fn group(account: &str, name: &str) -> String {
    format!("/group/{account}/{name}")
}

/// Role name index.
pub fn role(account: &str, name: &str) -> String {
    format!("/role/{account}/{name}")
}

/// Set of sub-user UUIDs of an account.
pub fn users(account: &str) -> String {
    format!("/set/users/{account}")
}

/// Set of group UUIDs of an account.
pub fn groups(account: &str) -> String {
    format!("/set/groups/{account}")
}

/// Set of role UUIDs of an account.
pub fn roles(account: &str) -> String {
    format!("/set/roles/{account}")
}
