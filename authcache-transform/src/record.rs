// SPDX-License-Identifier: MIT OR Apache-2.0

//! Values stored under `/uuid/{uuid}`.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordType {
    Account,
    User,
    Group,
    Role,
}

/// Policy document of a role: the raw text next to its parsed form.
///
/// Serialized as two-element array `[text, ast]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Policy(pub String, pub serde_json::Value);

impl Policy {
    pub fn text(&self) -> &str {
        &self.0
    }
}

/// Group memberships attached to a record.
///
/// Legacy directory groups are tracked by name, account-scoped groups by UUID. Both live in the
/// same `groups` field but are never mixed on one record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Memberships {
    Names(BTreeMap<String, bool>),
    Uuids(Vec<String>),
}

/// Cached record of an account, sub-user, group or role.
///
/// Records of objects which only appear as member or SSH key owner carry no type and only the
/// `groups` or `keys` field. Absent fields are not serialized, unknown fields are ignored.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheRecord {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<RecordType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_for_provisioning: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policies: Option<Vec<Policy>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groups: Option<Memberships>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keys: Option<BTreeMap<String, String>>,
}

impl CacheRecord {
    pub fn account(uuid: &str, login: &str, approved_for_provisioning: bool) -> Self {
        Self {
            kind: Some(RecordType::Account),
            uuid: Some(uuid.to_string()),
            login: Some(login.to_string()),
            approved_for_provisioning: Some(approved_for_provisioning),
            ..Default::default()
        }
    }

    pub fn user(uuid: &str, account: &str, login: &str) -> Self {
        Self {
            kind: Some(RecordType::User),
            uuid: Some(uuid.to_string()),
            account: Some(account.to_string()),
            login: Some(login.to_string()),
            ..Default::default()
        }
    }

    /// Account-scoped group, `roles` is only present if the group has roles.
    pub fn group(uuid: &str, name: &str, account: &str, roles: Vec<String>) -> Self {
        Self {
            kind: Some(RecordType::Group),
            uuid: Some(uuid.to_string()),
            name: Some(name.to_string()),
            account: Some(account.to_string()),
            roles: (!roles.is_empty()).then_some(roles),
            ..Default::default()
        }
    }

    pub fn role(uuid: &str, name: &str, account: &str, policies: Vec<Policy>) -> Self {
        Self {
            kind: Some(RecordType::Role),
            uuid: Some(uuid.to_string()),
            name: Some(name.to_string()),
            account: Some(account.to_string()),
            policies: Some(policies),
            ..Default::default()
        }
    }

    /// Fills in identity fields of a record which was not cached yet.
    pub fn identify(&mut self, kind: RecordType, uuid: &str) {
        if self.kind.is_none() {
            self.kind = Some(kind);
        }
        if self.uuid.is_none() {
            self.uuid = Some(uuid.to_string());
        }
    }

    /// Legacy group memberships by name, created if absent.
    ///
    /// Returns `None` if the record tracks account-scoped groups instead.
    pub fn legacy_groups_mut(&mut self) -> Option<&mut BTreeMap<String, bool>> {
        let unused = match &self.groups {
            None => true,
            Some(Memberships::Uuids(uuids)) => uuids.is_empty(),
            Some(Memberships::Names(_)) => false,
        };
        if unused {
            self.groups = Some(Memberships::Names(BTreeMap::new()));
        }
        match self.groups.as_mut() {
            Some(Memberships::Names(names)) => Some(names),
            _ => None,
        }
    }

    /// Account-scoped group UUIDs, created if absent.
    ///
    /// Returns `None` if the record tracks legacy groups by name instead.
    pub fn account_groups_mut(&mut self) -> Option<&mut Vec<String>> {
        let unused = match &self.groups {
            None => true,
            Some(Memberships::Names(names)) => names.is_empty(),
            Some(Memberships::Uuids(_)) => false,
        };
        if unused {
            self.groups = Some(Memberships::Uuids(Vec::new()));
        }
        match self.groups.as_mut() {
            Some(Memberships::Uuids(uuids)) => Some(uuids),
            _ => None,
        }
    }

    pub fn roles_mut(&mut self) -> &mut Vec<String> {
        self.roles.get_or_insert_with(Vec::new)
    }

    pub fn policies_mut(&mut self) -> &mut Vec<Policy> {
        self.policies.get_or_insert_with(Vec::new)
    }

    /// Raw texts of all policy documents.
    pub fn policy_texts(&self) -> Vec<String> {
        self.policies
            .iter()
            .flatten()
            .map(|policy| policy.text().to_string())
            .collect()
    }

    pub fn keys_mut(&mut self) -> &mut BTreeMap<String, String> {
        self.keys.get_or_insert_with(BTreeMap::new)
    }
}
