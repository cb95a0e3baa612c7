// SPDX-License-Identifier: MIT OR Apache-2.0

//! Change-log entries as delivered by the directory's replication log.
use std::collections::BTreeMap;
use std::fmt::Display;

use serde::Deserialize;
use thiserror::Error;

/// Attribute name to ordered list of values.
///
/// Attribute names are case-insensitive in the directory and are stored lower-cased.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "BTreeMap<String, AttributeValues>")]
pub struct Attributes(BTreeMap<String, Vec<String>>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, values: Vec<String>) {
        self.0.insert(name.to_lowercase(), values);
    }

    /// All values of an attribute, empty if the attribute is absent.
    pub fn values(&self, name: &str) -> &[String] {
        self.0.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// First value of an attribute.
    pub fn first(&self, name: &str) -> Option<&str> {
        self.values(name).first().map(String::as_str)
    }
}

impl FromIterator<(String, Vec<String>)> for Attributes {
    fn from_iter<T: IntoIterator<Item = (String, Vec<String>)>>(iter: T) -> Self {
        let mut attributes = Self::new();
        for (name, values) in iter {
            attributes.insert(&name, values);
        }
        attributes
    }
}

impl From<BTreeMap<String, AttributeValues>> for Attributes {
    fn from(raw: BTreeMap<String, AttributeValues>) -> Self {
        raw.into_iter()
            .map(|(name, values)| (name, values.into()))
            .collect()
    }
}

/// Attribute values are usually lists, single-valued attributes sometimes come as plain string.
#[derive(Deserialize)]
#[serde(untagged)]
enum AttributeValues {
    Many(Vec<String>),
    One(String),
}

impl From<AttributeValues> for Vec<String> {
    fn from(values: AttributeValues) -> Self {
        match values {
            AttributeValues::Many(values) => values,
            AttributeValues::One(value) => vec![value],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Add,
    Modify,
    Delete,
}

impl Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ChangeType::Add => "add",
            ChangeType::Modify => "modify",
            ChangeType::Delete => "delete",
        };

        write!(f, "{}", s)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Add,
    Delete,
    Replace,
}

/// Single attribute directive of a modify entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Modification {
    pub operation: Operation,
    pub attribute: String,
    pub values: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Changes {
    /// Complete attribute set of the added object.
    Add(Attributes),

    /// Complete attribute set of the object as it existed before deletion.
    Delete(Attributes),

    /// Ordered directives plus a snapshot of the full post-change attribute set.
    Modify {
        modifications: Vec<Modification>,
        entry: Attributes,
    },
}

/// One recorded add, modify or delete from the directory's change-log.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawEntry")]
pub struct ChangeLogEntry {
    pub target_dn: String,
    /// Sequence number, only used by the caller for ordering.
    pub change_number: Option<u64>,
    pub object_classes: Vec<String>,
    pub changes: Changes,
}

impl ChangeLogEntry {
    pub fn new(target_dn: impl Into<String>, changes: Changes) -> Self {
        let object_classes = match &changes {
            Changes::Add(attributes)
            | Changes::Delete(attributes)
            | Changes::Modify {
                entry: attributes, ..
            } => attributes.values("objectclass").to_vec(),
        };

        Self {
            target_dn: target_dn.into(),
            change_number: None,
            object_classes,
            changes,
        }
    }

    pub fn change_type(&self) -> ChangeType {
        match self.changes {
            Changes::Add(_) => ChangeType::Add,
            Changes::Modify { .. } => ChangeType::Modify,
            Changes::Delete(_) => ChangeType::Delete,
        }
    }

    /// Complete attribute set of the object: as added, as deleted or after the modification.
    pub fn attributes(&self) -> &Attributes {
        match &self.changes {
            Changes::Add(attributes) | Changes::Delete(attributes) => attributes,
            Changes::Modify { entry, .. } => entry,
        }
    }

    /// Directives of a modify entry, empty for additions and deletions.
    pub fn modifications(&self) -> &[Modification] {
        match &self.changes {
            Changes::Modify { modifications, .. } => modifications,
            _ => &[],
        }
    }

    /// Directives touching one of the given attributes, in their original order.
    pub fn modifications_of<'a>(
        &'a self,
        attributes: &'a [&'a str],
    ) -> impl Iterator<Item = &'a Modification> + 'a {
        self.modifications()
            .iter()
            .filter(move |modification| attributes.contains(&modification.attribute.as_str()))
    }
}

#[derive(Deserialize)]
struct RawEntry {
    targetdn: String,
    changetype: ChangeType,
    #[serde(default)]
    changenumber: Option<RawChangeNumber>,
    changes: RawChanges,
    #[serde(default)]
    entry: Option<RawSnapshot>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawChangeNumber {
    Number(u64),
    Text(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawChanges {
    Attributes(Attributes),
    Modifications(Vec<RawModification>),
}

#[derive(Deserialize)]
struct RawModification {
    operation: Operation,
    modification: RawModificationBody,
}

#[derive(Deserialize)]
struct RawModificationBody {
    #[serde(rename = "type")]
    attribute: String,
    #[serde(default)]
    vals: Vec<String>,
}

/// The post-change snapshot is stored as JSON-encoded string by the directory.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawSnapshot {
    Encoded(String),
    Inline(Attributes),
}

impl TryFrom<RawEntry> for ChangeLogEntry {
    type Error = EntryError;

    fn try_from(raw: RawEntry) -> Result<Self, Self::Error> {
        let change_number = match raw.changenumber {
            None => None,
            Some(RawChangeNumber::Number(number)) => Some(number),
            Some(RawChangeNumber::Text(text)) => Some(
                text.trim()
                    .parse()
                    .map_err(|_| EntryError::InvalidChangeNumber(text))?,
            ),
        };

        let changes = match (raw.changetype, raw.changes) {
            (ChangeType::Add, RawChanges::Attributes(attributes)) => Changes::Add(attributes),
            (ChangeType::Delete, RawChanges::Attributes(attributes)) => {
                Changes::Delete(attributes)
            }
            (ChangeType::Modify, RawChanges::Modifications(raw_modifications)) => {
                let entry = match raw.entry {
                    Some(RawSnapshot::Inline(attributes)) => attributes,
                    Some(RawSnapshot::Encoded(json)) => {
                        serde_json::from_str(&json).map_err(EntryError::InvalidSnapshot)?
                    }
                    None => return Err(EntryError::MissingSnapshot),
                };
                let modifications = raw_modifications
                    .into_iter()
                    .map(|raw| Modification {
                        operation: raw.operation,
                        attribute: raw.modification.attribute.to_lowercase(),
                        values: raw.modification.vals,
                    })
                    .collect();
                Changes::Modify {
                    modifications,
                    entry,
                }
            }
            (change_type, _) => return Err(EntryError::UnexpectedChanges(change_type)),
        };

        let mut entry = ChangeLogEntry::new(raw.targetdn, changes);
        entry.change_number = change_number;
        Ok(entry)
    }
}

#[derive(Debug, Error)]
pub enum EntryError {
    #[error("change number '{0}' is not a number")]
    InvalidChangeNumber(String),

    #[error("changes of {0} entry have the wrong shape")]
    UnexpectedChanges(ChangeType),

    #[error("modify entry has no post-change snapshot")]
    MissingSnapshot,

    #[error("post-change snapshot is not a valid attribute map: {0}")]
    InvalidSnapshot(#[source] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ChangeLogEntry, ChangeType, Changes, Operation};

    #[test]
    fn add_entry() {
        let entry: ChangeLogEntry = serde_json::from_value(json!({
            "dn": "changenumber=14, cn=changelog",
            "targetdn": "cn=operators, ou=groups, o=smartdc",
            "changetype": "add",
            "changes": {
                "objectclass": ["groupofuniquenames"],
                "uniqueMember": ["uuid=930896af-bf8c-48d4-885c-6573a94b1853, ou=users, o=smartdc"],
                "_parent": "ou=groups, o=smartdc"
            },
            "changenumber": "14"
        }))
        .unwrap();

        assert_eq!(entry.change_type(), ChangeType::Add);
        assert_eq!(entry.change_number, Some(14));
        assert_eq!(entry.object_classes, vec!["groupofuniquenames"]);
        assert_eq!(entry.attributes().values("uniquemember").len(), 1);
        assert_eq!(entry.attributes().first("_parent"), Some("ou=groups, o=smartdc"));
        assert!(entry.modifications().is_empty());
    }

    #[test]
    fn modify_entry() {
        let snapshot = json!({
            "objectclass": ["sdcperson"],
            "login": ["bmc"]
        });

        // The snapshot arrives JSON-encoded, the change number may be missing.
        let entry: ChangeLogEntry = serde_json::from_value(json!({
            "targetdn": "uuid=1a940615-65e9-4856-95f9-f4c530e86ca4, ou=users, o=smartdc",
            "changetype": "modify",
            "changes": [
                {
                    "operation": "replace",
                    "modification": { "type": "login", "vals": ["bmc"] }
                },
                {
                    "operation": "delete",
                    "modification": { "type": "Company" }
                }
            ],
            "entry": snapshot.to_string()
        }))
        .unwrap();

        assert_eq!(entry.change_type(), ChangeType::Modify);
        assert_eq!(entry.change_number, None);
        assert_eq!(entry.object_classes, vec!["sdcperson"]);
        assert_eq!(entry.attributes().first("login"), Some("bmc"));

        let modifications = entry.modifications();
        assert_eq!(modifications.len(), 2);
        assert_eq!(modifications[0].operation, Operation::Replace);
        assert_eq!(modifications[1].attribute, "company");
        assert!(modifications[1].values.is_empty());

        assert_eq!(entry.modifications_of(&["login"]).count(), 1);
        assert_eq!(entry.modifications_of(&["email"]).count(), 0);
    }

    #[test]
    fn inline_snapshot() {
        let entry: ChangeLogEntry = serde_json::from_value(json!({
            "targetdn": "cn=operators, ou=groups, o=smartdc",
            "changetype": "modify",
            "changes": [],
            "entry": { "objectclass": ["groupofuniquenames"] },
            "changenumber": 15
        }))
        .unwrap();

        assert_eq!(entry.change_number, Some(15));
        assert!(matches!(entry.changes, Changes::Modify { .. }));
    }

    #[test]
    fn invalid_shapes() {
        // Modify entries need a snapshot.
        let result = serde_json::from_value::<ChangeLogEntry>(json!({
            "targetdn": "cn=operators, ou=groups, o=smartdc",
            "changetype": "modify",
            "changes": []
        }));
        assert!(result.is_err());

        // Add entries carry a complete attribute map, not directives.
        let result = serde_json::from_value::<ChangeLogEntry>(json!({
            "targetdn": "cn=operators, ou=groups, o=smartdc",
            "changetype": "add",
            "changes": [
                { "operation": "add", "modification": { "type": "cn", "vals": ["x"] } }
            ]
        }));
        assert!(result.is_err());

        let result = serde_json::from_value::<ChangeLogEntry>(json!({
            "targetdn": "cn=operators, ou=groups, o=smartdc",
            "changetype": "delete",
            "changes": {},
            "changenumber": "fourteen"
        }));
        assert!(result.is_err());

        let result = serde_json::from_value::<ChangeLogEntry>(json!({
            "targetdn": "cn=operators, ou=groups, o=smartdc",
            "changetype": "modify",
            "changes": [],
            "entry": "{not json"
        }));
        assert!(result.is_err());
    }
}
