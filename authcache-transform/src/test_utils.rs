// SPDX-License-Identifier: MIT OR Apache-2.0

//! Helpers for testing the transformer with literal change-log fixtures.
use serde_json::{Value, json};

use crate::entry::ChangeLogEntry;
use crate::policy::{PolicyError, PolicyParser};

pub fn setup_logging() {
    if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }
}

/// Word-based stand-in for the policy language.
///
/// Understands policies of the form `[principal] can|cannot <action> <resource> [and <resource>]
/// [when <condition>]`, which covers the fixtures used in tests. Anything else is rejected.
#[derive(Clone, Copy, Debug, Default)]
pub struct SimplePolicyParser;

impl PolicyParser for SimplePolicyParser {
    fn parse(&self, text: &str) -> Result<Value, PolicyError> {
        let (statement, condition) = match text.split_once(" when ") {
            Some((statement, condition)) => (statement, Some(condition.trim())),
            None => (text, None),
        };

        let words: Vec<&str> = statement.split_whitespace().collect();
        let Some(position) = words.iter().position(|word| {
            word.eq_ignore_ascii_case("can") || word.eq_ignore_ascii_case("cannot")
        }) else {
            return Err(format!("missing effect in '{text}'").into());
        };

        let effect = words[position].eq_ignore_ascii_case("can");
        let principals = &words[..position];
        let Some((action, resources)) = words[position + 1..].split_first() else {
            return Err(format!("missing action in '{text}'").into());
        };

        let resources: Vec<String> = resources
            .iter()
            .flat_map(|word| word.split(','))
            .filter(|word| !word.is_empty() && !word.eq_ignore_ascii_case("and"))
            .map(str::to_string)
            .collect();
        if resources.is_empty() {
            return Err(format!("missing resources in '{text}'").into());
        }

        let conditions = condition.map(|condition| {
            match condition.split_whitespace().collect::<Vec<_>>().as_slice() {
                [name, op, value] => json!({ "name": name, "op": op, "value": value }),
                _ => json!(condition),
            }
        });

        Ok(json!({
            "effect": effect,
            "principals": principals,
            "actions": [action.to_lowercase()],
            "resources": resources,
            "conditions": conditions,
        }))
    }
}

fn entry(dn: &str, change_type: &str, changes: Value, snapshot: Option<Value>) -> ChangeLogEntry {
    let mut raw = json!({
        "dn": "changenumber=1, cn=changelog",
        "targetdn": dn,
        "changetype": change_type,
        "objectclass": "changeLogEntry",
        "changes": changes,
        "changenumber": "1",
    });
    if let Some(snapshot) = snapshot {
        // The change-log carries the snapshot JSON-encoded.
        raw["entry"] = Value::String(snapshot.to_string());
    }
    serde_json::from_value(raw).expect("valid change-log entry fixture")
}

/// Change-log entry adding an object with the given attributes.
pub fn add_entry(dn: &str, attributes: Value) -> ChangeLogEntry {
    entry(dn, "add", attributes, None)
}

/// Change-log entry modifying an object, `modifications` being the list of
/// `{ operation, modification: { type, vals } }` directives and `snapshot` the complete
/// attributes after the change.
pub fn modify_entry(dn: &str, modifications: Value, snapshot: Value) -> ChangeLogEntry {
    entry(dn, "modify", modifications, Some(snapshot))
}

/// Change-log entry deleting an object with the given last attributes.
pub fn delete_entry(dn: &str, attributes: Value) -> ChangeLogEntry {
    entry(dn, "delete", attributes, None)
}
