// SPDX-License-Identifier: MIT OR Apache-2.0

//! Distinguished names of directory objects.
//!
//! Only the small subset needed to locate objects is understood: a DN is a comma-separated list
//! of `attribute=value` components, most specific first. Attribute names are compared
//! case-insensitively, values are kept verbatim (including escape sequences).
use std::fmt::Display;
use std::str::FromStr;

use thiserror::Error;

/// Single `attribute=value` component of a distinguished name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rdn {
    attribute: String,
    value: String,
}

impl Rdn {
    pub fn new(attribute: &str, value: &str) -> Self {
        Self {
            attribute: attribute.trim().to_lowercase(),
            value: value.trim().to_string(),
        }
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl Display for Rdn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.attribute, self.value)
    }
}

/// Parsed distinguished name, never empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dn(Vec<Rdn>);

impl Dn {
    pub fn parse(dn: &str) -> Result<Self, MalformedDnError> {
        if dn.trim().is_empty() {
            return Err(MalformedDnError::Empty);
        }

        let components = split_unescaped(dn, ',')
            .into_iter()
            .map(|component| {
                let invalid = || MalformedDnError::InvalidComponent {
                    dn: dn.to_string(),
                    component: component.trim().to_string(),
                };
                let mut parts = split_unescaped(component, '=').into_iter();
                let attribute = parts.next().ok_or_else(invalid)?;
                if attribute.trim().is_empty() {
                    return Err(invalid());
                }
                // Everything after the first separator belongs to the value.
                let value = &component[attribute.len()..];
                let value = value.strip_prefix('=').ok_or_else(invalid)?;
                Ok(Rdn::new(attribute, value))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self(components))
    }

    /// DN of a child object directly below this one.
    pub fn child(&self, rdn: Rdn) -> Self {
        let mut components = Vec::with_capacity(self.0.len() + 1);
        components.push(rdn);
        components.extend(self.0.iter().cloned());
        Self(components)
    }

    pub fn components(&self) -> &[Rdn] {
        &self.0
    }

    /// The object's own identifying component.
    pub fn rdn(&self) -> &Rdn {
        // Parsing guarantees at least one component.
        &self.0[0]
    }

    /// Nearest ancestor `uuid=` component, excluding the object's own component.
    pub fn parent_uuid(&self) -> Option<&str> {
        self.0[1..]
            .iter()
            .find(|rdn| rdn.attribute == "uuid")
            .map(Rdn::value)
    }

    /// UUID of the account owning this object, the `uuid=` component directly under the given
    /// container. Objects sitting directly in the container don't have an owner.
    pub fn owner(&self, container: &Dn) -> Option<&str> {
        if !self.ends_with(container) {
            return None;
        }
        let index = self
            .0
            .len()
            .checked_sub(container.0.len() + 1)
            .filter(|index| *index > 0)?;
        let rdn = &self.0[index];
        (rdn.attribute == "uuid").then_some(rdn.value())
    }

    /// Returns `true` if the other DN is a suffix of this one, values compared case-insensitively.
    pub fn ends_with(&self, suffix: &Dn) -> bool {
        self.0.len() >= suffix.0.len()
            && self.0[self.0.len() - suffix.0.len()..]
                .iter()
                .zip(&suffix.0)
                .all(|(a, b)| a.attribute == b.attribute && a.value.eq_ignore_ascii_case(&b.value))
    }
}

impl From<Rdn> for Dn {
    fn from(rdn: Rdn) -> Self {
        Self(vec![rdn])
    }
}

impl FromStr for Dn {
    type Err = MalformedDnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Display for Dn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (index, rdn) in self.0.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", rdn)?;
        }
        Ok(())
    }
}

/// Splits at every separator which is not preceded by a backslash escape.
fn split_unescaped(input: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;

    for (index, c) in input.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            c if c == separator => {
                parts.push(&input[start..index]);
                start = index + c.len_utf8();
            }
            _ => (),
        }
    }
    parts.push(&input[start..]);

    parts
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum MalformedDnError {
    #[error("distinguished name is empty")]
    Empty,

    #[error("component '{component}' of '{dn}' is not an attribute=value pair")]
    InvalidComponent { dn: String, component: String },

    #[error("'{dn}' has no {attribute}= component")]
    MissingComponent { dn: String, attribute: &'static str },

    #[error("'{dn}' is not owned by an account under '{container}'")]
    MissingOwner { dn: String, container: String },
}

#[cfg(test)]
mod tests {
    use super::{Dn, MalformedDnError, Rdn};

    fn users() -> Dn {
        Dn::parse("ou=users, o=smartdc").unwrap()
    }

    #[test]
    fn parse_components() {
        let dn = Dn::parse(
            "group-uuid=5d0049f4-67b3-11e3-8059-273f883b3fb6, \
             UUID=390c229a-8c77-445f-b227-88e41c2bb3cf,ou=users,   o=smartdc",
        )
        .unwrap();

        assert_eq!(dn.components().len(), 4);
        assert_eq!(dn.rdn().attribute(), "group-uuid");
        assert_eq!(dn.rdn().value(), "5d0049f4-67b3-11e3-8059-273f883b3fb6");
        assert_eq!(
            dn.parent_uuid(),
            Some("390c229a-8c77-445f-b227-88e41c2bb3cf")
        );
        assert_eq!(
            dn.to_string(),
            "group-uuid=5d0049f4-67b3-11e3-8059-273f883b3fb6, \
             uuid=390c229a-8c77-445f-b227-88e41c2bb3cf, ou=users, o=smartdc"
        );
    }

    #[test]
    fn escaped_separators() {
        let dn = Dn::parse(r"cn=Cantrill\, Bryan, ou=users, o=smartdc").unwrap();
        assert_eq!(dn.components().len(), 3);
        assert_eq!(dn.rdn().value(), r"Cantrill\, Bryan");

        // Only the first unescaped equals sign separates attribute and value.
        let dn = Dn::parse("cn=a=b, o=smartdc").unwrap();
        assert_eq!(dn.rdn().value(), "a=b");
    }

    #[test]
    fn owner_and_parent() {
        let key = Dn::parse(
            "fingerprint=7b:a4:7c, uuid=3ffc7b4c-66a6-11e3-af09-8752d24e4669, \
             uuid=390c229a-8c77-445f-b227-88e41c2bb3cf, ou=users, o=smartdc",
        )
        .unwrap();
        assert_eq!(
            key.parent_uuid(),
            Some("3ffc7b4c-66a6-11e3-af09-8752d24e4669")
        );
        assert_eq!(
            key.owner(&users()),
            Some("390c229a-8c77-445f-b227-88e41c2bb3cf")
        );

        // Accounts sit directly in the container and are not owned by anyone.
        let account =
            Dn::parse("uuid=1a940615-65e9-4856-95f9-f4c530e86ca4, ou=users, o=smartdc").unwrap();
        assert_eq!(account.parent_uuid(), None);
        assert_eq!(account.owner(&users()), None);

        let group = Dn::parse("cn=operators, ou=groups, o=smartdc").unwrap();
        assert_eq!(group.owner(&users()), None);

        let container = Dn::from(Rdn::new("o", "smartdc")).child(Rdn::new("OU", "Users"));
        assert_eq!(container.to_string(), "ou=Users, o=smartdc");
        assert!(account.ends_with(&container));
    }

    #[test]
    fn malformed() {
        assert_eq!(Dn::parse(""), Err(MalformedDnError::Empty));
        assert_eq!(Dn::parse("   "), Err(MalformedDnError::Empty));
        assert!(matches!(
            Dn::parse("operators, ou=groups"),
            Err(MalformedDnError::InvalidComponent { component, .. }) if component == "operators"
        ));
        assert!(Dn::parse("=operators").is_err());
        assert!(Dn::parse("cn=operators,").is_err());
    }
}
