// SPDX-License-Identifier: MIT OR Apache-2.0

use std::error::Error;

use serde_json::Value;

/// Error returned by a policy parser, passed on to the caller unchanged.
pub type PolicyError = Box<dyn Error + Send + Sync>;

/// Parses policy documents of roles into their abstract syntax tree.
///
/// The tree is opaque to the transformer and stored verbatim next to the raw text. Any closure
/// taking the policy text implements this trait.
pub trait PolicyParser {
    fn parse(&self, text: &str) -> Result<Value, PolicyError>;
}

impl<F> PolicyParser for F
where
    F: Fn(&str) -> Result<Value, PolicyError>,
{
    fn parse(&self, text: &str) -> Result<Value, PolicyError> {
        self(text)
    }
}
