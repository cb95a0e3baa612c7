// SPDX-License-Identifier: MIT OR Apache-2.0

//! Encoding of structured cache values into the string representation of the store.
//!
//! Values are stored as compact JSON. Fields which are absent on the Rust side are not written,
//! fields unknown to the Rust type are ignored when reading.
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Encodes a value into its stored string representation.
pub fn encode<T: Serialize>(value: &T) -> Result<String, CodecError> {
    serde_json::to_string(value).map_err(CodecError::Encode)
}

/// Decodes a value from its stored string representation.
pub fn decode<T: DeserializeOwned>(value: &str) -> Result<T, CodecError> {
    serde_json::from_str(value).map_err(CodecError::Decode)
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed encoding value: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed decoding value: {0}")]
    Decode(#[source] serde_json::Error),
}
