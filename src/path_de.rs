//! Deserialization that remembers where it failed.
use serde::de::{DeserializeOwned, Deserializer};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("at JSON path {path} → {message}")]
pub struct PathError {
    pub path: String,
    pub message: String,
}

pub fn from_str_with_path<T: DeserializeOwned>(src: &str) -> Result<T, PathError> {
    decode(&mut serde_json::Deserializer::from_str(src))
}

pub fn from_slice_with_path<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, PathError> {
    decode(&mut serde_json::Deserializer::from_slice(bytes))
}

/// Re-read an already parsed document into a typed shape.
pub fn from_value_with_path<T: DeserializeOwned>(value: Value) -> Result<T, PathError> {
    decode(value)
}

fn decode<'de, D, T>(de: D) -> Result<T, PathError>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    serde_path_to_error::deserialize(de).map_err(|err| PathError {
        path: err.path().to_string(),
        message: err.into_inner().to_string(),
    })
}
