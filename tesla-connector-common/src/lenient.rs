//! Deserialize helpers that never fail.
//!
//! The owner API leaves fields out, sends `null`, or changes types between firmware
//! versions. A field that can't be decoded falls back to its default value.

use serde::{de::DeserializeOwned, Deserialize, Deserializer};
use serde_json::Value;

/// Deserialize a value, or the default if it has the wrong type or is `null`.
///
/// Use together with `#[serde(default)]` so that missing fields also get the default.
///
/// # Errors
///
/// Only if the underlying deserializer can't produce any value at all.
pub fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).unwrap_or_default())
}

/// Deserialize an optional value, treating anything undecodable as absent.
///
/// # Errors
///
/// Only if the underlying deserializer can't produce any value at all.
pub fn or_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).ok())
}

/// Decode a whole payload, falling back to the default value.
#[must_use]
pub fn decode<T>(value: &Value) -> T
where
    T: DeserializeOwned + Default,
{
    T::deserialize(value).unwrap_or_else(|err| {
        tracing::debug!("Could not decode payload, using defaults: {err}");
        T::default()
    })
}
