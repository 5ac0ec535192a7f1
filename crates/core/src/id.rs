//! Wire-format helpers.
//!
//! The backend is not consistent about identifier encoding: some payloads
//! carry numeric ids, others strings. Domain types store ids as strings and
//! accept either form on the wire. Lists and flags may also arrive as an
//! explicit `null` (a fresh upload has no thumbnails yet).

use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Str(String),
    Int(i64),
    UInt(u64),
}

/// Deserialize an identifier that may be a JSON string or number.
pub fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match RawId::deserialize(deserializer)? {
        RawId::Str(s) => s,
        RawId::Int(n) => n.to_string(),
        RawId::UInt(n) => n.to_string(),
    })
}

/// Deserialize a value that may be `null`, mapping `null` to `T::default()`.
///
/// Pair with `#[serde(default)]` so a missing key behaves the same way.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
