pub mod blessing;
pub mod chat;
pub mod goal;
pub mod habit;
pub mod milestone;
pub mod profile;
pub mod quote;
pub mod reward;
pub mod vision;

use serde::{Deserialize, Deserializer};

/// Deserializes a present field (including an explicit `null`) into `Some(..)`.
///
/// Paired with `#[serde(default)]` on an `Option<Option<T>>` field this lets a
/// patch tell "leave unchanged" (absent) apart from "clear" (`null`).
pub fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}
