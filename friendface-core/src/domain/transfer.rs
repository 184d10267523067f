//! Wire representation of the profile feed
//!
//! These mirror the remote JSON exactly. Every field is required; a missing
//! or mistyped field fails the whole decode.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// User object from the profile feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferUser {
    pub id: String,
    pub is_active: bool,
    pub name: String,
    /// Kept wide here; narrowing to the stored range is the ingest engine's job
    pub age: i64,
    pub company: String,
    pub email: String,
    pub address: String,
    pub about: String,
    #[serde(deserialize_with = "deserialize_registered")]
    pub registered: DateTime<Utc>,
    pub tags: Vec<String>,
    pub friends: Vec<TransferFriend>,
}

/// Nested friend reference from the profile feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferFriend {
    pub id: String,
    pub name: String,
}

/// Decode a complete feed document
pub fn decode_users(bytes: &[u8]) -> serde_json::Result<Vec<TransferUser>> {
    serde_json::from_slice(bytes)
}

/// Parse an ISO-8601 timestamp
///
/// Accepts RFC 3339 with any offset (including `-00:00`) and, failing that,
/// an offset-less timestamp which is taken as UTC.
pub fn parse_iso8601(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn deserialize_registered<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    let s = String::deserialize(deserializer)?;
    parse_iso8601(&s)
        .ok_or_else(|| D::Error::custom(format!("invalid ISO-8601 timestamp: {}", s)))
}
