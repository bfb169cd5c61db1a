//! Entity identifiers
//!
//! A record is looked up either by the id the store assigned or, while a
//! create is in flight, by a client-generated temporary key. The two live in
//! separate variants so a temporary key can never collide with a server id.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

const TEMP_PREFIX: &str = "temp-";

/// Client-generated key used until the authoritative id is known.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TempKey(String);

impl TempKey {
    /// Time-ordered key (`temp-<uuid v7>`).
    pub fn generate() -> Self {
        Self(format!("{TEMP_PREFIX}{}", Uuid::now_v7()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TempKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Current lookup key of a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    /// Assigned by the remote store
    Server(i64),
    /// Speculative record awaiting settlement
    Temp(TempKey),
}

impl EntityId {
    pub fn temp() -> Self {
        EntityId::Temp(TempKey::generate())
    }

    pub fn is_temporary(&self) -> bool {
        matches!(self, EntityId::Temp(_))
    }

    /// Authoritative id, if the record has one.
    pub fn server_id(&self) -> Option<i64> {
        match self {
            EntityId::Server(id) => Some(*id),
            EntityId::Temp(_) => None,
        }
    }
}

impl From<i64> for EntityId {
    fn from(id: i64) -> Self {
        EntityId::Server(id)
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityId::Server(id) => write!(f, "{id}"),
            EntityId::Temp(key) => write!(f, "{key}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_keys_are_distinct_and_prefixed() {
        let a = TempKey::generate();
        let b = TempKey::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("temp-"));
    }

    #[test]
    fn test_entity_id_json_shapes() {
        let server: EntityId = serde_json::from_str("42").unwrap();
        assert_eq!(server, EntityId::Server(42));

        let temp: EntityId = serde_json::from_str("\"temp-abc\"").unwrap();
        assert!(temp.is_temporary());
        assert_eq!(temp.server_id(), None);
        assert_eq!(serde_json::to_string(&temp).unwrap(), "\"temp-abc\"");
    }
}
