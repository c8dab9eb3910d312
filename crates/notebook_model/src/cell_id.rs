//! Cell ID generation

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a notebook cell.
///
/// Serialized as the plain string form so it fits the nbformat `id` field.
/// Notebooks written before cell ids existed get fresh random ids on load.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CellId(String);

impl CellId {
    /// Create a new random CellId
    pub fn new() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Wrap an existing id string
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CellId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CellId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for CellId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid.simple().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_ids_are_unique() {
        assert_ne!(CellId::new(), CellId::new());
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let id = CellId::from_string("abc123");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc123\"");
        let parsed: CellId = serde_json::from_str("\"abc123\"").unwrap();
        assert_eq!(parsed, id);
    }
}
