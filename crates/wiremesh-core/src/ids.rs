//! Core identifier types for wiremesh.
//!
//! This module provides strongly-typed identifiers for clients, minion
//! nodes, and socket sessions. Client ids are opaque strings assigned by the
//! authentication layer; minion ids and session nonces are UUIDs generated
//! locally.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An opaque, fleet-unique client identifier.
///
/// Client ids are extracted from bearer-token `sub` claims at connection
/// acceptance and never invented by a node.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    /// Return the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the id is the empty string.
    ///
    /// Empty ids never name a real client; presence lookups bucket unknown
    /// recipients under the empty id so routing can discard them.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for ClientId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ClientId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Debug for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClientId({})", self.0)
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ClientId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A minion node identifier, freshly generated per boot (UUID v4).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MinionId(uuid::Uuid);

impl MinionId {
    /// Generate a new random `MinionId`.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Create a `MinionId` from a UUID.
    #[must_use]
    pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }

    /// Return the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl FromStr for MinionId {
    type Err = IdError;

    /// Parse a `MinionId` from a UUID string.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = uuid::Uuid::parse_str(s).map_err(|_| IdError::InvalidUuid)?;
        Ok(Self(uuid))
    }
}

impl fmt::Debug for MinionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MinionId({})", self.0)
    }
}

impl fmt::Display for MinionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for MinionId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MinionId> for String {
    fn from(id: MinionId) -> Self {
        id.0.to_string()
    }
}

/// A per-attach session nonce (UUID v4).
///
/// Two overlapping attaches for the same [`ClientId`] carry distinct nonces,
/// so a stale reader or writer cannot unregister a replacement session.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionNonce(uuid::Uuid);

impl SessionNonce {
    /// Generate a new random `SessionNonce`.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Create a `SessionNonce` from a UUID.
    #[must_use]
    pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }
}

impl FromStr for SessionNonce {
    type Err = IdError;

    /// Parse a `SessionNonce` from a UUID string.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = uuid::Uuid::parse_str(s).map_err(|_| IdError::InvalidUuid)?;
        Ok(Self(uuid))
    }
}

impl fmt::Debug for SessionNonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionNonce({})", self.0)
    }
}

impl fmt::Display for SessionNonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for SessionNonce {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SessionNonce> for String {
    fn from(nonce: SessionNonce) -> Self {
        nonce.0.to_string()
    }
}

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The input is not a valid UUID.
    #[error("invalid UUID format")]
    InvalidUuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_id_roundtrip() {
        let id = ClientId::from("player-42");
        assert_eq!(id.as_str(), "player-42");
        assert_eq!(id.to_string(), "player-42");
        assert!(!id.is_empty());
    }

    #[test]
    fn client_id_empty() {
        let id = ClientId::default();
        assert!(id.is_empty());
    }

    #[test]
    fn client_id_serde_transparent() {
        let id = ClientId::from("abc");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"abc\"");
        let parsed: ClientId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn minion_id_roundtrip() {
        let id = MinionId::generate();
        let str_repr = id.to_string();
        let parsed = MinionId::from_str(&str_repr).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn minion_id_unique_per_generate() {
        assert_ne!(MinionId::generate(), MinionId::generate());
    }

    #[test]
    fn minion_id_invalid_uuid() {
        let result = MinionId::from_str("not-a-uuid");
        assert!(matches!(result, Err(IdError::InvalidUuid)));
    }

    #[test]
    fn minion_id_serde_json() {
        let id = MinionId::generate();
        let json = serde_json::to_string(&id).unwrap();
        let parsed: MinionId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn session_nonce_distinct_per_attach() {
        let a = SessionNonce::generate();
        let b = SessionNonce::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn session_nonce_roundtrip() {
        let nonce = SessionNonce::generate();
        let parsed = SessionNonce::from_str(&nonce.to_string()).unwrap();
        assert_eq!(nonce, parsed);
    }
}
