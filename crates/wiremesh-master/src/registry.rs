//! Fleet registry reads and admin message injection.
//!
//! Minions register themselves as TTL-bounded hashes (`minion:<id>` with
//! `ip`, `port`, `connections`). The master discovers the live fleet by
//! scanning that namespace and reading the hashes; it injects admin traffic
//! by pushing raw frames onto per-minion master inboxes.

use std::collections::HashMap;

use serde::Serialize;

use wiremesh_store::{keys, Store};

use crate::error::AdminError;

/// A minion as seen through the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Minion {
    /// Minion id, derived from the registry key.
    pub id: String,
    /// Advertised external IP.
    pub ip: String,
    /// Advertised port.
    pub port: String,
    /// Live connection count.
    pub connections: u64,
}

/// Read-side registry client plus admin inbox producer.
#[derive(Clone)]
pub struct Registry {
    store: Store,
    prefix: String,
}

impl Registry {
    /// Create a registry client over the given key namespace.
    #[must_use]
    pub fn new(store: Store, prefix: String) -> Self {
        Self { store, prefix }
    }

    /// All live minion registry keys.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails.
    pub async fn minion_keys(&self) -> Result<Vec<String>, AdminError> {
        Ok(self
            .store
            .scan_keys(&keys::minion_pattern(&self.prefix))
            .await?)
    }

    /// List every live minion.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan or the pipelined hash reads fail, or if
    /// a discovered entry vanished before it could be read.
    pub async fn list(&self) -> Result<Vec<Minion>, AdminError> {
        let minion_keys = self.minion_keys().await?;
        let hashes = self.store.hget_all_multi(&minion_keys).await?;

        minion_keys
            .iter()
            .zip(hashes)
            .map(|(key, hash)| {
                let id = keys::minion_id_from_key(&self.prefix, key).unwrap_or(key);
                parse_minion(id, &hash)
            })
            .collect()
    }

    /// Get one minion by id.
    ///
    /// # Errors
    ///
    /// Returns [`AdminError::MinionNotFound`] if the entry does not exist.
    pub async fn get(&self, minion_id: &str) -> Result<Minion, AdminError> {
        let hash = self
            .store
            .hget_all(&keys::minion_key(&self.prefix, minion_id))
            .await?;
        parse_minion(minion_id, &hash)
    }

    /// Push a raw frame onto one minion's master inbox.
    ///
    /// # Errors
    ///
    /// Returns [`AdminError::MinionNotFound`] if the minion is not
    /// registered, or a store error if the push fails.
    pub async fn send(&self, minion_id: &str, data: &[u8]) -> Result<(), AdminError> {
        let registered = self
            .store
            .exists(&keys::minion_key(&self.prefix, minion_id))
            .await?;
        if !registered {
            tracing::warn!(minion_id = %minion_id, "send to unregistered minion");
            return Err(AdminError::MinionNotFound);
        }

        Ok(self
            .store
            .rpush(&keys::master_inbox(minion_id), data)
            .await?)
    }

    /// Push a raw frame onto every registered minion's master inbox in one
    /// transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if discovery or the transactional push fails.
    pub async fn broadcast(&self, data: &[u8]) -> Result<(), AdminError> {
        let inboxes: Vec<String> = self
            .minion_keys()
            .await?
            .iter()
            .filter_map(|key| keys::minion_id_from_key(&self.prefix, key))
            .map(keys::master_inbox)
            .collect();

        Ok(self.store.rpush_multi(&inboxes, data).await?)
    }
}

/// Build a [`Minion`] from its registry hash. An empty hash means the entry
/// expired between discovery and read.
fn parse_minion(id: &str, hash: &HashMap<String, String>) -> Result<Minion, AdminError> {
    if hash.is_empty() {
        return Err(AdminError::MinionNotFound);
    }

    Ok(Minion {
        id: id.to_string(),
        ip: hash.get(keys::FIELD_IP).cloned().unwrap_or_default(),
        port: hash.get(keys::FIELD_PORT).cloned().unwrap_or_default(),
        connections: hash
            .get(keys::FIELD_CONNECTIONS)
            .and_then(|value| value.parse().ok())
            .unwrap_or(0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn parse_full_entry() {
        let minion = parse_minion(
            "m1",
            &hash(&[("ip", "10.0.0.5"), ("port", "8080"), ("connections", "17")]),
        )
        .unwrap();

        assert_eq!(
            minion,
            Minion {
                id: "m1".to_string(),
                ip: "10.0.0.5".to_string(),
                port: "8080".to_string(),
                connections: 17,
            }
        );
    }

    #[test]
    fn empty_hash_is_not_found() {
        let result = parse_minion("m1", &HashMap::new());
        assert!(matches!(result, Err(AdminError::MinionNotFound)));
    }

    #[test]
    fn missing_fields_default() {
        let minion = parse_minion("m1", &hash(&[("ip", "10.0.0.5")])).unwrap();
        assert_eq!(minion.port, "");
        assert_eq!(minion.connections, 0);
    }

    #[test]
    fn garbled_connection_count_defaults() {
        let minion = parse_minion("m1", &hash(&[("ip", "x"), ("connections", "many")])).unwrap();
        assert_eq!(minion.connections, 0);
    }

    #[test]
    fn minion_serializes_to_json() {
        let minion = Minion {
            id: "m1".to_string(),
            ip: "10.0.0.5".to_string(),
            port: "8080".to_string(),
            connections: 2,
        };
        let json = serde_json::to_value(&minion).unwrap();
        assert_eq!(json["id"], "m1");
        assert_eq!(json["connections"], 2);
    }
}
