//! The fleet-wide presence directory.
//!
//! Presence maps each connected client to the minion currently serving it,
//! as plain `client:<id>` keys in the shared store. Entries carry no TTL;
//! the hub clears them on disconnect and on shutdown, and a crashed node's
//! stale entries are overwritten when the client reconnects elsewhere.

use std::collections::HashMap;

use wiremesh_core::{ClientId, MinionId};
use wiremesh_store::{keys, Result, Store};

/// Client-to-minion directory operations for one minion.
#[derive(Clone)]
pub struct Presence {
    minion_id: String,
    store: Store,
}

impl Presence {
    /// Create a presence handle writing entries for `minion_id`.
    #[must_use]
    pub fn new(minion_id: &MinionId, store: Store) -> Self {
        Self {
            minion_id: minion_id.to_string(),
            store,
        }
    }

    /// Record that `client_id` is connected to this minion.
    ///
    /// # Errors
    ///
    /// Returns an error if the store write fails.
    pub async fn add(&self, client_id: &ClientId) -> Result<()> {
        self.store
            .set(&keys::client_key(client_id.as_str()), &self.minion_id)
            .await
    }

    /// Remove the presence entry for `client_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store delete fails.
    pub async fn remove(&self, client_id: &ClientId) -> Result<()> {
        self.store.del(&keys::client_key(client_id.as_str())).await
    }

    /// Remove several presence entries in one transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails.
    pub async fn remove_multi(&self, client_ids: &[ClientId]) -> Result<()> {
        let keys: Vec<String> = client_ids
            .iter()
            .map(|id| keys::client_key(id.as_str()))
            .collect();
        self.store.del_multi(&keys).await
    }

    /// Locate clients, bucketing them by the minion currently serving each.
    ///
    /// Unknown clients bucket under the empty minion id; routing must drop
    /// that bucket rather than broadcast it.
    ///
    /// # Errors
    ///
    /// Returns an error if the pipelined lookup fails; the caller drops the
    /// affected envelope and does not retry.
    pub async fn locate(
        &self,
        client_ids: &[ClientId],
    ) -> Result<HashMap<String, Vec<ClientId>>> {
        if client_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let keys: Vec<String> = client_ids
            .iter()
            .map(|id| keys::client_key(id.as_str()))
            .collect();
        let values = self.store.mget(&keys).await?;

        Ok(bucket_by_location(client_ids, values))
    }
}

/// Group client ids by the minion id their presence entry names.
///
/// Missing entries (`None`) land in the empty-string bucket.
fn bucket_by_location(
    client_ids: &[ClientId],
    values: Vec<Option<String>>,
) -> HashMap<String, Vec<ClientId>> {
    let mut locations: HashMap<String, Vec<ClientId>> = HashMap::new();

    for (client_id, value) in client_ids.iter().zip(values) {
        locations
            .entry(value.unwrap_or_default())
            .or_default()
            .push(client_id.clone());
    }

    locations
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[&str]) -> Vec<ClientId> {
        raw.iter().map(|r| ClientId::from(*r)).collect()
    }

    #[test]
    fn bucket_groups_by_minion() {
        let clients = ids(&["1", "2", "3"]);
        let values = vec![
            Some("m1".to_string()),
            Some("m2".to_string()),
            Some("m1".to_string()),
        ];

        let buckets = bucket_by_location(&clients, values);
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets["m1"], ids(&["1", "3"]));
        assert_eq!(buckets["m2"], ids(&["2"]));
    }

    #[test]
    fn unknown_clients_bucket_under_empty() {
        let clients = ids(&["1", "99"]);
        let values = vec![Some("m1".to_string()), None];

        let buckets = bucket_by_location(&clients, values);
        assert_eq!(buckets[""], ids(&["99"]));
        assert_eq!(buckets["m1"], ids(&["1"]));
    }

    #[test]
    fn empty_input_yields_empty_map() {
        let buckets = bucket_by_location(&[], Vec::new());
        assert!(buckets.is_empty());
    }
}
