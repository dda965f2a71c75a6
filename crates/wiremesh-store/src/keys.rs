//! Key builders for the shared store.
//!
//! Every crate spells store keys through these helpers so the fleet-wide
//! schema lives in one place:
//!
//! | Key | Type | Purpose |
//! |---|---|---|
//! | `minion:<id>` | hash + TTL | minion liveness registry |
//! | `client:<id>` | string | client presence mapping |
//! | `peer:<id>` | list | minion inbox for peer traffic |
//! | `master:<id>` | list | minion inbox for master traffic |
//! | `master` | string + TTL | leader lease |
//!
//! The minion registry prefix is configurable (`REDIS_SERVER_PREFIX`) so a
//! fleet can be re-namespaced; the remaining prefixes are fixed.

/// Default key prefix for minion registry entries.
pub const DEFAULT_MINION_PREFIX: &str = "minion:";

/// Key prefix for client presence entries.
pub const CLIENT_PREFIX: &str = "client:";

/// Key prefix for per-minion peer inboxes.
pub const PEER_PREFIX: &str = "peer:";

/// Key prefix for per-minion master inboxes.
pub const MASTER_PREFIX: &str = "master:";

/// The leader lease key.
pub const MASTER_LEASE_KEY: &str = "master";

/// Registry hash field holding the advertised IP.
pub const FIELD_IP: &str = "ip";

/// Registry hash field holding the advertised port.
pub const FIELD_PORT: &str = "port";

/// Registry hash field holding the live connection count.
pub const FIELD_CONNECTIONS: &str = "connections";

/// Build a client presence key: `client:<id>`.
#[must_use]
pub fn client_key(client_id: &str) -> String {
    format!("{CLIENT_PREFIX}{client_id}")
}

/// Build a minion registry key under the given prefix.
#[must_use]
pub fn minion_key(prefix: &str, minion_id: &str) -> String {
    format!("{prefix}{minion_id}")
}

/// Build the scan pattern matching every minion registry key.
#[must_use]
pub fn minion_pattern(prefix: &str) -> String {
    format!("{prefix}*")
}

/// Extract the minion id from a registry key, if it carries the prefix.
#[must_use]
pub fn minion_id_from_key<'a>(prefix: &str, key: &'a str) -> Option<&'a str> {
    key.strip_prefix(prefix)
}

/// Build a peer inbox key: `peer:<minion-id>`.
#[must_use]
pub fn peer_inbox(minion_id: &str) -> String {
    format!("{PEER_PREFIX}{minion_id}")
}

/// Build a master inbox key: `master:<minion-id>`.
#[must_use]
pub fn master_inbox(minion_id: &str) -> String {
    format!("{MASTER_PREFIX}{minion_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_shapes() {
        assert_eq!(client_key("42"), "client:42");
        assert_eq!(minion_key(DEFAULT_MINION_PREFIX, "m1"), "minion:m1");
        assert_eq!(peer_inbox("m1"), "peer:m1");
        assert_eq!(master_inbox("m1"), "master:m1");
        assert_eq!(minion_pattern(DEFAULT_MINION_PREFIX), "minion:*");
    }

    #[test]
    fn minion_id_extraction() {
        assert_eq!(
            minion_id_from_key(DEFAULT_MINION_PREFIX, "minion:abc"),
            Some("abc")
        );
        assert_eq!(minion_id_from_key(DEFAULT_MINION_PREFIX, "client:abc"), None);
    }

    #[test]
    fn custom_prefix() {
        assert_eq!(minion_key("Server:", "m1"), "Server:m1");
        assert_eq!(minion_pattern("Server:"), "Server:*");
        assert_eq!(minion_id_from_key("Server:", "Server:m1"), Some("m1"));
    }
}
