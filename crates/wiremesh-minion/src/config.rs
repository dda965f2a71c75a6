//! Minion configuration.
//!
//! Loaded from the environment at startup with defaults for local
//! development. The broker store (presence + inboxes) and registrar store
//! (liveness registry) can point at separate Redis deployments; both fall
//! back to `REDIS_ADDR`.

use wiremesh_store::keys;

/// Configuration for a minion node.
#[derive(Debug, Clone)]
pub struct MinionConfig {
    /// Externally reachable IP, advertised in the registry hash.
    pub external_ip: String,

    /// HTTP listen port.
    pub port: String,

    /// Shared secret for bearer-token verification.
    pub secret: Vec<u8>,

    /// Per-minion connection ceiling.
    pub max_connections: usize,

    /// Maximum inbound frame size in bytes.
    pub max_message_size: usize,

    /// Store endpoint for hub traffic (presence + inboxes).
    pub redis_broker_addr: String,

    /// Store endpoint for the liveness registry.
    pub redis_registrar_addr: String,

    /// Key namespace for minion registry entries.
    pub minion_key_prefix: String,
}

impl MinionConfig {
    /// Load configuration from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let redis_addr = lookup("REDIS_ADDR").unwrap_or_else(|| ":6379".to_string());

        Self {
            external_ip: lookup("EXTERNAL_IP").unwrap_or_else(|| ":".to_string()),
            port: lookup("PORT").unwrap_or_else(|| "8080".to_string()),
            secret: lookup("SECRET")
                .unwrap_or_else(|| "secret".to_string())
                .into_bytes(),
            max_connections: lookup("MAX_CONNECTIONS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(255),
            max_message_size: lookup("MAX_MESSAGE_SIZE")
                .and_then(|v| v.parse().ok())
                .unwrap_or(512),
            redis_broker_addr: lookup("REDIS_BROKER_ADDR").unwrap_or_else(|| redis_addr.clone()),
            redis_registrar_addr: lookup("REDIS_REGISTRAR_ADDR").unwrap_or_else(|| redis_addr),
            minion_key_prefix: lookup("REDIS_SERVER_PREFIX")
                .unwrap_or_else(|| keys::DEFAULT_MINION_PREFIX.to_string()),
        }
    }

    /// The socket address to bind the HTTP server on.
    #[must_use]
    pub fn listen_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = MinionConfig::from_lookup(|_| None);
        assert_eq!(config.external_ip, ":");
        assert_eq!(config.port, "8080");
        assert_eq!(config.secret, b"secret");
        assert_eq!(config.max_connections, 255);
        assert_eq!(config.max_message_size, 512);
        assert_eq!(config.redis_broker_addr, ":6379");
        assert_eq!(config.redis_registrar_addr, ":6379");
        assert_eq!(config.minion_key_prefix, "minion:");
        assert_eq!(config.listen_addr(), "0.0.0.0:8080");
    }

    #[test]
    fn broker_and_registrar_fall_back_to_redis_addr() {
        let config = MinionConfig::from_lookup(|name| match name {
            "REDIS_ADDR" => Some("cache.internal:7000".to_string()),
            _ => None,
        });
        assert_eq!(config.redis_broker_addr, "cache.internal:7000");
        assert_eq!(config.redis_registrar_addr, "cache.internal:7000");
    }

    #[test]
    fn split_store_endpoints() {
        let config = MinionConfig::from_lookup(|name| match name {
            "REDIS_BROKER_ADDR" => Some(":6379".to_string()),
            "REDIS_REGISTRAR_ADDR" => Some(":6380".to_string()),
            _ => None,
        });
        assert_eq!(config.redis_broker_addr, ":6379");
        assert_eq!(config.redis_registrar_addr, ":6380");
    }

    #[test]
    fn invalid_numbers_fall_back() {
        let config = MinionConfig::from_lookup(|name| match name {
            "MAX_CONNECTIONS" => Some("lots".to_string()),
            _ => None,
        });
        assert_eq!(config.max_connections, 255);
    }
}
