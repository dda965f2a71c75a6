//! Master configuration.

use wiremesh_store::keys;

/// Configuration for a master node.
#[derive(Debug, Clone)]
pub struct MasterConfig {
    /// HTTP listen port.
    pub port: String,

    /// Store endpoint.
    pub redis_addr: String,

    /// Key namespace for minion registry entries; must match the minions'.
    pub minion_key_prefix: String,
}

impl MasterConfig {
    /// Load configuration from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            port: lookup("PORT").unwrap_or_else(|| "8081".to_string()),
            redis_addr: lookup("REDIS_ADDR").unwrap_or_else(|| ":6379".to_string()),
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
        let config = MasterConfig::from_lookup(|_| None);
        assert_eq!(config.port, "8081");
        assert_eq!(config.redis_addr, ":6379");
        assert_eq!(config.minion_key_prefix, "minion:");
        assert_eq!(config.listen_addr(), "0.0.0.0:8081");
    }

    #[test]
    fn env_overrides() {
        let config = MasterConfig::from_lookup(|name| match name {
            "PORT" => Some("9000".to_string()),
            "REDIS_SERVER_PREFIX" => Some("Server:".to_string()),
            _ => None,
        });
        assert_eq!(config.port, "9000");
        assert_eq!(config.minion_key_prefix, "Server:");
    }
}
