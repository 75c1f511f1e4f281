//! Runtime configuration, filled in by the binary from flags and environment.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::{DEFAULT_QUERY_ENDPOINT, DEFAULT_USER_AGENT};

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub query_endpoint: String,
    /// Credential used when neither the page nor the caller provides one.
    pub fallback_api_key: Option<String>,
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 3000,
            query_endpoint: DEFAULT_QUERY_ENDPOINT.to_string(),
            fallback_api_key: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl Config {
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Drops blank values so an empty environment variable means "unset".
    pub fn with_fallback_api_key(mut self, key: Option<String>) -> Self {
        self.fallback_api_key = key.filter(|k| !k.trim().is_empty());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_fallback_key_is_unset() {
        let config = Config::default().with_fallback_api_key(Some("  ".into()));
        assert_eq!(config.fallback_api_key, None);

        let config = Config::default().with_fallback_api_key(Some("da2-key".into()));
        assert_eq!(config.fallback_api_key.as_deref(), Some("da2-key"));
        assert_eq!(config.bind_addr().port(), 3000);
    }
}
