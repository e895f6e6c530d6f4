//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Port the proxy listens on when nothing else is configured.
pub const DEFAULT_PORT: u16 = 8888;

/// Root configuration for the forward proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, port).
    pub listener: ListenerConfig,

    /// Socket timeouts.
    pub timeouts: TimeoutConfig,

    /// Framing and relay buffer limits.
    pub limits: LimitsConfig,

    /// Client registry settings.
    pub clients: ClientsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Read-only admin status surface.
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Interface address to bind (e.g., "0.0.0.0").
    pub bind_address: String,

    /// TCP port clients are configured to use.
    pub port: u16,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

/// Timeout configuration for socket operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Idle timeout applied to every read and write, in seconds.
    pub idle_secs: u64,

    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            idle_secs: 30,
            connect_secs: 30,
        }
    }
}

impl TimeoutConfig {
    pub fn idle(&self) -> Duration {
        Duration::from_secs(self.idle_secs)
    }

    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }
}

/// Buffer sizes and the header size ceiling.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum bytes buffered while looking for the end of the header block.
    pub max_header_bytes: usize,

    /// Chunk size used when framing the request header.
    pub read_chunk_bytes: usize,

    /// Chunk size used by each relay direction.
    pub relay_chunk_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_header_bytes: 64 * 1024,
            read_chunk_bytes: 4096,
            relay_chunk_bytes: 8192,
        }
    }
}

/// Client registry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientsConfig {
    /// Seconds after which an address that has not reconnected is forgotten.
    pub ttl_secs: u64,
}

impl Default for ClientsConfig {
    fn default() -> Self {
        Self { ttl_secs: 120 }
    }
}

impl ClientsConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default tracing filter when `RUST_LOG` is unset.
    pub log_filter: String,

    /// Number of lines the in-memory log buffer retains.
    pub log_buffer_lines: usize,

    /// Enable the Prometheus scrape endpoint.
    pub metrics_enabled: bool,

    /// Address for the Prometheus scrape endpoint.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: "hotspot_proxy=info".to_string(),
            log_buffer_lines: 200,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Admin status surface configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Serve the status endpoints.
    pub enabled: bool,

    /// Address the admin router binds to.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_address: "127.0.0.1:8889".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let config: ProxyConfig = toml::from_str("").unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0");
        assert_eq!(config.listener.port, DEFAULT_PORT);
        assert_eq!(config.timeouts.idle(), Duration::from_secs(30));
        assert_eq!(config.limits.max_header_bytes, 65_536);
        assert_eq!(config.clients.ttl(), Duration::from_secs(120));
        assert!(!config.admin.enabled);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config: ProxyConfig = toml::from_str(
            r#"
            [listener]
            port = 3128

            [timeouts]
            idle_secs = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.listener.port, 3128);
        assert_eq!(config.listener.bind_address, "0.0.0.0");
        assert_eq!(config.timeouts.idle_secs, 5);
        assert_eq!(config.timeouts.connect_secs, 30);
    }
}
