//! Server configuration

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::fanout::DEFAULT_BROADCAST_CAPACITY;
use crate::ingest::GatewayConfig;
use crate::registry::RegistryConfig;

/// HTTP port used when none is configured
pub const DEFAULT_PORT: u16 = 1337;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the HTTP listener to
    pub bind_addr: SocketAddr,

    /// Per-observer event buffer; slower observers lose the oldest events
    pub broadcast_capacity: usize,

    /// Register `Bin_001`..`Bin_003` at startup
    pub seed_demo_bins: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            broadcast_capacity: DEFAULT_BROADCAST_CAPACITY,
            seed_demo_bins: false,
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the observer buffer size
    pub fn broadcast_capacity(mut self, capacity: usize) -> Self {
        self.broadcast_capacity = capacity.max(1);
        self
    }

    /// Register demo bins at startup
    pub fn seed_demo_bins(mut self, seed: bool) -> Self {
        self.seed_demo_bins = seed;
        self
    }
}

/// Complete service configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub server: ServerConfig,
    pub gateway: GatewayConfig,
    pub registry: RegistryConfig,
}

impl Config {
    /// Build from process environment variables
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `MQTT_ENDPOINT` | unset (simulation mode) |
    /// | `MQTT_TOPIC` | `3yp/Area001/Bin_001` |
    /// | `MQTT_CLIENT_ID` | `binwatch-gateway` |
    /// | `MQTT_CA_PATH` | unset (Mozilla roots) |
    /// | `MQTT_CERT_PATH`, `MQTT_KEY_PATH` | unset (no client certificate) |
    /// | `BINWATCH_ADDR` | `0.0.0.0:1337` |
    /// | `BINWATCH_SEED_BINS` | `false` |
    /// | `BINWATCH_SIMULATION_INTERVAL_MS` | `3000` |
    /// | `BINWATCH_RECONNECT_INTERVAL_MS` | `30000` |
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut config = Config::default();

        if let Some(endpoint) = get("MQTT_ENDPOINT") {
            config.gateway = config.gateway.endpoint(endpoint);
        }
        if let Some(topic) = get("MQTT_TOPIC") {
            config.gateway = config.gateway.topic(topic);
        }
        if let Some(client_id) = get("MQTT_CLIENT_ID") {
            config.gateway = config.gateway.client_id(client_id);
        }
        if let Some(path) = get("MQTT_CA_PATH") {
            config.gateway.tls.ca = Some(path.into());
        }
        if let Some(path) = get("MQTT_CERT_PATH") {
            config.gateway.tls.cert = Some(path.into());
        }
        if let Some(path) = get("MQTT_KEY_PATH") {
            config.gateway.tls.key = Some(path.into());
        }
        if let Some(ms) = get("BINWATCH_SIMULATION_INTERVAL_MS") {
            let ms = parse_value::<u64>("BINWATCH_SIMULATION_INTERVAL_MS", &ms)?;
            config.gateway = config.gateway.simulation_interval(Duration::from_millis(ms));
        }
        if let Some(ms) = get("BINWATCH_RECONNECT_INTERVAL_MS") {
            let ms = parse_value::<u64>("BINWATCH_RECONNECT_INTERVAL_MS", &ms)?;
            config.gateway = config.gateway.reconnect_interval(Duration::from_millis(ms));
        }

        if let Some(addr) = get("BINWATCH_ADDR") {
            config.server.bind_addr = parse_value("BINWATCH_ADDR", &addr)?;
        }
        if let Some(seed) = get("BINWATCH_SEED_BINS") {
            config.server.seed_demo_bins = parse_flag("BINWATCH_SEED_BINS", &seed)?;
        }

        Ok(config)
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e| Error::Config(format!("{key}={raw}: {e}")))
}

fn parse_flag(key: &str, raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Config(format!("{key}={raw}: expected a boolean"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mqtt::TlsFiles;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.bind_addr.port(), DEFAULT_PORT);
        assert_eq!(config.broadcast_capacity, DEFAULT_BROADCAST_CAPACITY);
        assert!(!config.seed_demo_bins);
    }

    #[test]
    fn test_builder() {
        let addr: SocketAddr = "127.0.0.1:8080".parse().unwrap();
        let config = ServerConfig::with_addr(addr)
            .broadcast_capacity(0)
            .seed_demo_bins(true);

        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.broadcast_capacity, 1);
        assert!(config.seed_demo_bins);
    }

    #[test]
    fn test_empty_environment() {
        let config = from_pairs(&[]).unwrap();
        assert!(config.gateway.endpoint.is_none());
        assert_eq!(config.gateway.tls, TlsFiles::default());
        assert_eq!(config.gateway.topic, "3yp/Area001/Bin_001");
        assert_eq!(config.server.bind_addr.port(), 1337);
    }

    #[test]
    fn test_environment_overrides() {
        let config = from_pairs(&[
            ("MQTT_ENDPOINT", "mqtt://broker.local:1884"),
            ("MQTT_TOPIC", "bins/#"),
            ("MQTT_CLIENT_ID", "edge-7"),
            ("BINWATCH_ADDR", "127.0.0.1:9000"),
            ("BINWATCH_SEED_BINS", "yes"),
            ("BINWATCH_SIMULATION_INTERVAL_MS", "500"),
            ("BINWATCH_RECONNECT_INTERVAL_MS", "1000"),
        ])
        .unwrap();

        assert_eq!(
            config.gateway.endpoint.as_deref(),
            Some("mqtt://broker.local:1884")
        );
        assert_eq!(config.gateway.topic, "bins/#");
        assert_eq!(config.gateway.client_id, "edge-7");
        assert_eq!(config.gateway.simulation_interval, Duration::from_millis(500));
        assert_eq!(config.gateway.reconnect_interval, Duration::from_secs(1));
        assert_eq!(config.server.bind_addr.port(), 9000);
        assert!(config.server.seed_demo_bins);
    }

    #[test]
    fn test_tls_paths() {
        let config = from_pairs(&[
            ("MQTT_ENDPOINT", "a1b2c3-ats.iot.us-east-1.amazonaws.com"),
            ("MQTT_CA_PATH", "/certs/AmazonRootCA1.pem"),
            ("MQTT_CERT_PATH", "/certs/device.pem.crt"),
            ("MQTT_KEY_PATH", "/certs/private.pem.key"),
        ])
        .unwrap();

        assert_eq!(
            config.gateway.tls,
            TlsFiles::default()
                .ca("/certs/AmazonRootCA1.pem")
                .client_auth("/certs/device.pem.crt", "/certs/private.pem.key")
        );
    }

    #[test]
    fn test_blank_endpoint_is_unset() {
        let config = from_pairs(&[("MQTT_ENDPOINT", "  ")]).unwrap();
        assert!(config.gateway.endpoint.is_none());
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            from_pairs(&[("BINWATCH_ADDR", "nowhere")]),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            from_pairs(&[("BINWATCH_SEED_BINS", "maybe")]),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            from_pairs(&[("BINWATCH_SIMULATION_INTERVAL_MS", "-1")]),
            Err(Error::Config(_))
        ));
    }
}
