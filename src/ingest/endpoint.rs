//! Broker endpoint parsing and resolution

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use crate::error::BrokerError;

/// Default plain MQTT port
pub const DEFAULT_MQTT_PORT: u16 = 1883;

/// Default MQTT over TLS port
pub const DEFAULT_MQTTS_PORT: u16 = 8883;

/// How bytes reach the broker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Tcp,
    Tls,
}

impl Transport {
    pub fn default_port(self) -> u16 {
        match self {
            Transport::Tcp => DEFAULT_MQTT_PORT,
            Transport::Tls => DEFAULT_MQTTS_PORT,
        }
    }

    fn scheme(self) -> &'static str {
        match self {
            Transport::Tcp => "mqtt",
            Transport::Tls => "mqtts",
        }
    }
}

/// A validated broker address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerEndpoint {
    pub transport: Transport,
    pub host: String,
    pub port: u16,
}

impl BrokerEndpoint {
    /// Parse `[scheme://]host[:port][/path]`
    ///
    /// `mqtt` and `tcp` are plain TCP; `mqtts`, `ssl` and `tls` are TLS. A
    /// bare host is a managed broker and gets TLS. WebSocket schemes are
    /// rejected.
    pub fn parse(raw: &str) -> Result<Self, BrokerError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(BrokerError::Misconfigured("no broker endpoint configured".into()));
        }

        let (transport, rest) = match raw.split_once("://") {
            Some((scheme, rest)) => match scheme.to_ascii_lowercase().as_str() {
                "mqtt" | "tcp" => (Transport::Tcp, rest),
                "mqtts" | "ssl" | "tls" => (Transport::Tls, rest),
                "ws" | "wss" => {
                    return Err(BrokerError::Misconfigured(format!(
                        "unsupported transport `{scheme}` in {raw}"
                    )));
                }
                _ => {
                    return Err(BrokerError::Misconfigured(format!(
                        "unknown scheme `{scheme}` in {raw}"
                    )));
                }
            },
            None => (Transport::Tls, raw),
        };

        // Drop any path and user info
        let authority = rest.split('/').next().unwrap_or_default();
        let authority = authority.rsplit('@').next().unwrap_or_default();

        let (host, port) = split_host_port(authority, transport.default_port())
            .ok_or_else(|| BrokerError::Misconfigured(format!("invalid broker address {raw}")))?;

        if !is_valid_host(host) {
            return Err(BrokerError::Misconfigured(format!(
                "`{host}` is not a valid hostname"
            )));
        }

        Ok(Self {
            transport,
            host: host.to_string(),
            port,
        })
    }

    /// Resolve to socket addresses
    ///
    /// A hostname that cannot be resolved is fatal: retrying will not help
    /// until the configuration changes.
    pub async fn resolve(&self) -> Result<Vec<SocketAddr>, BrokerError> {
        let addrs: Vec<SocketAddr> = tokio::net::lookup_host((self.host.as_str(), self.port))
            .await
            .map_err(|e| BrokerError::Unreachable(format!("{}: {}", self.host, e)))?
            .collect();

        if addrs.is_empty() {
            return Err(BrokerError::Unreachable(format!(
                "{}: no addresses found",
                self.host
            )));
        }

        Ok(addrs)
    }
}

impl FromStr for BrokerEndpoint {
    type Err = BrokerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for BrokerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = self.transport.scheme();
        if self.host.contains(':') {
            write!(f, "{scheme}://[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{scheme}://{}:{}", self.host, self.port)
        }
    }
}

fn split_host_port(authority: &str, default_port: u16) -> Option<(&str, u16)> {
    // [v6]:port
    if let Some(rest) = authority.strip_prefix('[') {
        let (host, after) = rest.split_once(']')?;
        let port = match after {
            "" => default_port,
            p => p.strip_prefix(':')?.parse().ok()?,
        };
        return Some((host, port));
    }

    match authority.rsplit_once(':') {
        Some((host, port)) => Some((host, port.parse().ok()?)),
        None => Some((authority, default_port)),
    }
}

/// Hostname shape check (RFC 1123 labels) or an IP literal
fn is_valid_host(host: &str) -> bool {
    if host.parse::<IpAddr>().is_ok() {
        return true;
    }

    if host.is_empty() || host.len() > 253 {
        return false;
    }

    host.trim_end_matches('.').split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}
