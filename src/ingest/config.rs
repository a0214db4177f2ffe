//! Gateway configuration

use std::time::Duration;

use crate::mqtt::{MqttOptions, TlsFiles};

/// Topic subscribed to when none is configured
pub const DEFAULT_TOPIC: &str = "3yp/Area001/Bin_001";

/// Client identifier sent in CONNECT when none is configured
pub const DEFAULT_CLIENT_ID: &str = "binwatch-gateway";

/// Ingestion gateway options
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Broker address; `None` means run in simulation mode
    pub endpoint: Option<String>,

    /// Telemetry topic
    pub topic: String,

    /// MQTT client identifier
    pub client_id: String,

    /// Certificates for TLS endpoints
    pub tls: TlsFiles,

    /// MQTT keep-alive interval
    pub keep_alive: Duration,

    /// TCP connect + CONNACK deadline
    pub connect_timeout: Duration,

    /// Fixed delay between reconnect attempts
    pub reconnect_interval: Duration,

    /// Period between synthetic updates in simulation mode
    pub simulation_interval: Duration,

    /// Capacity of the gateway → updater channel
    pub channel_capacity: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            topic: DEFAULT_TOPIC.to_string(),
            client_id: DEFAULT_CLIENT_ID.to_string(),
            tls: TlsFiles::default(),
            keep_alive: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(30),
            reconnect_interval: Duration::from_secs(30),
            simulation_interval: Duration::from_secs(3),
            channel_capacity: 1024,
        }
    }
}

impl GatewayConfig {
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    pub fn tls(mut self, tls: TlsFiles) -> Self {
        self.tls = tls;
        self
    }

    pub fn keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    /// Zero is replaced with one millisecond
    pub fn simulation_interval(mut self, interval: Duration) -> Self {
        self.simulation_interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    pub(crate) fn mqtt_options(&self) -> MqttOptions {
        MqttOptions::new(self.client_id.clone())
            .keep_alive(self.keep_alive)
            .connect_timeout(self.connect_timeout)
    }
}
