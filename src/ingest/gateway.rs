//! Broker connection loop
//!
//! Owns the MQTT connection. Payloads are forwarded untouched to the updater;
//! parsing happens there. When the broker is misconfigured or cannot be
//! resolved the gateway switches to simulation mode for the rest of the
//! process lifetime.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::error::BrokerError;
use crate::mqtt::{connect_tcp, MqttClient, QoS, TlsConnector};
use crate::query::BinService;

use super::config::GatewayConfig;
use super::endpoint::{BrokerEndpoint, Transport};
use super::simulator::Simulator;
use super::state::{GatewayState, StateTracker};
use super::updater::{self, Inbound, Updater};

/// Ingestion gateway
pub struct IngestionGateway {
    config: GatewayConfig,
    service: BinService,
    state: StateTracker,
    fatal_reported: AtomicBool,
}

impl IngestionGateway {
    pub fn new(config: GatewayConfig, service: BinService) -> Self {
        Self {
            config,
            service,
            state: StateTracker::new(),
            fatal_reported: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn state(&self) -> watch::Receiver<GatewayState> {
        self.state.subscribe()
    }

    /// Spawn the updater and the broker (or simulation) task
    pub fn spawn(self) -> GatewayHandle {
        let (tx, rx) = updater::channel(self.config.channel_capacity);
        let updater = tokio::spawn(Updater::new(self.service.clone(), rx).run());

        let gateway = Arc::new(self);
        let state = gateway.state();
        let source = tokio::spawn(gateway.run(tx));

        GatewayHandle {
            state,
            tasks: vec![source, updater],
        }
    }

    /// Drive the broker connection until the updater goes away
    pub async fn run(self: Arc<Self>, tx: mpsc::Sender<Inbound>) {
        let endpoint = match self.config.endpoint.as_deref() {
            None => {
                tracing::info!("No broker endpoint configured");
                return self.simulate(tx).await;
            }
            Some(raw) => match BrokerEndpoint::parse(raw) {
                Ok(endpoint) => endpoint,
                Err(e) => {
                    self.report_fatal(&e);
                    return self.simulate(tx).await;
                }
            },
        };

        // Certificates are loaded once; a bad file will not fix itself
        let tls = match endpoint.transport {
            Transport::Tcp => None,
            Transport::Tls => match TlsConnector::from_files(&self.config.tls) {
                Ok(connector) => Some(connector),
                Err(e) => {
                    self.report_fatal(&BrokerError::Misconfigured(e.to_string()));
                    return self.simulate(tx).await;
                }
            },
        };

        self.state.transition(GatewayState::Connecting);

        loop {
            match self.session(&endpoint, tls.as_ref(), &tx).await {
                Ok(()) => return,
                Err(e) if e.is_fatal() => {
                    self.report_fatal(&e);
                    return self.simulate(tx).await;
                }
                Err(e) => {
                    self.state.transition(GatewayState::Reconnecting);
                    tracing::warn!(
                        broker = %endpoint,
                        error = %e,
                        retry_in_secs = self.config.reconnect_interval.as_secs_f64(),
                        "Broker connection failed"
                    );
                    tokio::time::sleep(self.config.reconnect_interval).await;
                }
            }
        }
    }

    /// One connection lifetime
    ///
    /// Returns `Ok` only when the updater channel is closed.
    async fn session(
        &self,
        endpoint: &BrokerEndpoint,
        tls: Option<&TlsConnector>,
        tx: &mpsc::Sender<Inbound>,
    ) -> Result<(), BrokerError> {
        let stream = self.open(endpoint, endpoint.resolve().await?).await?;
        let options = self.config.mqtt_options();

        match tls {
            Some(connector) => {
                let stream = connector
                    .connect(&endpoint.host, stream, self.config.connect_timeout)
                    .await?;
                let client = MqttClient::handshake(stream, options).await?;
                self.forward(client, endpoint, tx).await
            }
            None => {
                let client = MqttClient::handshake(stream, options).await?;
                self.forward(client, endpoint, tx).await
            }
        }
    }

    /// Connect to the first reachable address
    async fn open(
        &self,
        endpoint: &BrokerEndpoint,
        addrs: Vec<SocketAddr>,
    ) -> Result<TcpStream, BrokerError> {
        let mut last_err = None;
        for addr in addrs {
            match connect_tcp(addr, self.config.connect_timeout).await {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    tracing::debug!(addr = %addr, error = %e, "Connect attempt failed");
                    last_err = Some(e);
                }
            }
        }

        Err(match last_err {
            Some(e) => e.into(),
            None => BrokerError::Unreachable(format!("{}: no addresses found", endpoint.host)),
        })
    }

    /// Subscribe and forward payloads until the connection or the channel ends
    async fn forward<S>(
        &self,
        mut client: MqttClient<S>,
        endpoint: &BrokerEndpoint,
        tx: &mpsc::Sender<Inbound>,
    ) -> Result<(), BrokerError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let granted = client.subscribe(&self.config.topic, QoS::AtLeastOnce).await?;
        self.state.transition(GatewayState::Connected);
        tracing::info!(
            broker = %endpoint,
            topic = %self.config.topic,
            qos = ?granted,
            "Subscribed to telemetry topic"
        );

        loop {
            let publish = client.next_message().await?;
            tracing::trace!(topic = %publish.topic, bytes = publish.payload.len(), "Message received");

            if tx.send(Inbound::Message(publish.payload)).await.is_err() {
                let _ = client.disconnect().await;
                return Ok(());
            }
        }
    }

    async fn simulate(&self, tx: mpsc::Sender<Inbound>) {
        self.state.transition(GatewayState::Simulating);
        Simulator::new(
            self.service.registry().clone(),
            tx,
            self.config.simulation_interval,
        )
        .run()
        .await;
    }

    /// Log a fatal broker error once per gateway
    ///
    /// Returns `true` when this call emitted the error-level log.
    fn report_fatal(&self, error: &BrokerError) -> bool {
        let first = !self.fatal_reported.swap(true, Ordering::SeqCst);
        if first {
            tracing::error!(error = %error, "Broker unavailable, switching to simulation mode");
        } else {
            tracing::debug!(error = %error, "Broker still unavailable");
        }
        first
    }
}

/// Running gateway tasks
pub struct GatewayHandle {
    state: watch::Receiver<GatewayState>,
    tasks: Vec<JoinHandle<()>>,
}

impl GatewayHandle {
    pub fn state(&self) -> GatewayState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<GatewayState> {
        self.state.clone()
    }

    /// Wait until the gateway reaches `target`
    pub async fn wait_for(&mut self, target: GatewayState) -> GatewayState {
        if self.state.wait_for(|s| *s == target).await.is_ok() {
            return target;
        }
        *self.state.borrow()
    }

    /// Abort the broker, simulator and updater tasks
    pub fn shutdown(self) {
        for task in self.tasks {
            task.abort();
        }
    }
}
