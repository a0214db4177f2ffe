//! Subscribing MQTT client
//!
//! A deliberately small client: one byte stream (plain TCP or TLS), one or
//! more topic subscriptions, and a [`MqttClient::next_message`] loop that also takes
//! care of keep-alive pings and QoS 1 acknowledgements.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{interval_at, timeout, Instant, Interval, MissedTickBehavior};

use super::error::MqttError;
use super::packet::{Connect, ConnectReturnCode, Packet, Publish, QoS, Subscribe};

/// Connection options
#[derive(Debug, Clone)]
pub struct MqttOptions {
    /// Client identifier sent in CONNECT
    pub client_id: String,

    /// Keep-alive interval; a PINGREQ is sent when it elapses
    pub keep_alive: Duration,

    /// Time allowed for TCP connect and each handshake response
    pub connect_timeout: Duration,

    /// Start a fresh session on every connect
    pub clean_session: bool,

    /// Largest inbound packet body accepted
    pub max_packet_size: usize,
}

impl Default for MqttOptions {
    fn default() -> Self {
        Self {
            client_id: "binwatch".to_string(),
            keep_alive: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(30),
            clean_session: true,
            max_packet_size: 256 * 1024, // 256KB
        }
    }
}

impl MqttOptions {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            ..Default::default()
        }
    }

    /// Set the keep-alive interval
    ///
    /// Clamped to the protocol range of 1 to 65535 seconds.
    pub fn keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive.clamp(Duration::from_secs(1), Duration::from_secs(65_535));
        self
    }

    pub fn connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }
}

/// An established, CONNACK-accepted MQTT session
pub struct MqttClient<S = TcpStream> {
    stream: S,
    read_buf: BytesMut,
    write_buf: BytesMut,
    options: MqttOptions,
    next_packet_id: u16,
    /// Publishes that arrived while waiting for another response
    pending: VecDeque<Publish>,
    ping_timer: Interval,
    awaiting_pong: bool,
}

/// Open a TCP connection with the configured connect timeout
pub async fn connect_tcp(addr: SocketAddr, connect_timeout: Duration) -> Result<TcpStream, MqttError> {
    let stream = timeout(connect_timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| MqttError::Timeout("TCP connect"))??;
    stream.set_nodelay(true)?;
    Ok(stream)
}

impl MqttClient<TcpStream> {
    /// Open a plain TCP connection and complete the CONNECT/CONNACK exchange
    pub async fn connect(addr: SocketAddr, options: MqttOptions) -> Result<Self, MqttError> {
        let stream = connect_tcp(addr, options.connect_timeout).await?;
        Self::handshake(stream, options).await
    }
}

impl<S> MqttClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Complete the CONNECT/CONNACK exchange over an already open stream
    pub async fn handshake(stream: S, options: MqttOptions) -> Result<Self, MqttError> {
        let period = options.keep_alive.max(Duration::from_secs(1));
        let mut ping_timer = interval_at(Instant::now() + period, period);
        ping_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut client = Self {
            stream,
            read_buf: BytesMut::with_capacity(8 * 1024),
            write_buf: BytesMut::with_capacity(1024),
            options,
            next_packet_id: 1,
            pending: VecDeque::new(),
            ping_timer,
            awaiting_pong: false,
        };

        let connect = Packet::Connect(Connect {
            client_id: client.options.client_id.clone(),
            keep_alive_secs: client.options.keep_alive.as_secs().min(u16::MAX as u64) as u16,
            clean_session: client.options.clean_session,
        });
        client.send(&connect).await?;

        let response = timeout(client.options.connect_timeout, client.read_packet())
            .await
            .map_err(|_| MqttError::Timeout("CONNACK"))??;

        match response {
            Packet::ConnAck(ack) if ack.code == ConnectReturnCode::Accepted => {
                tracing::debug!(
                    client_id = %client.options.client_id,
                    session_present = ack.session_present,
                    "MQTT session established"
                );
                Ok(client)
            }
            Packet::ConnAck(ack) => Err(MqttError::ConnectionRefused(ack.code)),
            other => Err(MqttError::UnexpectedPacket(other.name())),
        }
    }

    /// Subscribe to a topic filter and wait for the broker to grant it
    pub async fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<QoS, MqttError> {
        let packet_id = self.allocate_packet_id();
        self.send(&Packet::Subscribe(Subscribe {
            packet_id,
            filters: vec![(topic.to_string(), qos)],
        }))
        .await?;

        let deadline = Instant::now() + self.options.connect_timeout;
        loop {
            let packet = tokio::time::timeout_at(deadline, self.read_packet())
                .await
                .map_err(|_| MqttError::Timeout("SUBACK"))??;

            match packet {
                Packet::SubAck(ack) if ack.packet_id == packet_id => {
                    return match ack.granted.first().copied().flatten() {
                        Some(granted) => Ok(granted),
                        None => Err(MqttError::SubscriptionRejected(topic.to_string())),
                    };
                }
                Packet::Publish(publish) => {
                    self.acknowledge(&publish).await?;
                    self.pending.push_back(publish);
                }
                other => {
                    tracing::trace!(packet = other.name(), "Ignoring packet while subscribing");
                }
            }
        }
    }

    /// Wait for the next application message
    ///
    /// Sends PINGREQ whenever the keep-alive interval elapses and fails with
    /// [`MqttError::KeepAliveTimeout`] if the previous ping went unanswered.
    pub async fn next_message(&mut self) -> Result<Publish, MqttError> {
        if let Some(publish) = self.pending.pop_front() {
            return Ok(publish);
        }

        loop {
            let packet = tokio::select! {
                packet = Self::read_from(&mut self.stream, &mut self.read_buf, self.options.max_packet_size) => packet?,
                _ = self.ping_timer.tick() => {
                    self.keep_alive().await?;
                    continue;
                }
            };

            match packet {
                Packet::Publish(publish) => {
                    self.acknowledge(&publish).await?;
                    return Ok(publish);
                }
                Packet::PingResp => {
                    self.awaiting_pong = false;
                }
                Packet::Disconnect => return Err(MqttError::ConnectionClosed),
                other => {
                    tracing::trace!(packet = other.name(), "Ignoring packet");
                }
            }
        }
    }

    /// Send DISCONNECT and close the socket
    pub async fn disconnect(mut self) -> Result<(), MqttError> {
        self.send(&Packet::Disconnect).await?;
        self.stream.shutdown().await?;
        Ok(())
    }

    async fn keep_alive(&mut self) -> Result<(), MqttError> {
        if self.awaiting_pong {
            return Err(MqttError::KeepAliveTimeout);
        }
        self.awaiting_pong = true;
        self.send(&Packet::PingReq).await
    }

    async fn acknowledge(&mut self, publish: &Publish) -> Result<(), MqttError> {
        match (publish.qos, publish.packet_id) {
            (QoS::AtLeastOnce, Some(id)) => self.send(&Packet::PubAck(id)).await,
            (QoS::ExactlyOnce, _) => {
                // Never requested; brokers downgrade to the subscription QoS
                tracing::warn!(topic = %publish.topic, "Received QoS 2 publish, not acknowledged");
                Ok(())
            }
            _ => Ok(()),
        }
    }

    async fn send(&mut self, packet: &Packet) -> Result<(), MqttError> {
        self.write_buf.clear();
        packet.encode(&mut self.write_buf);
        self.stream.write_all(&self.write_buf).await?;
        Ok(())
    }

    async fn read_packet(&mut self) -> Result<Packet, MqttError> {
        Self::read_from(
            &mut self.stream,
            &mut self.read_buf,
            self.options.max_packet_size,
        )
        .await
    }

    /// Cancel safe: partial data stays in `read_buf`
    async fn read_from(
        stream: &mut S,
        read_buf: &mut BytesMut,
        max_packet_size: usize,
    ) -> Result<Packet, MqttError> {
        loop {
            if let Some(packet) = Packet::decode(read_buf, max_packet_size)? {
                return Ok(packet);
            }
            if stream.read_buf(read_buf).await? == 0 {
                return Err(MqttError::ConnectionClosed);
            }
        }
    }

    fn allocate_packet_id(&mut self) -> u16 {
        let id = self.next_packet_id;
        self.next_packet_id = self.next_packet_id.checked_add(1).unwrap_or(1);
        id
    }
}
