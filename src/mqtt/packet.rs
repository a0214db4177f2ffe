//! MQTT 3.1.1 packet codec
//!
//! Every control packet starts with a fixed header:
//!
//! ```text
//!  bit    7   6   5   4   3   2   1   0
//!       ┌───────────────┬───────────────┐
//! byte 1│  packet type  │     flags     │
//!       ├───────────────┴───────────────┤
//! byte 2│  remaining length (1-4 bytes, │
//!  ...  │  7 bits each, MSB continues)  │
//!       └───────────────────────────────┘
//! ```
//!
//! Only the subset needed by a subscribing client (and a test broker) is
//! implemented: CONNECT, CONNACK, PUBLISH, PUBACK, SUBSCRIBE, SUBACK,
//! PINGREQ, PINGRESP and DISCONNECT.
//!
//! Reference: MQTT Version 3.1.1, OASIS Standard, Section 2 and 3

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::error::MqttError;

pub const PROTOCOL_NAME: &str = "MQTT";
pub const PROTOCOL_LEVEL: u8 = 4;

/// Largest value the remaining length field can carry
pub const MAX_REMAINING_LENGTH: usize = 268_435_455;

const CONNECT: u8 = 1;
const CONNACK: u8 = 2;
const PUBLISH: u8 = 3;
const PUBACK: u8 = 4;
const SUBSCRIBE: u8 = 8;
const SUBACK: u8 = 9;
const PINGREQ: u8 = 12;
const PINGRESP: u8 = 13;
const DISCONNECT: u8 = 14;

/// Delivery guarantee
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum QoS {
    AtMostOnce = 0,
    AtLeastOnce = 1,
    ExactlyOnce = 2,
}

impl QoS {
    pub fn from_u8(v: u8) -> Result<Self, MqttError> {
        match v {
            0 => Ok(QoS::AtMostOnce),
            1 => Ok(QoS::AtLeastOnce),
            2 => Ok(QoS::ExactlyOnce),
            other => Err(MqttError::InvalidQos(other)),
        }
    }
}

/// CONNACK return code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectReturnCode {
    Accepted,
    UnacceptableProtocolVersion,
    IdentifierRejected,
    ServerUnavailable,
    BadUsernameOrPassword,
    NotAuthorized,
    Reserved(u8),
}

impl ConnectReturnCode {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Accepted,
            1 => Self::UnacceptableProtocolVersion,
            2 => Self::IdentifierRejected,
            3 => Self::ServerUnavailable,
            4 => Self::BadUsernameOrPassword,
            5 => Self::NotAuthorized,
            other => Self::Reserved(other),
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Accepted => 0,
            Self::UnacceptableProtocolVersion => 1,
            Self::IdentifierRejected => 2,
            Self::ServerUnavailable => 3,
            Self::BadUsernameOrPassword => 4,
            Self::NotAuthorized => 5,
            Self::Reserved(v) => v,
        }
    }
}

impl std::fmt::Display for ConnectReturnCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Accepted => write!(f, "accepted"),
            Self::UnacceptableProtocolVersion => write!(f, "unacceptable protocol version"),
            Self::IdentifierRejected => write!(f, "identifier rejected"),
            Self::ServerUnavailable => write!(f, "server unavailable"),
            Self::BadUsernameOrPassword => write!(f, "bad username or password"),
            Self::NotAuthorized => write!(f, "not authorized"),
            Self::Reserved(v) => write!(f, "reserved code {}", v),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connect {
    pub client_id: String,
    pub keep_alive_secs: u16,
    pub clean_session: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnAck {
    pub session_present: bool,
    pub code: ConnectReturnCode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publish {
    pub topic: String,
    pub qos: QoS,
    pub retain: bool,
    pub dup: bool,
    /// Present when `qos` is above [`QoS::AtMostOnce`]
    pub packet_id: Option<u16>,
    pub payload: Bytes,
}

impl Publish {
    /// A QoS 0 publish
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            qos: QoS::AtMostOnce,
            retain: false,
            dup: false,
            packet_id: None,
            payload: payload.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscribe {
    pub packet_id: u16,
    pub filters: Vec<(String, QoS)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubAck {
    pub packet_id: u16,
    /// Granted QoS per filter, `None` for a rejected filter (0x80)
    pub granted: Vec<Option<QoS>>,
}

/// A decoded control packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Connect(Connect),
    ConnAck(ConnAck),
    Publish(Publish),
    PubAck(u16),
    Subscribe(Subscribe),
    SubAck(SubAck),
    PingReq,
    PingResp,
    Disconnect,
}

impl Packet {
    /// Short name used in logs and errors
    pub fn name(&self) -> &'static str {
        match self {
            Packet::Connect(_) => "CONNECT",
            Packet::ConnAck(_) => "CONNACK",
            Packet::Publish(_) => "PUBLISH",
            Packet::PubAck(_) => "PUBACK",
            Packet::Subscribe(_) => "SUBSCRIBE",
            Packet::SubAck(_) => "SUBACK",
            Packet::PingReq => "PINGREQ",
            Packet::PingResp => "PINGRESP",
            Packet::Disconnect => "DISCONNECT",
        }
    }

    /// Append the encoded packet to `buf`
    pub fn encode(&self, buf: &mut BytesMut) {
        let mut body = BytesMut::new();

        let header = match self {
            Packet::Connect(connect) => {
                put_string(&mut body, PROTOCOL_NAME);
                body.put_u8(PROTOCOL_LEVEL);
                body.put_u8(if connect.clean_session { 0x02 } else { 0x00 });
                body.put_u16(connect.keep_alive_secs);
                put_string(&mut body, &connect.client_id);
                CONNECT << 4
            }
            Packet::ConnAck(ack) => {
                body.put_u8(ack.session_present as u8);
                body.put_u8(ack.code.as_u8());
                CONNACK << 4
            }
            Packet::Publish(publish) => {
                put_string(&mut body, &publish.topic);
                if publish.qos > QoS::AtMostOnce {
                    body.put_u16(publish.packet_id.unwrap_or(1));
                }
                body.put_slice(&publish.payload);

                let mut flags = (publish.qos as u8) << 1;
                if publish.dup {
                    flags |= 0x08;
                }
                if publish.retain {
                    flags |= 0x01;
                }
                (PUBLISH << 4) | flags
            }
            Packet::PubAck(packet_id) => {
                body.put_u16(*packet_id);
                PUBACK << 4
            }
            Packet::Subscribe(subscribe) => {
                body.put_u16(subscribe.packet_id);
                for (filter, qos) in &subscribe.filters {
                    put_string(&mut body, filter);
                    body.put_u8(*qos as u8);
                }
                // Reserved flags for SUBSCRIBE are 0b0010
                (SUBSCRIBE << 4) | 0x02
            }
            Packet::SubAck(ack) => {
                body.put_u16(ack.packet_id);
                for granted in &ack.granted {
                    body.put_u8(granted.map(|q| q as u8).unwrap_or(0x80));
                }
                SUBACK << 4
            }
            Packet::PingReq => PINGREQ << 4,
            Packet::PingResp => PINGRESP << 4,
            Packet::Disconnect => DISCONNECT << 4,
        };

        buf.reserve(5 + body.len());
        buf.put_u8(header);
        put_remaining_length(buf, body.len());
        buf.put_slice(&body);
    }

    /// Try to decode one packet from the front of `buf`
    ///
    /// Returns `Ok(None)` when more data is needed; `buf` is left untouched
    /// in that case.
    pub fn decode(buf: &mut BytesMut, max_size: usize) -> Result<Option<Packet>, MqttError> {
        let Some((remaining, header_len)) = peek_remaining_length(&buf[..])? else {
            return Ok(None);
        };

        if remaining > max_size {
            return Err(MqttError::PacketTooLarge(remaining));
        }

        let total = header_len + remaining;
        if buf.len() < total {
            return Ok(None);
        }

        let mut frame = buf.split_to(total).freeze();
        let header = frame.get_u8();
        frame.advance(header_len - 1);

        decode_body(header >> 4, header & 0x0F, frame).map(Some)
    }
}

fn decode_body(packet_type: u8, flags: u8, mut body: Bytes) -> Result<Packet, MqttError> {
    let packet = match packet_type {
        CONNECT => {
            let name = get_string(&mut body, "CONNECT")?;
            if body.remaining() < 4 {
                return Err(MqttError::Truncated("CONNECT"));
            }
            let level = body.get_u8();
            if name != PROTOCOL_NAME || level != PROTOCOL_LEVEL {
                return Err(MqttError::UnexpectedPacket("CONNECT with unsupported protocol"));
            }
            let connect_flags = body.get_u8();
            let keep_alive_secs = body.get_u16();
            let client_id = get_string(&mut body, "CONNECT")?;

            Packet::Connect(Connect {
                client_id,
                keep_alive_secs,
                clean_session: connect_flags & 0x02 != 0,
            })
        }
        CONNACK => {
            if body.remaining() < 2 {
                return Err(MqttError::Truncated("CONNACK"));
            }
            let session_present = body.get_u8() & 0x01 != 0;
            let code = ConnectReturnCode::from_u8(body.get_u8());
            Packet::ConnAck(ConnAck {
                session_present,
                code,
            })
        }
        PUBLISH => {
            let qos = QoS::from_u8((flags >> 1) & 0x03)?;
            let topic = get_string(&mut body, "PUBLISH")?;
            let packet_id = if qos > QoS::AtMostOnce {
                Some(get_u16(&mut body, "PUBLISH")?)
            } else {
                None
            };

            Packet::Publish(Publish {
                topic,
                qos,
                retain: flags & 0x01 != 0,
                dup: flags & 0x08 != 0,
                packet_id,
                payload: body,
            })
        }
        PUBACK => Packet::PubAck(get_u16(&mut body, "PUBACK")?),
        SUBSCRIBE => {
            let packet_id = get_u16(&mut body, "SUBSCRIBE")?;
            let mut filters = Vec::new();
            while body.has_remaining() {
                let filter = get_string(&mut body, "SUBSCRIBE")?;
                if !body.has_remaining() {
                    return Err(MqttError::Truncated("SUBSCRIBE"));
                }
                filters.push((filter, QoS::from_u8(body.get_u8() & 0x03)?));
            }
            Packet::Subscribe(Subscribe { packet_id, filters })
        }
        SUBACK => {
            let packet_id = get_u16(&mut body, "SUBACK")?;
            let granted = body
                .iter()
                .map(|code| QoS::from_u8(*code).ok())
                .collect();
            Packet::SubAck(SubAck { packet_id, granted })
        }
        PINGREQ => Packet::PingReq,
        PINGRESP => Packet::PingResp,
        DISCONNECT => Packet::Disconnect,
        other => return Err(MqttError::InvalidPacketType(other)),
    };

    Ok(packet)
}

/// Parse the remaining length without consuming anything
///
/// Returns the length and the size of the whole fixed header.
fn peek_remaining_length(buf: &[u8]) -> Result<Option<(usize, usize)>, MqttError> {
    let mut value = 0usize;
    let mut multiplier = 1usize;

    for i in 0..4 {
        let Some(&byte) = buf.get(1 + i) else {
            return Ok(None);
        };
        value += (byte & 0x7F) as usize * multiplier;
        if byte & 0x80 == 0 {
            return Ok(Some((value, 2 + i)));
        }
        multiplier *= 128;
    }

    Err(MqttError::MalformedRemainingLength)
}

fn put_remaining_length(buf: &mut BytesMut, mut len: usize) {
    loop {
        let mut byte = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            byte |= 0x80;
        }
        buf.put_u8(byte);
        if len == 0 {
            break;
        }
    }
}

fn put_string(buf: &mut BytesMut, s: &str) {
    buf.put_u16(s.len() as u16);
    buf.put_slice(s.as_bytes());
}

fn get_u16(buf: &mut Bytes, packet: &'static str) -> Result<u16, MqttError> {
    if buf.remaining() < 2 {
        return Err(MqttError::Truncated(packet));
    }
    Ok(buf.get_u16())
}

fn get_string(buf: &mut Bytes, packet: &'static str) -> Result<String, MqttError> {
    let len = get_u16(buf, packet)? as usize;
    if buf.remaining() < len {
        return Err(MqttError::Truncated(packet));
    }
    let raw = buf.split_to(len);
    String::from_utf8(raw.to_vec()).map_err(|_| MqttError::InvalidUtf8)
}
