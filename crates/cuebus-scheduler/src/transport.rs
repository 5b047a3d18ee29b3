use std::time::SystemTime;

use async_trait::async_trait;
use cuebus_core::Argument;
use rosc::{OscBundle, OscMessage, OscPacket, OscTime, OscType};
use tokio::net::UdpSocket;
use tracing::debug;

use crate::error::TransportError;
use crate::registry::TargetAddress;

/// One addressed message inside a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub tag: String,
    pub arguments: Vec<Argument>,
}

/// Everything one target receives from one expiry, sent as a single datagram.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub messages: Vec<Message>,
    pub timestamp: SystemTime,
}

/// Outbound delivery of batches. Implementations must be safe to call
/// concurrently for different targets.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, addr: &TargetAddress, batch: &Batch) -> Result<(), TransportError>;
}

/// Map a typed argument onto its OSC counterpart.
///
/// Integers saturate at the 32-bit OSC range; floats are narrowed to `f32`.
pub fn osc_argument(arg: &Argument) -> OscType {
    match arg {
        Argument::Int(v) => OscType::Int((*v).clamp(i32::MIN as i64, i32::MAX as i64) as i32),
        Argument::Float(v) => OscType::Float(*v as f32),
        Argument::String(s) => OscType::String(s.clone()),
    }
}

/// Encode a batch as an OSC bundle timestamped with its send time.
pub fn encode_bundle(batch: &Batch) -> Result<Vec<u8>, TransportError> {
    let timetag = OscTime::try_from(batch.timestamp)
        .map_err(|e| TransportError::Encode(format!("timetag: {e:?}")))?;
    let content = batch
        .messages
        .iter()
        .map(|m| {
            OscPacket::Message(OscMessage {
                addr: m.tag.clone(),
                args: m.arguments.iter().map(osc_argument).collect(),
            })
        })
        .collect();
    let packet = OscPacket::Bundle(OscBundle { timetag, content });
    rosc::encoder::encode(&packet).map_err(|e| TransportError::Encode(e.to_string()))
}

/// OSC over UDP from a single shared local socket.
pub struct OscUdpTransport {
    socket: UdpSocket,
}

impl OscUdpTransport {
    pub async fn bind(local: &str) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(local).await?;
        debug!(local = %socket.local_addr()?, "OSC transport bound");
        Ok(Self { socket })
    }
}

#[async_trait]
impl Transport for OscUdpTransport {
    async fn send(&self, addr: &TargetAddress, batch: &Batch) -> Result<(), TransportError> {
        let bytes = encode_bundle(batch)?;
        self.socket
            .send_to(&bytes, (addr.host.as_str(), addr.port))
            .await?;
        Ok(())
    }
}
