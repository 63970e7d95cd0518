use crate::error::{Error, Result};
use bytes::{BufMut, Bytes, BytesMut};
use serde::Deserialize;
use std::convert::TryFrom;
use std::str::from_utf8;

/// Enumeration of the `engine.io` packet types, ordinal-encoded as a single
/// ASCII digit on the wire.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum PacketId {
    Open = 0,
    Close = 1,
    Ping = 2,
    Pong = 3,
    Message = 4,
    Upgrade = 5,
    Noop = 6,
}

impl TryFrom<u8> for PacketId {
    type Error = Error;
    /// Converts a wire byte into the corresponding packet id.
    fn try_from(b: u8) -> Result<PacketId> {
        match b {
            b'0' => Ok(PacketId::Open),
            b'1' => Ok(PacketId::Close),
            b'2' => Ok(PacketId::Ping),
            b'3' => Ok(PacketId::Pong),
            b'4' => Ok(PacketId::Message),
            b'5' => Ok(PacketId::Upgrade),
            b'6' => Ok(PacketId::Noop),
            _ => Err(Error::InvalidPacketId(b)),
        }
    }
}

/// A packet sent or received in the `engine.io` protocol.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Packet {
    pub packet_id: PacketId,
    pub data: Bytes,
}

impl Packet {
    /// Creates a new packet.
    pub fn new<T: Into<Bytes>>(packet_id: PacketId, data: T) -> Self {
        Packet {
            packet_id,
            data: data.into(),
        }
    }
}

impl TryFrom<Bytes> for Packet {
    type Error = Error;
    /// Decodes a single packet: type digit followed by a utf-8 payload.
    fn try_from(bytes: Bytes) -> Result<Packet> {
        if bytes.is_empty() {
            return Err(Error::IncompletePacket());
        }
        if bytes[0] == b'b' {
            return Err(Error::UnsupportedBinaryEncoding());
        }
        let packet_id = PacketId::try_from(bytes[0])?;
        let data = bytes.slice(1..);
        from_utf8(&data)?;
        Ok(Packet { packet_id, data })
    }
}

impl From<Packet> for Bytes {
    /// Encodes a packet: type digit followed by the raw payload.
    fn from(packet: Packet) -> Bytes {
        let mut bytes = BytesMut::with_capacity(packet.data.len() + 1);
        bytes.put_u8(b'0' + packet.packet_id as u8);
        bytes.put(packet.data);
        bytes.freeze()
    }
}

/// The payload separator on the wire.
/// See https://en.wikipedia.org/wiki/Delimiter#ASCII_delimited_text
const SEPARATOR: u8 = 0x1e;

/// One HTTP body worth of packets. Decoding is lazy: packets are sliced off
/// the buffer one separator at a time while iterating, the sequence is never
/// materialized. An empty body holds zero packets.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Payload {
    data: Bytes,
}

impl Payload {
    pub fn new(data: Bytes) -> Self {
        Payload { data }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns a fresh iterator over the buffer, starting from the front.
    pub fn iter(&self) -> IntoIter {
        IntoIter {
            data: self.data.clone(),
            offset: 0,
        }
    }
}

impl From<Vec<Packet>> for Payload {
    /// Encodes a packet sequence, packets joined by the separator byte with
    /// no trailing separator.
    fn from(packets: Vec<Packet>) -> Self {
        let mut data = BytesMut::new();
        for (index, packet) in packets.into_iter().enumerate() {
            if index > 0 {
                data.put_u8(SEPARATOR);
            }
            data.put(Bytes::from(packet));
        }
        Payload { data: data.freeze() }
    }
}

pub struct IntoIter {
    data: Bytes,
    offset: usize,
}

impl Iterator for IntoIter {
    type Item = Result<Packet>;
    fn next(&mut self) -> Option<Result<Packet>> {
        if self.offset >= self.data.len() {
            return None;
        }
        let end = self.data[self.offset..]
            .iter()
            .position(|byte| *byte == SEPARATOR)
            .map(|position| self.offset + position)
            .unwrap_or(self.data.len());
        let packet = self.data.slice(self.offset..end);
        self.offset = end + 1;
        Some(Packet::try_from(packet))
    }
}

impl IntoIterator for Payload {
    type Item = Result<Packet>;
    type IntoIter = IntoIter;
    fn into_iter(self) -> IntoIter {
        IntoIter {
            data: self.data,
            offset: 0,
        }
    }
}

/// The session parameters carried by the first `Open` packet of a handshake.
/// Created once per session and never mutated afterwards.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakePacket {
    pub sid: String,
    pub upgrades: Vec<String>,
    pub ping_interval: u64,
    pub ping_timeout: u64,
}

impl HandshakePacket {
    /// Whether the server advertised the websocket transport in its upgrade
    /// list.
    pub fn websocket_upgrade_allowed(&self) -> bool {
        self.upgrades
            .iter()
            .any(|upgrade| upgrade.to_lowercase() == *"websocket")
    }
}

impl TryFrom<Packet> for HandshakePacket {
    type Error = Error;
    fn try_from(packet: Packet) -> Result<HandshakePacket> {
        if packet.packet_id != PacketId::Open {
            return Err(Error::InvalidHandshake(format!(
                "expected an open packet, got {:?}",
                packet.packet_id
            )));
        }
        Ok(serde_json::from_slice(&packet.data)?)
    }
}
