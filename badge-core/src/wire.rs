//! Framing: 1 kind byte + bincode payload record. One radio packet carries one frame.

use bincode::Options;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::identity::PeerId;
use crate::protocol::{Action, Packet, PacketKind};

const KIND_SIZE: usize = 1;
/// Largest frame accepted or produced.
pub const MAX_PACKET_LEN: usize = 1024;
/// Zero padding appended to a short payload so missing trailing fields decode as 0/false/empty/None.
const DEFAULT_PAD: usize = 64;

fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .with_limit(MAX_PACKET_LEN as u64)
        .allow_trailing_bytes()
}

/// Prefix `payload` with the kind byte.
pub fn encode_raw(kind: PacketKind, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(KIND_SIZE + payload.len());
    out.push(kind.as_byte());
    out.extend_from_slice(payload);
    out
}

/// Split a frame into its kind and payload bytes.
pub fn decode_raw(bytes: &[u8]) -> Result<(PacketKind, &[u8]), DecodeError> {
    let (&first, payload) = bytes.split_first().ok_or(DecodeError::Empty)?;
    if bytes.len() > MAX_PACKET_LEN {
        return Err(DecodeError::TooLarge);
    }
    let kind = PacketKind::from_byte(first).ok_or(DecodeError::UnknownKind(first))?;
    Ok((kind, payload))
}

/// Encode a packet into a single frame.
pub fn encode_packet(packet: &Packet) -> Result<Vec<u8>, EncodeError> {
    let payload = match packet {
        Packet::JoinRequest(r) => encode_record(r)?,
        Packet::JoinResponse(r) => encode_record(r)?,
        Packet::HostAnnounce(r) => encode_record(r)?,
        Packet::RoundStart(r) => encode_record(r)?,
        Packet::ButtonPress(r) => encode_record(r)?,
        Packet::RoundEnd(r) => encode_record(r)?,
        Packet::GameOver(r) => encode_record(r)?,
        Packet::PlayerList(r) => encode_record(r)?,
        Packet::Heartbeat | Packet::Disconnect => Vec::new(),
    };
    if KIND_SIZE + payload.len() > MAX_PACKET_LEN {
        return Err(EncodeError::TooLarge);
    }
    Ok(encode_raw(packet.kind(), &payload))
}

/// Decode one frame. Trailing bytes beyond the known record are ignored.
pub fn decode_packet(bytes: &[u8]) -> Result<Packet, DecodeError> {
    let (kind, payload) = decode_raw(bytes)?;
    let packet = match kind {
        PacketKind::JoinRequest => Packet::JoinRequest(decode_record(payload)?),
        PacketKind::JoinResponse => Packet::JoinResponse(decode_record(payload)?),
        PacketKind::HostAnnounce => Packet::HostAnnounce(decode_record(payload)?),
        PacketKind::RoundStart => Packet::RoundStart(decode_record(payload)?),
        PacketKind::ButtonPress => Packet::ButtonPress(decode_record(payload)?),
        PacketKind::RoundEnd => Packet::RoundEnd(decode_record(payload)?),
        PacketKind::GameOver => Packet::GameOver(decode_record(payload)?),
        PacketKind::PlayerList => Packet::PlayerList(decode_record(payload)?),
        PacketKind::Heartbeat => Packet::Heartbeat,
        PacketKind::Disconnect => Packet::Disconnect,
    };
    Ok(packet)
}

/// Encode `packet` and queue it for `dest`. Encode failures are logged and the send is skipped.
pub(crate) fn queue_send(out: &mut Vec<Action>, dest: PeerId, packet: &Packet) {
    match encode_packet(packet) {
        Ok(bytes) => out.push(Action::Send { dest, bytes }),
        Err(e) => tracing::warn!(
            kind = ?packet.kind(),
            %dest,
            error = %e,
            "dropping unencodable packet"
        ),
    }
}

fn encode_record<T: Serialize>(record: &T) -> Result<Vec<u8>, EncodeError> {
    options().serialize(record).map_err(EncodeError::Encode)
}

fn decode_record<T: DeserializeOwned>(payload: &[u8]) -> Result<T, DecodeError> {
    match options().deserialize(payload) {
        Ok(v) => Ok(v),
        Err(e) if is_eof(&e) => {
            let mut padded = Vec::with_capacity(payload.len() + DEFAULT_PAD);
            padded.extend_from_slice(payload);
            padded.resize(payload.len() + DEFAULT_PAD, 0);
            options().deserialize(&padded).map_err(DecodeError::Payload)
        }
        Err(e) => Err(DecodeError::Payload(e)),
    }
}

fn is_eof(e: &bincode::Error) -> bool {
    match e.as_ref() {
        bincode::ErrorKind::Io(io) => io.kind() == std::io::ErrorKind::UnexpectedEof,
        _ => false,
    }
}

/// Error encoding a packet (bincode or size limit).
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("encode error: {0}")]
    Encode(bincode::Error),
    #[error("packet too large")]
    TooLarge,
}

/// Malformed packet: empty, unknown kind, oversized, or an undecodable payload.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("empty packet")]
    Empty,
    #[error("unknown packet kind {0}")]
    UnknownKind(u8),
    #[error("packet too large")]
    TooLarge,
    #[error("payload error: {0}")]
    Payload(bincode::Error),
}
