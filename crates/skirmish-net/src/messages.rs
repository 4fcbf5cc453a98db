//! Wire packets exchanged between session participants.
//!
//! The core only ever sends two things: opaque versioned variable updates and
//! opaque one-way RPC frames. Both are wrapped in [`Packet`], serialized with
//! [`postcard`] and prefixed with a protocol version byte. Use
//! [`serialize_packet`] and [`deserialize_packet`] for encoding/decoding.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Current wire-protocol version. Prepended to every serialized packet.
pub const PROTOCOL_VERSION: u8 = 1;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Unique per-participant identifier assigned by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParticipantId(pub u64);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Player {}", self.0)
    }
}

/// Identifies one replicated variable on every peer.
///
/// `entity` is the owning actor's id, `slot` distinguishes the variables an
/// actor carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VarKey {
    /// Entity the variable belongs to.
    pub entity: u64,
    /// Field slot within the entity.
    pub slot: u16,
}

impl VarKey {
    /// Creates a key.
    pub const fn new(entity: u64, slot: u16) -> Self {
        Self { entity, slot }
    }
}

// ---------------------------------------------------------------------------
// Packets
// ---------------------------------------------------------------------------

/// Top-level packet. The enum discriminant is the type tag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Packet {
    /// A replicated variable changed on its writer.
    Variable(VariableUpdate),
    /// A one-way remote call.
    Rpc(RpcFrame),
}

/// New value of a replicated variable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VariableUpdate {
    /// Which variable changed.
    pub key: VarKey,
    /// Writer-side version after the change.
    pub version: u64,
    /// Postcard-encoded value.
    pub payload: Vec<u8>,
}

/// One-way RPC frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcFrame {
    /// Participant that issued the call.
    pub sender: ParticipantId,
    /// Per-sender monotonically increasing sequence number.
    pub sequence: u64,
    /// Postcard-encoded call body.
    pub payload: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during packet deserialization.
#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    /// The payload was empty (no version byte).
    #[error("empty payload, no version byte")]
    EmptyPayload,

    /// The version byte does not match [`PROTOCOL_VERSION`].
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// Postcard deserialization failed.
    #[error("deserialization error: {0}")]
    Postcard(#[from] postcard::Error),
}

// ---------------------------------------------------------------------------
// Serialization helpers
// ---------------------------------------------------------------------------

/// Serialize a [`Packet`] into a versioned binary payload.
///
/// Wire format: `[version: u8] [postcard-encoded Packet]`
pub fn serialize_packet(packet: &Packet) -> Result<Vec<u8>, postcard::Error> {
    let body = postcard::to_allocvec(packet)?;
    let mut out = Vec::with_capacity(1 + body.len());
    out.push(PROTOCOL_VERSION);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Deserialize a versioned binary payload into a [`Packet`].
pub fn deserialize_packet(data: &[u8]) -> Result<Packet, PacketError> {
    let Some((&version, body)) = data.split_first() else {
        return Err(PacketError::EmptyPayload);
    };

    if version != PROTOCOL_VERSION {
        return Err(PacketError::UnsupportedVersion(version));
    }

    Ok(postcard::from_bytes(body)?)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
