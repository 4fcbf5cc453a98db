//! Transport collaborator interface.
//!
//! The simulation core never opens sockets. It talks to whatever implements
//! [`Transport`]: reliable, ordered, at-least-once delivery per channel,
//! join/leave notifications and unique participant ids.

use crate::messages::{Packet, ParticipantId};

/// Something that happened on the transport since the last poll.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A participant became reachable.
    Joined(ParticipantId),
    /// A participant left the session.
    Left(ParticipantId),
    /// A packet arrived.
    Packet {
        /// Sending participant.
        from: ParticipantId,
        /// Decoded packet.
        packet: Packet,
    },
}

/// Errors surfaced to the sender. Delivery retries are the transport's job.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// No participant with that id is connected.
    #[error("unknown peer {0}")]
    UnknownPeer(ParticipantId),

    /// The peer's receiving side is gone.
    #[error("peer {0} disconnected")]
    Disconnected(ParticipantId),

    /// The packet could not be encoded.
    #[error("failed to encode packet: {0}")]
    Encode(#[from] postcard::Error),
}

/// Reliable ordered transport endpoint owned by one participant.
pub trait Transport: Send {
    /// Id assigned to this endpoint.
    fn local_id(&self) -> ParticipantId;

    /// Queue a packet for `to`. Never blocks.
    fn send(&self, to: ParticipantId, packet: &Packet) -> Result<(), TransportError>;

    /// Drain everything received since the previous poll, in arrival order.
    fn poll(&mut self) -> Vec<TransportEvent>;
}
