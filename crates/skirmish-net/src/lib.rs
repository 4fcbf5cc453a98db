//! Transport plumbing: participant ids, versioned wire packets, the transport
//! trait the simulation consumes, and an in-process loopback implementation.

pub mod loopback;
pub mod messages;
pub mod transport;

pub use loopback::{LoopbackEndpoint, LoopbackHub};
pub use messages::{
    PROTOCOL_VERSION, Packet, PacketError, ParticipantId, RpcFrame, VarKey, VariableUpdate,
    deserialize_packet, serialize_packet,
};
pub use transport::{Transport, TransportError, TransportEvent};
