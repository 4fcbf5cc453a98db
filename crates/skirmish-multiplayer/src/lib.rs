//! Session roles, replicated variables, one-way RPC routing, and fixed-rate
//! tick scheduling.

pub mod replication;
pub mod rpc;
pub mod session;
pub mod tick;

pub use replication::{
    ApplyOutcome, ReplicatedVar, ReplicationError, ReplicationOutbox, Subscription,
    WritePermission,
};
pub use rpc::{InboundCall, ReceiveOutcome, RpcDispatcher, RpcError};
pub use session::{Role, SessionContext};
pub use tick::{DEFAULT_TICK_RATE, FixedTickSchedule};
