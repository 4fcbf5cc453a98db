//! One-way RPC routing between participants.
//!
//! Two call shapes exist. [`RpcDispatcher::call_authority`] sends a message
//! to the session authority and may require the caller to own the target
//! actor. [`RpcDispatcher::broadcast`] is authority-only and reaches every
//! observer, optionally skipping one participant. Calls never block and never
//! return a value.
//!
//! Every outgoing frame carries the sender id and a per-sender sequence
//! number. The receiving dispatcher drops frames whose sequence it has already
//! seen from that sender, so at-least-once delivery reaches handlers at most
//! once.

use std::collections::VecDeque;
use std::marker::PhantomData;

use rustc_hash::FxHashMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use skirmish_net::{ParticipantId, RpcFrame};
use tracing::{debug, trace, warn};

use crate::session::SessionContext;

#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// Rejected locally; nothing was transmitted.
    #[error("{caller} lacks permission: {reason}")]
    PermissionDenied {
        caller: ParticipantId,
        reason: &'static str,
    },

    #[error("failed to encode rpc: {0}")]
    Encode(#[from] postcard::Error),
}

/// What [`RpcDispatcher::receive`] did with a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// Decoded and queued for the handler.
    Accepted,
    /// Already seen from this sender.
    Duplicate,
    /// Undecodable, or the frame claims a sender other than the link it arrived on.
    Rejected,
}

/// A call waiting to be handled.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundCall<M> {
    /// Participant that issued the call.
    pub sender: ParticipantId,
    pub message: M,
}

/// Routes messages of type `M` for one participant.
pub struct RpcDispatcher<M> {
    next_sequence: u64,
    outbox: Vec<(ParticipantId, RpcFrame)>,
    inbox: VecDeque<InboundCall<M>>,
    last_seen: FxHashMap<ParticipantId, u64>,
    duplicates: u64,
    _message: PhantomData<fn() -> M>,
}

impl<M> RpcDispatcher<M>
where
    M: Serialize + DeserializeOwned + Clone,
{
    pub fn new() -> Self {
        Self {
            next_sequence: 1,
            outbox: Vec::new(),
            inbox: VecDeque::new(),
            last_seen: FxHashMap::default(),
            duplicates: 0,
            _message: PhantomData,
        }
    }

    /// Calls the authority.
    ///
    /// With `require_ownership` the local participant must be `owner`,
    /// otherwise the call is rejected here and never leaves this peer. On the
    /// authority itself the call lands directly in the local inbox.
    pub fn call_authority(
        &mut self,
        ctx: &SessionContext,
        owner: ParticipantId,
        require_ownership: bool,
        message: &M,
    ) -> Result<(), RpcError> {
        if require_ownership && !ctx.is_owner(owner) {
            debug!(caller = %ctx.local(), %owner, "rpc rejected: caller does not own target");
            return Err(RpcError::PermissionDenied {
                caller: ctx.local(),
                reason: "caller does not own the target actor",
            });
        }

        if ctx.is_authority() {
            self.inbox.push_back(InboundCall {
                sender: ctx.local(),
                message: message.clone(),
            });
            return Ok(());
        }

        let frame = self.frame(ctx.local(), message)?;
        self.outbox.push((ctx.authority(), frame));
        Ok(())
    }

    /// Broadcasts from the authority to every participant except `exclude`.
    ///
    /// The authority's own inbox receives the call too unless it is the
    /// excluded participant.
    pub fn broadcast(
        &mut self,
        ctx: &SessionContext,
        message: &M,
        exclude: Option<ParticipantId>,
    ) -> Result<(), RpcError> {
        if !ctx.is_authority() {
            debug!(caller = %ctx.local(), "broadcast rejected: caller is not the authority");
            return Err(RpcError::PermissionDenied {
                caller: ctx.local(),
                reason: "only the authority may broadcast",
            });
        }

        let frame = self.frame(ctx.local(), message)?;
        for recipient in ctx.others() {
            if Some(recipient) != exclude {
                self.outbox.push((recipient, frame.clone()));
            }
        }
        if exclude != Some(ctx.local()) {
            self.inbox.push_back(InboundCall {
                sender: ctx.local(),
                message: message.clone(),
            });
        }
        Ok(())
    }

    /// Accepts a frame that arrived from `from`.
    pub fn receive(&mut self, from: ParticipantId, frame: &RpcFrame) -> ReceiveOutcome {
        if frame.sender != from {
            warn!(%from, claimed = %frame.sender, "rpc frame sender mismatch, dropping");
            return ReceiveOutcome::Rejected;
        }

        let last = self.last_seen.get(&from).copied().unwrap_or(0);
        if frame.sequence <= last {
            self.duplicates += 1;
            trace!(%from, sequence = frame.sequence, "duplicate rpc dropped");
            return ReceiveOutcome::Duplicate;
        }

        match postcard::from_bytes::<M>(&frame.payload) {
            Ok(message) => {
                self.last_seen.insert(from, frame.sequence);
                self.inbox.push_back(InboundCall {
                    sender: from,
                    message,
                });
                ReceiveOutcome::Accepted
            }
            Err(err) => {
                warn!(%from, sequence = frame.sequence, "undecodable rpc dropped: {err}");
                ReceiveOutcome::Rejected
            }
        }
    }

    /// Frames waiting to be sent, paired with their recipient.
    pub fn drain_outbox(&mut self) -> Vec<(ParticipantId, RpcFrame)> {
        std::mem::take(&mut self.outbox)
    }

    /// Calls waiting to be handled, in arrival order.
    pub fn drain_inbox(&mut self) -> Vec<InboundCall<M>> {
        self.inbox.drain(..).collect()
    }

    /// Drops the duplicate-tracking state for a departed participant.
    pub fn forget(&mut self, participant: ParticipantId) {
        self.last_seen.remove(&participant);
    }

    /// Number of duplicate frames dropped so far.
    pub fn duplicates_dropped(&self) -> u64 {
        self.duplicates
    }

    fn frame(&mut self, sender: ParticipantId, message: &M) -> Result<RpcFrame, RpcError> {
        let payload = postcard::to_allocvec(message)?;
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        Ok(RpcFrame {
            sender,
            sequence,
            payload,
        })
    }
}

impl<M> Default for RpcDispatcher<M>
where
    M: Serialize + DeserializeOwned + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    enum TestCall {
        Hit { target: u64, damage: u32 },
        Effect(u8),
    }

    const HOST: ParticipantId = ParticipantId(1);
    const A: ParticipantId = ParticipantId(2);
    const B: ParticipantId = ParticipantId(3);

    fn host_ctx() -> SessionContext {
        let mut ctx = SessionContext::host(HOST);
        ctx.add_participant(A);
        ctx.add_participant(B);
        ctx
    }

    #[test]
    fn test_owner_call_is_queued_for_authority() {
        let ctx = SessionContext::observer(A, HOST);
        let mut rpc = RpcDispatcher::new();

        rpc.call_authority(&ctx, A, true, &TestCall::Effect(1)).unwrap();

        let out = rpc.drain_outbox();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].0, HOST);
        assert_eq!(out[0].1.sender, A);
        assert!(rpc.drain_inbox().is_empty());
    }

    #[test]
    fn test_non_owner_call_rejected_before_transmission() {
        let ctx = SessionContext::observer(A, HOST);
        let mut rpc = RpcDispatcher::new();

        let result = rpc.call_authority(&ctx, B, true, &TestCall::Effect(1));

        assert!(matches!(result, Err(RpcError::PermissionDenied { caller: A, .. })));
        assert!(rpc.drain_outbox().is_empty());
    }

    #[test]
    fn test_ownership_free_call_allowed_for_anyone() {
        let ctx = SessionContext::observer(A, HOST);
        let mut rpc = RpcDispatcher::new();

        rpc.call_authority(&ctx, B, false, &TestCall::Hit { target: 3, damage: 25 })
            .unwrap();
        assert_eq!(rpc.drain_outbox().len(), 1);
    }

    #[test]
    fn test_authority_call_delivers_locally() {
        let ctx = host_ctx();
        let mut rpc = RpcDispatcher::new();

        rpc.call_authority(&ctx, HOST, true, &TestCall::Effect(7)).unwrap();

        assert!(rpc.drain_outbox().is_empty());
        assert_eq!(
            rpc.drain_inbox(),
            vec![InboundCall {
                sender: HOST,
                message: TestCall::Effect(7)
            }]
        );
    }

    #[test]
    fn test_broadcast_excludes_sender() {
        let ctx = host_ctx();
        let mut rpc = RpcDispatcher::new();

        rpc.broadcast(&ctx, &TestCall::Effect(2), Some(A)).unwrap();

        let recipients: Vec<ParticipantId> = rpc.drain_outbox().into_iter().map(|(to, _)| to).collect();
        assert_eq!(recipients, vec![B]);
        assert_eq!(rpc.drain_inbox().len(), 1);
    }

    #[test]
    fn test_broadcast_excluding_authority_skips_local_inbox() {
        let ctx = host_ctx();
        let mut rpc = RpcDispatcher::new();

        rpc.broadcast(&ctx, &TestCall::Effect(2), Some(HOST)).unwrap();

        assert_eq!(rpc.drain_outbox().len(), 2);
        assert!(rpc.drain_inbox().is_empty());
    }

    #[test]
    fn test_observer_cannot_broadcast() {
        let ctx = SessionContext::observer(A, HOST);
        let mut rpc: RpcDispatcher<TestCall> = RpcDispatcher::new();

        assert!(rpc.broadcast(&ctx, &TestCall::Effect(0), None).is_err());
        assert!(rpc.drain_outbox().is_empty());
    }

    #[test]
    fn test_duplicate_frames_dropped() {
        let observer = SessionContext::observer(A, HOST);
        let mut sender = RpcDispatcher::new();
        let mut receiver: RpcDispatcher<TestCall> = RpcDispatcher::new();

        sender
            .call_authority(&observer, A, true, &TestCall::Hit { target: 3, damage: 40 })
            .unwrap();
        let (_, frame) = sender.drain_outbox().remove(0);

        assert_eq!(receiver.receive(A, &frame), ReceiveOutcome::Accepted);
        assert_eq!(receiver.receive(A, &frame), ReceiveOutcome::Duplicate);
        assert_eq!(receiver.duplicates_dropped(), 1);
        assert_eq!(receiver.drain_inbox().len(), 1);
    }

    #[test]
    fn test_sequences_tracked_per_sender() {
        let mut receiver: RpcDispatcher<TestCall> = RpcDispatcher::new();
        let payload = postcard::to_allocvec(&TestCall::Effect(1)).unwrap();
        let frame = |sender, sequence| RpcFrame {
            sender,
            sequence,
            payload: payload.clone(),
        };

        assert_eq!(receiver.receive(A, &frame(A, 1)), ReceiveOutcome::Accepted);
        assert_eq!(receiver.receive(B, &frame(B, 1)), ReceiveOutcome::Accepted);
        assert_eq!(receiver.receive(A, &frame(A, 2)), ReceiveOutcome::Accepted);

        receiver.forget(A);
        assert_eq!(receiver.receive(A, &frame(A, 1)), ReceiveOutcome::Accepted);
    }

    #[test]
    fn test_spoofed_or_garbled_frames_rejected() {
        let mut receiver: RpcDispatcher<TestCall> = RpcDispatcher::new();
        let spoofed = RpcFrame {
            sender: B,
            sequence: 1,
            payload: postcard::to_allocvec(&TestCall::Effect(1)).unwrap(),
        };
        let garbled = RpcFrame {
            sender: A,
            sequence: 1,
            payload: vec![0xFF],
        };

        assert_eq!(receiver.receive(A, &spoofed), ReceiveOutcome::Rejected);
        assert_eq!(receiver.receive(A, &garbled), ReceiveOutcome::Rejected);
        assert!(receiver.drain_inbox().is_empty());
    }
}
