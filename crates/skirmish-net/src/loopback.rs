//! In-process transport over crossbeam channels.
//!
//! A [`LoopbackHub`] hands out [`LoopbackEndpoint`]s that exchange fully
//! serialized packets, so everything that would cross a real socket crosses
//! the wire codec here too. Per-pair ordering follows from the underlying
//! channel. With duplicate delivery enabled every packet arrives twice, which
//! is how the at-least-once handling of the layers above gets exercised.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crossbeam_channel::{Receiver, Sender, unbounded};
use tracing::{debug, warn};

use crate::messages::{Packet, ParticipantId, deserialize_packet, serialize_packet};
use crate::transport::{Transport, TransportError, TransportEvent};

enum Envelope {
    Joined(ParticipantId),
    Left(ParticipantId),
    Bytes { from: ParticipantId, bytes: Vec<u8> },
}

struct HubState {
    next_id: u64,
    duplicate_delivery: bool,
    links: BTreeMap<ParticipantId, Sender<Envelope>>,
}

/// Shared switchboard connecting loopback endpoints.
#[derive(Clone)]
pub struct LoopbackHub {
    state: Arc<Mutex<HubState>>,
}

fn lock(state: &Mutex<HubState>) -> MutexGuard<'_, HubState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl LoopbackHub {
    /// Creates an empty hub with exactly-once delivery.
    pub fn new() -> Self {
        Self::with_duplicate_delivery(false)
    }

    /// Creates an empty hub; `duplicate` delivers every packet twice.
    pub fn with_duplicate_delivery(duplicate: bool) -> Self {
        Self {
            state: Arc::new(Mutex::new(HubState {
                next_id: 1,
                duplicate_delivery: duplicate,
                links: BTreeMap::new(),
            })),
        }
    }

    /// Connects a new participant.
    ///
    /// Everyone already connected receives `Joined(new)`, and the newcomer
    /// receives `Joined` for every existing participant in id order.
    pub fn connect(&self) -> LoopbackEndpoint {
        let (tx, rx) = unbounded();
        let mut state = lock(&self.state);
        let id = ParticipantId(state.next_id);
        state.next_id += 1;

        for (&existing, link) in &state.links {
            let _ = link.send(Envelope::Joined(id));
            let _ = tx.send(Envelope::Joined(existing));
        }
        state.links.insert(id, tx);
        debug!(participant = %id, "loopback endpoint connected");

        LoopbackEndpoint {
            id,
            hub: Arc::clone(&self.state),
            inbox: rx,
        }
    }

    /// Ids of every connected participant in ascending order.
    pub fn participants(&self) -> Vec<ParticipantId> {
        lock(&self.state).links.keys().copied().collect()
    }
}

impl Default for LoopbackHub {
    fn default() -> Self {
        Self::new()
    }
}

/// One participant's end of a [`LoopbackHub`]. Dropping it announces `Left`.
pub struct LoopbackEndpoint {
    id: ParticipantId,
    hub: Arc<Mutex<HubState>>,
    inbox: Receiver<Envelope>,
}

impl Transport for LoopbackEndpoint {
    fn local_id(&self) -> ParticipantId {
        self.id
    }

    fn send(&self, to: ParticipantId, packet: &Packet) -> Result<(), TransportError> {
        let bytes = serialize_packet(packet)?;
        let state = lock(&self.hub);
        let link = state.links.get(&to).ok_or(TransportError::UnknownPeer(to))?;

        let copies = if state.duplicate_delivery { 2 } else { 1 };
        for _ in 0..copies {
            link.send(Envelope::Bytes {
                from: self.id,
                bytes: bytes.clone(),
            })
            .map_err(|_| TransportError::Disconnected(to))?;
        }
        Ok(())
    }

    fn poll(&mut self) -> Vec<TransportEvent> {
        let mut events = Vec::new();
        for envelope in self.inbox.try_iter() {
            match envelope {
                Envelope::Joined(id) => events.push(TransportEvent::Joined(id)),
                Envelope::Left(id) => events.push(TransportEvent::Left(id)),
                Envelope::Bytes { from, bytes } => match deserialize_packet(&bytes) {
                    Ok(packet) => events.push(TransportEvent::Packet { from, packet }),
                    Err(err) => warn!(%from, "dropping undecodable packet: {err}"),
                },
            }
        }
        events
    }
}

impl Drop for LoopbackEndpoint {
    fn drop(&mut self) {
        let mut state = lock(&self.hub);
        state.links.remove(&self.id);
        for link in state.links.values() {
            let _ = link.send(Envelope::Left(self.id));
        }
        debug!(participant = %self.id, "loopback endpoint disconnected");
    }
}
