//! Helpers shared by the multi-peer tests.

#![allow(dead_code)]

use skirmish_combat::{Arena, RecordingSink};
use skirmish_config::{Config, SpawnConfig};
use skirmish_multiplayer::SessionContext;
use skirmish_net::{LoopbackHub, ParticipantId, Transport};
use skirmish_physics::MovementInput;

pub const DT: f64 = 1.0 / 60.0;

/// One participant: its arena and a handle on what its sink recorded.
pub struct Peer {
    pub arena: Arena,
    pub sink: RecordingSink,
}

impl Peer {
    pub fn id(&self) -> ParticipantId {
        self.arena.local_id()
    }
}

pub fn test_config() -> Config {
    Config {
        spawn: SpawnConfig {
            points: vec![[0.0, 2.0, 0.0], [10.0, 2.0, 0.0], [0.0, 2.0, 10.0]],
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Connects the session host.
pub fn host(hub: &LoopbackHub, config: Config) -> Peer {
    let endpoint = hub.connect();
    let ctx = SessionContext::host(endpoint.local_id());
    let sink = RecordingSink::new();
    let arena = Arena::new(config, ctx)
        .with_transport(endpoint)
        .with_sink(sink.clone());
    Peer { arena, sink }
}

/// Connects a participant joining the session hosted by `authority`.
pub fn guest(hub: &LoopbackHub, config: Config, authority: ParticipantId) -> Peer {
    let endpoint = hub.connect();
    let ctx = SessionContext::observer(endpoint.local_id(), authority);
    let sink = RecordingSink::new();
    let arena = Arena::new(config, ctx)
        .with_transport(endpoint)
        .with_sink(sink.clone());
    Peer { arena, sink }
}

/// Ticks every peer in turn with idle input.
pub fn pump(peers: &mut [Peer], ticks: usize) {
    for _ in 0..ticks {
        for peer in peers.iter_mut() {
            peer.arena.tick(DT, &MovementInput::default());
        }
    }
}

pub fn health_seen_by(peer: &Peer, id: ParticipantId) -> f32 {
    peer.arena
        .actor(id)
        .map(|actor| actor.health.current())
        .unwrap_or(f32::NAN)
}
