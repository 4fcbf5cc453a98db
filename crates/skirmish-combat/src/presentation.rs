//! Read-only presentation interface: HUD snapshots and one-shot effects.
//!
//! Sinks receive data after the simulation has settled for the tick and
//! never feed anything back into it.

use std::sync::{Arc, Mutex, PoisonError};

use glam::Vec3;
use skirmish_net::ParticipantId;
use tracing::{debug, info, trace};

/// Everything a HUD shows for one actor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActorSnapshot {
    pub actor: ParticipantId,
    /// `current / max` health.
    pub health_fraction: f32,
    pub clip_ammo: u32,
    pub reserve_ammo: u32,
    pub reloading: bool,
    pub grounded: bool,
    pub dead: bool,
}

/// One-shot effect or state change.
#[derive(Debug, Clone, PartialEq)]
pub enum PresentationEvent {
    Hit {
        target: ParticipantId,
        attacker: Option<ParticipantId>,
        amount: f32,
    },
    HealthChanged {
        actor: ParticipantId,
        old: f32,
        new: f32,
    },
    Death {
        victim: ParticipantId,
        killer_label: String,
    },
    Respawned {
        actor: ParticipantId,
        position: Vec3,
    },
    Jump {
        actor: ParticipantId,
    },
    ShotFired {
        shooter: ParticipantId,
    },
    DryFire {
        actor: ParticipantId,
    },
    ReloadStarted {
        actor: ParticipantId,
    },
    ReloadCompleted {
        actor: ParticipantId,
    },
    /// The shooter's short hit-marker window closed.
    HitEffectExpired {
        actor: ParticipantId,
    },
}

pub trait PresentationSink: Send {
    fn snapshot(&mut self, snapshot: &ActorSnapshot);

    fn event(&mut self, event: &PresentationEvent);
}

#[derive(Debug, Default)]
struct Recorded {
    events: Vec<PresentationEvent>,
    snapshots: Vec<ActorSnapshot>,
}

/// Keeps everything it receives. Clones share the same record, so a test can
/// hand one clone to an arena and inspect the other.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    inner: Arc<Mutex<Recorded>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PresentationEvent> {
        self.lock().events.clone()
    }

    pub fn snapshots(&self) -> Vec<ActorSnapshot> {
        self.lock().snapshots.clone()
    }

    pub fn last_snapshot(&self) -> Option<ActorSnapshot> {
        self.lock().snapshots.last().copied()
    }

    pub fn clear(&self) {
        let mut recorded = self.lock();
        recorded.events.clear();
        recorded.snapshots.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Recorded> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PresentationSink for RecordingSink {
    fn snapshot(&mut self, snapshot: &ActorSnapshot) {
        self.lock().snapshots.push(*snapshot);
    }

    fn event(&mut self, event: &PresentationEvent) {
        self.lock().events.push(event.clone());
    }
}

/// Logs events through `tracing`; snapshots go to `trace`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl PresentationSink for TracingSink {
    fn snapshot(&mut self, s: &ActorSnapshot) {
        trace!(
            actor = %s.actor,
            health = s.health_fraction,
            clip = s.clip_ammo,
            reserve = s.reserve_ammo,
            reloading = s.reloading,
            grounded = s.grounded,
            dead = s.dead,
            "hud"
        );
    }

    fn event(&mut self, event: &PresentationEvent) {
        match event {
            PresentationEvent::Death {
                victim,
                killer_label,
            } => info!(%victim, killer = %killer_label, "death effect"),
            PresentationEvent::Respawned { actor, position } => {
                info!(%actor, ?position, "respawn effect")
            }
            other => debug!(?other, "presentation event"),
        }
    }
}
