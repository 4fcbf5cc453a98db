//! Per-participant simulation orchestrator.
//!
//! An [`Arena`] owns everything one participant simulates: the session
//! context, an ECS world of [`Actor`]s keyed by owner, the RPC dispatcher,
//! the replication outbox and the optional collaborators (physics backend,
//! transport, presentation sink). Every canonical mutation goes through
//! `&mut Arena`, so inbound calls are applied one at a time.
//!
//! [`Arena::tick`] runs one fixed step:
//!
//! 1. poll the transport and dispatch inbound calls
//! 2. integrate local motion and step physics
//! 3. fire due timers and dispatch the calls they produced
//! 4. forward observer notifications to the sink
//! 5. flush replication and RPC traffic
//! 6. publish the local snapshot

mod authority;
mod inbound;
mod owner;

pub use authority::UNKNOWN_KILLER;

use bevy_ecs::prelude::*;
use crossbeam_channel::{Receiver, Sender};
use glam::Vec3;
use rustc_hash::FxHashMap;
use skirmish_config::Config;
use skirmish_multiplayer::{
    ReplicationError, ReplicationOutbox, RpcDispatcher, RpcError, SessionContext,
};
use skirmish_net::{Packet, ParticipantId, Transport, VarKey, VariableUpdate};
use skirmish_physics::{Locomotion, MovementInput, PhysicsBackend};
use tracing::{debug, info, warn};

use crate::actor::Actor;
use crate::health::CombatError;
use crate::messages::GameRpc;
use crate::presentation::{ActorSnapshot, PresentationEvent, PresentationSink};
use crate::spawn::SpawnPlacer;
use crate::weapon::WeaponError;

#[derive(Debug, thiserror::Error)]
pub enum ArenaError {
    #[error("no actor for {0}")]
    UnknownActor(ParticipantId),

    /// An update for `key` arrived from a participant that may not write it.
    #[error("{from} may not write {key:?}")]
    UnexpectedWriter { key: VarKey, from: ParticipantId },

    #[error(transparent)]
    Combat(#[from] CombatError),

    #[error(transparent)]
    Weapon(#[from] WeaponError),

    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error(transparent)]
    Replication(#[from] ReplicationError),
}

/// Match counters kept by each arena.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArenaStats {
    /// Kills decided by this arena (authority only).
    pub kills: u32,
    /// Respawns performed by this arena (authority only).
    pub respawns: u32,
    /// Shots fired by the local actor.
    pub shots_fired: u32,
    /// Hits reported by the local actor.
    pub hits_reported: u32,
}

/// Observer callbacks run inside replicated writes; they only queue notices
/// that the tick forwards to the sink.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Notice {
    HealthChanged { actor: ParticipantId, old: f32, new: f32 },
}

#[derive(Debug, Default)]
struct MissingWarnings {
    transport: bool,
    physics: bool,
}

pub struct Arena {
    config: Config,
    ctx: SessionContext,
    world: World,
    actors: FxHashMap<ParticipantId, Entity>,
    rpc: RpcDispatcher<GameRpc>,
    outbox: ReplicationOutbox,
    /// Resync updates addressed to a single late joiner.
    direct: Vec<(ParticipantId, VariableUpdate)>,
    locomotion: Locomotion,
    spawner: SpawnPlacer,
    physics: Option<Box<dyn PhysicsBackend>>,
    transport: Option<Box<dyn Transport>>,
    sink: Option<Box<dyn PresentationSink>>,
    notice_tx: Sender<Notice>,
    notice_rx: Receiver<Notice>,
    clock: f64,
    stats: ArenaStats,
    warned: MissingWarnings,
}

impl Arena {
    /// Creates the arena and an actor for every participant `ctx` already
    /// knows about.
    pub fn new(config: Config, ctx: SessionContext) -> Self {
        let (notice_tx, notice_rx) = crossbeam_channel::unbounded();
        let mut arena = Self {
            locomotion: Locomotion::new(&config.movement, &config.grounding),
            spawner: SpawnPlacer::new(config.spawn.clone(), config.session.rng_seed),
            config,
            ctx,
            world: World::new(),
            actors: FxHashMap::default(),
            rpc: RpcDispatcher::new(),
            outbox: ReplicationOutbox::new(),
            direct: Vec::new(),
            physics: None,
            transport: None,
            sink: None,
            notice_tx,
            notice_rx,
            clock: 0.0,
            stats: ArenaStats::default(),
            warned: MissingWarnings::default(),
        };

        let known: Vec<ParticipantId> = arena.ctx.participants().collect();
        for id in known {
            arena.spawn_actor(id);
        }
        info!(
            local = %arena.ctx.local(),
            role = ?arena.ctx.role(),
            actors = arena.actors.len(),
            "arena created"
        );
        arena
    }

    /// Attaches a physics backend. Actors that already exist get a body at
    /// their last placement.
    pub fn with_physics(mut self, backend: impl PhysicsBackend + 'static) -> Self {
        let mut backend: Box<dyn PhysicsBackend> = Box::new(backend);
        for entity in self.actors.values() {
            if let Some(actor) = self.world.get::<Actor>(*entity) {
                backend.spawn_body(actor.body(), actor.position);
            }
        }
        self.physics = Some(backend);
        self
    }

    pub fn with_transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Box::new(transport));
        self
    }

    pub fn with_sink(mut self, sink: impl PresentationSink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    // ---- Accessors ----

    pub fn ctx(&self) -> &SessionContext {
        &self.ctx
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn local_id(&self) -> ParticipantId {
        self.ctx.local()
    }

    pub fn is_authority(&self) -> bool {
        self.ctx.is_authority()
    }

    /// Simulation time in seconds.
    pub fn clock(&self) -> f64 {
        self.clock
    }

    pub fn stats(&self) -> ArenaStats {
        self.stats
    }

    /// Duplicate RPC frames dropped so far.
    pub fn duplicate_rpcs(&self) -> u64 {
        self.rpc.duplicates_dropped()
    }

    pub fn actor(&self, id: ParticipantId) -> Option<&Actor> {
        let entity = self.actors.get(&id)?;
        self.world.get::<Actor>(*entity)
    }

    /// Owners of every actor, in id order.
    pub fn actor_ids(&self) -> Vec<ParticipantId> {
        let mut ids: Vec<ParticipantId> = self.actors.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn physics(&self) -> Option<&dyn PhysicsBackend> {
        self.physics.as_deref()
    }

    /// Body position when physics tracks the actor, last placement otherwise.
    pub fn position(&self, id: ParticipantId) -> Option<Vec3> {
        let actor = self.actor(id)?;
        self.physics
            .as_ref()
            .and_then(|physics| physics.position(actor.body()))
            .or(Some(actor.position))
    }

    pub fn snapshot(&self, id: ParticipantId) -> Option<ActorSnapshot> {
        let actor = self.actor(id)?;
        Some(ActorSnapshot {
            actor: id,
            health_fraction: actor.health.fraction(),
            clip_ammo: actor.weapon.clip(),
            reserve_ammo: actor.weapon.reserve(),
            reloading: actor.weapon.is_reloading(),
            grounded: actor.motion.grounded,
            dead: actor.health.is_dead(),
        })
    }

    // ---- Tick ----

    /// Advances the simulation by `dt` seconds with `input` for the local
    /// actor.
    pub fn tick(&mut self, dt: f64, input: &MovementInput) {
        self.clock += dt.max(0.0);

        self.poll_transport();
        self.dispatch_inbound();

        self.step_local_motion(dt as f32, input);
        match self.physics.as_mut() {
            Some(physics) => physics.step(dt as f32),
            None => {
                if !self.warned.physics {
                    self.warned.physics = true;
                    warn!(local = %self.ctx.local(), "no physics backend; grounding and placement checks disabled");
                }
            }
        }

        self.run_due_timers();
        self.dispatch_inbound();
        self.forward_notices();
        self.flush();
        self.publish_snapshot();
    }

    // ---- Internals shared by the submodules ----

    fn entity(&self, id: ParticipantId) -> Result<Entity, ArenaError> {
        self.actors.get(&id).copied().ok_or(ArenaError::UnknownActor(id))
    }

    fn actor_mut(&mut self, id: ParticipantId) -> Result<Mut<'_, Actor>, ArenaError> {
        let entity = self.entity(id)?;
        self.world
            .get_mut::<Actor>(entity)
            .ok_or(ArenaError::UnknownActor(id))
    }

    /// Creates the actor for `id` if it does not exist yet.
    fn spawn_actor(&mut self, id: ParticipantId) {
        if self.actors.contains_key(&id) {
            return;
        }

        let mut actor = Actor::new(id, &self.config, self.spawner.fallback(id));
        let notices = self.notice_tx.clone();
        let subscription = actor.health.subscribe_health(move |old, new| {
            let _ = notices.send(Notice::HealthChanged {
                actor: id,
                old: *old,
                new: *new,
            });
        });
        actor.watch(subscription);
        let body = actor.body();
        let position = actor.position;

        let entity = self.world.spawn(actor).id();
        self.actors.insert(id, entity);
        if let Some(physics) = self.physics.as_mut() {
            physics.spawn_body(body, position);
        }
        debug!(%id, "actor spawned");

        if self.ctx.is_authority()
            && let Err(err) = self.place_actor(id)
        {
            warn!(%id, "initial placement failed: {err}");
        }
    }

    fn emit(&mut self, event: PresentationEvent) {
        if let Some(sink) = self.sink.as_mut() {
            sink.event(&event);
        }
    }

    fn forward_notices(&mut self) {
        let notices: Vec<Notice> = self.notice_rx.try_iter().collect();
        for notice in notices {
            match notice {
                Notice::HealthChanged { actor, old, new } => {
                    self.emit(PresentationEvent::HealthChanged { actor, old, new });
                }
            }
        }
    }

    fn publish_snapshot(&mut self) {
        let Some(snapshot) = self.snapshot(self.ctx.local()) else {
            return;
        };
        if let Some(sink) = self.sink.as_mut() {
            sink.snapshot(&snapshot);
        }
    }

    /// Sends queued replication updates to every other participant, resync
    /// updates to their single recipient and RPC frames to their addressee.
    fn flush(&mut self) {
        let updates = self.outbox.drain();
        let direct = std::mem::take(&mut self.direct);
        let frames = self.rpc.drain_outbox();
        if updates.is_empty() && direct.is_empty() && frames.is_empty() {
            return;
        }

        let Some(transport) = self.transport.as_ref() else {
            if !self.warned.transport {
                self.warned.transport = true;
                warn!(local = %self.ctx.local(), "no transport; outgoing traffic is dropped");
            }
            return;
        };

        let recipients = self.ctx.others();
        let mut outgoing: Vec<(ParticipantId, Packet)> = Vec::new();
        for update in updates {
            let packet = Packet::Variable(update);
            for to in &recipients {
                outgoing.push((*to, packet.clone()));
            }
        }
        outgoing.extend(direct.into_iter().map(|(to, update)| (to, Packet::Variable(update))));
        outgoing.extend(frames.into_iter().map(|(to, frame)| (to, Packet::Rpc(frame))));

        for (to, packet) in outgoing {
            if let Err(err) = transport.send(to, &packet) {
                warn!(%to, "send failed: {err}");
            }
        }
    }
}

#[cfg(test)]
#[path = "arena_tests.rs"]
mod tests;
