//! Membership changes and everything that arrives from other participants.

use glam::Vec3;
use skirmish_multiplayer::{ApplyOutcome, InboundCall, ReceiveOutcome};
use skirmish_net::{Packet, ParticipantId, TransportEvent, VariableUpdate};
use skirmish_physics::BodyId;
use tracing::{debug, info, trace, warn};

use super::{Arena, ArenaError};
use crate::actor::Actor;
use crate::messages::GameRpc;
use crate::presentation::PresentationEvent;

impl Arena {
    /// Registers a participant and creates its actor. On the authority the
    /// actor is placed through spawn resolution. Every variable this peer
    /// writes is re-sent to the newcomer so it starts from current state.
    pub fn participant_joined(&mut self, id: ParticipantId) {
        let index = self.ctx.add_participant(id);
        let created = !self.actors.contains_key(&id);
        self.spawn_actor(id);
        if created {
            info!(%id, index, "participant joined");
        }
        if id != self.ctx.local() {
            self.queue_resync(id);
        }
    }

    /// Removes a participant: pending timers are dropped, observer
    /// subscriptions revoked and the body destroyed.
    pub fn participant_left(&mut self, id: ParticipantId) {
        if id == self.ctx.local() {
            return;
        }
        if id == self.ctx.authority() {
            warn!(%id, "authority left the session");
        }

        if let Some(entity) = self.actors.remove(&id) {
            if let Some(mut actor) = self.world.get_mut::<Actor>(entity) {
                actor.timers.cancel_all();
            }
            self.world.despawn(entity);
        }
        if let Some(physics) = self.physics.as_mut() {
            physics.remove_body(BodyId(id.0));
        }
        self.ctx.remove_participant(id);
        self.rpc.forget(id);
        info!(%id, "participant left");
    }

    /// Drains the transport and routes every event. Without a transport this
    /// does nothing.
    pub fn poll_transport(&mut self) {
        let events = match self.transport.as_mut() {
            Some(transport) => transport.poll(),
            None => return,
        };
        for event in events {
            match event {
                TransportEvent::Joined(id) => self.participant_joined(id),
                TransportEvent::Left(id) => self.participant_left(id),
                TransportEvent::Packet { from, packet } => match packet {
                    Packet::Variable(update) => self.apply_remote_update(from, &update),
                    Packet::Rpc(frame) => match self.rpc.receive(from, &frame) {
                        ReceiveOutcome::Accepted => {}
                        ReceiveOutcome::Duplicate => {
                            trace!(%from, sequence = frame.sequence, "duplicate rpc")
                        }
                        ReceiveOutcome::Rejected => debug!(%from, "rpc frame rejected"),
                    },
                },
            }
        }
    }

    /// Handles queued calls until the inbox is empty. Handlers may broadcast,
    /// which on the authority queues more local calls.
    pub(super) fn dispatch_inbound(&mut self) {
        loop {
            let calls = self.rpc.drain_inbox();
            if calls.is_empty() {
                break;
            }
            for call in calls {
                self.handle_call(call);
            }
        }
    }

    fn handle_call(&mut self, call: InboundCall<GameRpc>) {
        let InboundCall { sender, message } = call;
        let authority = self.ctx.authority();

        match message {
            GameRpc::ReportHit { target, damage, .. } if self.ctx.is_authority() => {
                self.handle_report_hit(sender, target, damage);
            }
            GameRpc::ShotFired if self.ctx.is_authority() => self.handle_shot_fired(sender),
            GameRpc::ShotEffect { shooter } if sender == authority => {
                self.emit(PresentationEvent::ShotFired { shooter });
            }
            GameRpc::HitEffect {
                target,
                attacker,
                amount,
            } if sender == authority => {
                self.emit(PresentationEvent::Hit {
                    target,
                    attacker,
                    amount,
                });
            }
            GameRpc::DeathEffect {
                victim,
                killer_label,
                ..
            } if sender == authority => {
                self.emit(PresentationEvent::Death {
                    victim,
                    killer_label,
                });
            }
            GameRpc::Respawned { actor, position } if sender == authority => {
                let position = Vec3::from_array(position);
                if !self.ctx.is_authority() {
                    self.move_to_placement(actor, position);
                }
                self.emit(PresentationEvent::Respawned { actor, position });
            }
            other => warn!(%sender, ?other, "unexpected rpc dropped"),
        }
    }

    fn apply_remote_update(&mut self, from: ParticipantId, update: &VariableUpdate) {
        let owner = ParticipantId(update.key.entity);
        let result = {
            let ctx = &self.ctx;
            match self.actors.get(&owner) {
                Some(entity) => match self.world.get_mut::<Actor>(*entity) {
                    Some(mut actor) => actor.apply_update(from, ctx, update),
                    None => Err(ArenaError::UnknownActor(owner)),
                },
                None => Err(ArenaError::UnknownActor(owner)),
            }
        };

        match result {
            Ok(ApplyOutcome::Applied) => {}
            Ok(ApplyOutcome::Stale) => trace!(%from, key = ?update.key, "stale update"),
            Err(err) => debug!(%from, key = ?update.key, "update dropped: {err}"),
        }
    }

    /// Mirrors an authority placement on this peer's copy of the body.
    fn move_to_placement(&mut self, id: ParticipantId, position: Vec3) {
        let body = {
            let Ok(mut actor) = self.actor_mut(id) else {
                return;
            };
            actor.position = position;
            actor.body()
        };
        if let Some(physics) = self.physics.as_mut() {
            if !physics.teleport(body, position) {
                physics.spawn_body(body, position);
            }
            physics.set_linear_velocity(body, Vec3::ZERO);
            physics.set_angular_velocity(body, Vec3::ZERO);
        }
    }

    fn queue_resync(&mut self, newcomer: ParticipantId) {
        let mut queued = Vec::new();
        for id in self.actor_ids() {
            let Some(actor) = self.actor(id) else {
                continue;
            };
            match actor.resync_updates(&self.ctx) {
                Ok(updates) => queued.extend(updates),
                Err(err) => warn!(%id, "resync encode failed: {err}"),
            }
        }
        debug!(%newcomer, updates = queued.len(), "resync queued");
        self.direct
            .extend(queued.into_iter().map(|update| (newcomer, update)));
    }
}
