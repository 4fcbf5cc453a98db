//! Authority-side operations: damage, death, respawn and placement.

use glam::Vec3;
use skirmish_net::ParticipantId;
use tracing::{debug, info, warn};

use super::{Arena, ArenaError};
use crate::actor::Actor;
use crate::health::{CombatError, DamageOutcome};
use crate::messages::GameRpc;
use crate::spawn::SpawnResolution;
use crate::timers::ActorTimer;

/// Label used when the killer cannot be resolved.
pub const UNKNOWN_KILLER: &str = "Unknown";

impl Arena {
    /// Applies damage to `target` on the authority.
    ///
    /// Broadcasts a hit effect for every hit on a live actor. The killing
    /// hit also broadcasts a death effect and schedules the respawn.
    pub fn apply_damage(
        &mut self,
        target: ParticipantId,
        amount: f32,
        attacker: Option<ParticipantId>,
    ) -> Result<DamageOutcome, ArenaError> {
        self.ensure_authority()?;
        let respawn_at = self.clock + self.config.session.respawn_delay_secs;

        let entity = self.entity(target)?;
        let outcome = {
            let ctx = &self.ctx;
            let outbox = &mut self.outbox;
            let mut actor = self
                .world
                .get_mut::<Actor>(entity)
                .ok_or(ArenaError::UnknownActor(target))?;
            let outcome = actor.health.apply_damage(ctx, amount, attacker, outbox)?;
            if outcome == DamageOutcome::Killed {
                actor.timers.cancel_kind(ActorTimer::Respawn);
                actor.timers.schedule(respawn_at, ActorTimer::Respawn);
            }
            outcome
        };

        match outcome {
            DamageOutcome::Ignored => {
                debug!(%target, amount, "damage ignored: target already dead");
            }
            DamageOutcome::Wounded { remaining } => {
                debug!(%target, amount, remaining, "hit");
                self.broadcast_hit(target, attacker, amount)?;
            }
            DamageOutcome::Killed => {
                self.broadcast_hit(target, attacker, amount)?;
                let killer_label = self.killer_label(attacker);
                info!("{killer_label} eliminated {target}");
                self.stats.kills += 1;
                self.rpc.broadcast(
                    &self.ctx,
                    &GameRpc::DeathEffect {
                        victim: target,
                        killer: attacker,
                        killer_label,
                    },
                    None,
                )?;
            }
        }
        Ok(outcome)
    }

    /// Brings `target` back at full health on the authority and places it
    /// through spawn resolution.
    pub fn respawn(&mut self, target: ParticipantId) -> Result<SpawnResolution, ArenaError> {
        self.ensure_authority()?;
        let entity = self.entity(target)?;
        {
            let ctx = &self.ctx;
            let outbox = &mut self.outbox;
            let mut actor = self
                .world
                .get_mut::<Actor>(entity)
                .ok_or(ArenaError::UnknownActor(target))?;
            actor.health.respawn(ctx, outbox)?;
            actor.timers.cancel_kind(ActorTimer::Respawn);
        }

        let resolution = self.place_actor(target)?;
        self.stats.respawns += 1;
        info!(%target, position = ?resolution.position, source = ?resolution.source, "respawned");
        Ok(resolution)
    }

    /// Resolves a spawn position for `target`, moves its body there and
    /// announces it.
    pub(super) fn place_actor(&mut self, target: ParticipantId) -> Result<SpawnResolution, ArenaError> {
        let entity = self.entity(target)?;
        let occupied: Vec<Vec3> = self
            .actor_ids()
            .into_iter()
            .filter(|id| *id != target)
            .filter_map(|id| self.position(id))
            .collect();
        let index = self.ctx.participant_index(target).unwrap_or(0);

        let resolution = {
            let spatial = self.physics.as_deref().map(|physics| physics.as_spatial());
            self.spawner.resolve(index, target, spatial, &occupied)
        };

        let body = {
            let mut actor = self
                .world
                .get_mut::<Actor>(entity)
                .ok_or(ArenaError::UnknownActor(target))?;
            actor.position = resolution.position;
            actor.body()
        };
        if let Some(physics) = self.physics.as_mut() {
            if !physics.teleport(body, resolution.position) {
                physics.spawn_body(body, resolution.position);
            }
            physics.set_linear_velocity(body, Vec3::ZERO);
            physics.set_angular_velocity(body, Vec3::ZERO);
        }

        self.rpc.broadcast(
            &self.ctx,
            &GameRpc::Respawned {
                actor: target,
                position: resolution.position.to_array(),
            },
            None,
        )?;
        Ok(resolution)
    }

    /// Display name of `attacker`, or [`UNKNOWN_KILLER`] when it is not a
    /// current participant.
    pub fn killer_label(&self, attacker: Option<ParticipantId>) -> String {
        match attacker {
            Some(id) if self.ctx.contains(id) => id.to_string(),
            _ => UNKNOWN_KILLER.to_string(),
        }
    }

    pub(super) fn handle_report_hit(&mut self, shooter: ParticipantId, target: ParticipantId, damage: f32) {
        if !self.actors.contains_key(&target) {
            warn!(%shooter, %target, "hit reported on unknown actor");
            return;
        }
        if let Err(err) = self.apply_damage(target, damage, Some(shooter)) {
            warn!(%shooter, %target, damage, "reported hit rejected: {err}");
        }
    }

    pub(super) fn handle_shot_fired(&mut self, shooter: ParticipantId) {
        let effect = GameRpc::ShotEffect { shooter };
        if let Err(err) = self.rpc.broadcast(&self.ctx, &effect, Some(shooter)) {
            warn!(%shooter, "shot effect broadcast failed: {err}");
        }
    }

    fn broadcast_hit(
        &mut self,
        target: ParticipantId,
        attacker: Option<ParticipantId>,
        amount: f32,
    ) -> Result<(), ArenaError> {
        let effect = GameRpc::HitEffect {
            target,
            attacker,
            amount,
        };
        self.rpc.broadcast(&self.ctx, &effect, None)?;
        Ok(())
    }

    fn ensure_authority(&self) -> Result<(), ArenaError> {
        if self.ctx.is_authority() {
            Ok(())
        } else {
            Err(CombatError::PermissionDenied(self.ctx.local()).into())
        }
    }
}
