//! Operations driven by the local participant on its own actor, plus the
//! per-tick timer and motion passes.

use skirmish_net::ParticipantId;
use skirmish_physics::MovementInput;
use tracing::{debug, trace, warn};

use super::{Arena, ArenaError};
use crate::actor::Actor;
use crate::messages::GameRpc;
use crate::presentation::PresentationEvent;
use crate::timers::{ActorTimer, TimerId};
use crate::weapon::{FireOutcome, TriggerInput, TriggerOutcome};

impl Arena {
    /// Applies the trigger policy to the local actor's weapon.
    ///
    /// Dead actors never fire. An accepted shot is announced to the
    /// authority and opens the short shot-feedback window.
    pub fn fire(&mut self, input: TriggerInput) -> Result<TriggerOutcome, ArenaError> {
        let local = self.ctx.local();
        let entity = self.entity(local)?;
        let now = self.clock;
        let feedback_until = now + self.config.session.hit_effect_secs;

        let outcome = {
            let ctx = &self.ctx;
            let outbox = &mut self.outbox;
            let mut actor = self
                .world
                .get_mut::<Actor>(entity)
                .ok_or(ArenaError::UnknownActor(local))?;
            if actor.health.is_dead() {
                return Ok(TriggerOutcome::Idle);
            }
            let actor = &mut *actor;
            let outcome = actor
                .weapon
                .pull_trigger(ctx, input, now, &mut actor.timers, outbox)?;
            if outcome == TriggerOutcome::Fire(FireOutcome::Fired) {
                actor.timers.cancel_kind(ActorTimer::HitEffectExpired);
                actor.timers.schedule(feedback_until, ActorTimer::HitEffectExpired);
                actor.hit_effect_active = true;
            }
            outcome
        };

        match outcome {
            TriggerOutcome::Fire(FireOutcome::Fired) => {
                self.stats.shots_fired += 1;
                self.rpc
                    .call_authority(&self.ctx, local, true, &GameRpc::ShotFired)?;
                self.emit(PresentationEvent::ShotFired { shooter: local });
            }
            TriggerOutcome::Fire(FireOutcome::DryFire) => {
                self.emit(PresentationEvent::DryFire { actor: local });
            }
            TriggerOutcome::ReloadStarted => {
                self.emit(PresentationEvent::ReloadStarted { actor: local });
            }
            TriggerOutcome::Fire(FireOutcome::CoolingDown | FireOutcome::Reloading)
            | TriggerOutcome::Idle => {}
        }
        Ok(outcome)
    }

    /// Starts reloading the local actor's weapon.
    pub fn reload(&mut self) -> Result<TimerId, ArenaError> {
        let local = self.ctx.local();
        let entity = self.entity(local)?;
        let now = self.clock;

        let timer = {
            let ctx = &self.ctx;
            let outbox = &mut self.outbox;
            let mut actor = self
                .world
                .get_mut::<Actor>(entity)
                .ok_or(ArenaError::UnknownActor(local))?;
            let actor = &mut *actor;
            actor.weapon.start_reload(ctx, now, &mut actor.timers, outbox)?
        };
        self.emit(PresentationEvent::ReloadStarted { actor: local });
        Ok(timer)
    }

    /// Reports a hit by the local actor on `target`. Damage comes from the
    /// local weapon profile; the authority applies it as reported.
    pub fn report_hit(&mut self, target: ParticipantId, headshot: bool) -> Result<f32, ArenaError> {
        let local = self.ctx.local();
        let damage = self
            .actor(local)
            .ok_or(ArenaError::UnknownActor(local))?
            .weapon
            .profile()
            .hit_damage(headshot);

        let call = GameRpc::ReportHit {
            target,
            damage,
            headshot,
        };
        self.rpc.call_authority(&self.ctx, local, false, &call)?;
        self.stats.hits_reported += 1;
        trace!(%target, damage, headshot, "hit reported");
        Ok(damage)
    }

    /// Integrates the local actor's motion. A dead actor gets no input.
    pub(super) fn step_local_motion(&mut self, dt: f32, input: &MovementInput) {
        let local = self.ctx.local();
        let Ok(entity) = self.entity(local) else {
            return;
        };
        let now = self.clock;

        let step = {
            let Some(mut actor) = self.world.get_mut::<Actor>(entity) else {
                return;
            };
            let idle = MovementInput::default();
            let input = if actor.health.is_dead() { &idle } else { input };
            let body = actor.body();
            self.locomotion.step(
                &mut actor.motion,
                input,
                dt,
                now,
                self.physics.as_deref_mut(),
                body,
            )
        };

        if step.jumped {
            self.emit(PresentationEvent::Jump { actor: local });
        }
    }

    /// Fires every due timer of every actor, earliest first per actor.
    pub(super) fn run_due_timers(&mut self) {
        let now = self.clock;
        let mut due: Vec<(ParticipantId, ActorTimer)> = Vec::new();
        for id in self.actor_ids() {
            let Ok(mut actor) = self.actor_mut(id) else {
                continue;
            };
            due.extend(actor.timers.drain_due(now).into_iter().map(|(_, kind)| (id, kind)));
        }

        for (id, kind) in due {
            match kind {
                ActorTimer::CompleteReload => self.complete_reload(id),
                ActorTimer::Respawn => {
                    if let Err(err) = self.respawn(id) {
                        warn!(%id, "respawn failed: {err}");
                    }
                }
                ActorTimer::HitEffectExpired => {
                    if let Ok(mut actor) = self.actor_mut(id) {
                        actor.hit_effect_active = false;
                    }
                    self.emit(PresentationEvent::HitEffectExpired { actor: id });
                }
            }
        }
    }

    fn complete_reload(&mut self, id: ParticipantId) {
        let Ok(entity) = self.entity(id) else {
            return;
        };
        let result = {
            let ctx = &self.ctx;
            let outbox = &mut self.outbox;
            let Some(mut actor) = self.world.get_mut::<Actor>(entity) else {
                return;
            };
            actor.weapon.complete_reload(ctx, outbox)
        };
        match result {
            Ok(true) => {
                debug!(%id, "reload complete");
                self.emit(PresentationEvent::ReloadCompleted { actor: id });
            }
            Ok(false) => {}
            Err(err) => warn!(%id, "reload completion failed: {err}"),
        }
    }
}
