//! The actor aggregate: one per participant, stored as an ECS component.

use bevy_ecs::prelude::*;
use glam::Vec3;
use skirmish_config::Config;
use skirmish_multiplayer::{ApplyOutcome, SessionContext, Subscription};
use skirmish_net::{ParticipantId, VariableUpdate};
use skirmish_physics::{BodyId, MotionState};

use crate::arena::ArenaError;
use crate::health::{DEAD_SLOT, HEALTH_SLOT, HealthState};
use crate::timers::{ActorTimer, DelayQueue};
use crate::weapon::{CLIP_SLOT, RELOADING_SLOT, RESERVE_SLOT, WeaponProfile, WeaponState};

/// Health, weapon and motion of one participant's avatar.
///
/// Dropping the actor discards pending timers and revokes its observer
/// subscriptions.
#[derive(Component, Debug)]
pub struct Actor {
    pub owner: ParticipantId,
    pub health: HealthState,
    pub weapon: WeaponState,
    pub motion: MotionState,
    pub timers: DelayQueue<ActorTimer>,
    /// Last placement, used when no physics body tracks the actor.
    pub position: Vec3,
    /// Shot feedback window open on the shooter.
    pub hit_effect_active: bool,
    subscriptions: Vec<Subscription>,
}

impl Actor {
    pub fn new(owner: ParticipantId, config: &Config, position: Vec3) -> Self {
        Self {
            owner,
            health: HealthState::new(owner, config.combat.max_health),
            weapon: WeaponState::new(
                owner,
                WeaponProfile::from_config(&config.weapon),
                config.weapon.starting_reserve,
            ),
            motion: MotionState::default(),
            timers: DelayQueue::new(),
            position,
            hit_effect_active: false,
            subscriptions: Vec::new(),
        }
    }

    pub fn body(&self) -> BodyId {
        BodyId(self.owner.0)
    }

    /// Ties `subscription` to this actor's lifetime.
    pub fn watch(&mut self, subscription: Subscription) {
        self.subscriptions.push(subscription);
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Applies a replicated update that arrived from `from`.
    ///
    /// Health slots are accepted only from the authority, weapon slots only
    /// from the owner.
    pub fn apply_update(
        &mut self,
        from: ParticipantId,
        ctx: &SessionContext,
        update: &VariableUpdate,
    ) -> Result<ApplyOutcome, ArenaError> {
        let key = update.key;
        match key.slot {
            HEALTH_SLOT | DEAD_SLOT if from == ctx.authority() => {
                Ok(self.health.apply_update(update)?)
            }
            CLIP_SLOT | RESERVE_SLOT | RELOADING_SLOT if from == self.owner => {
                Ok(self.weapon.apply_update(update)?)
            }
            _ => Err(ArenaError::UnexpectedWriter { key, from }),
        }
    }

    /// Re-encodes every variable the local participant writes, for a peer
    /// that joined late.
    pub fn resync_updates(&self, ctx: &SessionContext) -> Result<Vec<VariableUpdate>, ArenaError> {
        let mut updates = Vec::new();
        if ctx.is_authority() {
            updates.extend(self.health.resync_updates()?);
        }
        if ctx.is_owner(self.owner) {
            updates.extend(self.weapon.resync_updates()?);
        }
        Ok(updates)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use skirmish_multiplayer::ReplicationOutbox;
    use skirmish_net::VarKey;

    use super::*;

    const HOST: ParticipantId = ParticipantId(1);
    const GUEST: ParticipantId = ParticipantId(2);

    fn host_ctx() -> SessionContext {
        let mut ctx = SessionContext::host(HOST);
        ctx.add_participant(GUEST);
        ctx
    }

    #[test]
    fn test_new_actor_is_full() {
        let actor = Actor::new(GUEST, &Config::default(), Vec3::ZERO);
        assert_eq!(actor.health.current(), 100.0);
        assert_eq!(actor.weapon.clip(), 30);
        assert_eq!(actor.weapon.reserve(), 90);
        assert_eq!(actor.body(), BodyId(2));
        assert!(actor.timers.is_empty());
    }

    #[test]
    fn test_health_updates_only_from_authority() {
        let host = host_ctx();
        let guest = SessionContext::observer(GUEST, HOST);
        let mut canonical = Actor::new(GUEST, &Config::default(), Vec3::ZERO);
        let mut mirror = Actor::new(GUEST, &Config::default(), Vec3::ZERO);
        let mut outbox = ReplicationOutbox::new();

        canonical.health.apply_damage(&host, 30.0, None, &mut outbox).unwrap();
        let update = outbox.drain().remove(0);

        assert!(matches!(
            mirror.apply_update(GUEST, &guest, &update),
            Err(ArenaError::UnexpectedWriter { .. })
        ));
        assert_eq!(mirror.health.current(), 100.0);
        assert_eq!(mirror.apply_update(HOST, &guest, &update).unwrap(), ApplyOutcome::Applied);
        assert_eq!(mirror.health.current(), 70.0);
    }

    #[test]
    fn test_weapon_updates_only_from_owner() {
        let guest = SessionContext::observer(GUEST, HOST);
        let host = host_ctx();
        let mut canonical = Actor::new(GUEST, &Config::default(), Vec3::ZERO);
        let mut mirror = Actor::new(GUEST, &Config::default(), Vec3::ZERO);
        let mut outbox = ReplicationOutbox::new();

        canonical.weapon.fire(&guest, 0.0, &mut outbox).unwrap();
        let update = outbox.drain().remove(0);

        assert!(mirror.apply_update(HOST, &host, &update).is_err());
        assert_eq!(mirror.apply_update(GUEST, &host, &update).unwrap(), ApplyOutcome::Applied);
        assert_eq!(mirror.weapon.clip(), 29);
    }

    #[test]
    fn test_unknown_slot_rejected() {
        let host = host_ctx();
        let mut actor = Actor::new(GUEST, &Config::default(), Vec3::ZERO);
        let update = VariableUpdate {
            key: VarKey::new(GUEST.0, 99),
            version: 1,
            payload: vec![0],
        };
        assert!(actor.apply_update(HOST, &host, &update).is_err());
    }

    #[test]
    fn test_resync_covers_written_vars_only() {
        let host = host_ctx();
        let guest_actor = Actor::new(GUEST, &Config::default(), Vec3::ZERO);
        let host_actor = Actor::new(HOST, &Config::default(), Vec3::ZERO);

        assert_eq!(guest_actor.resync_updates(&host).unwrap().len(), 2);
        assert_eq!(host_actor.resync_updates(&host).unwrap().len(), 5);

        let guest = SessionContext::observer(GUEST, HOST);
        assert_eq!(guest_actor.resync_updates(&guest).unwrap().len(), 3);
        assert!(host_actor.resync_updates(&guest).unwrap().is_empty());
    }

    #[test]
    fn test_dropping_actor_revokes_subscriptions() {
        let host = host_ctx();
        let calls = Arc::new(AtomicUsize::new(0));
        let mut actor = Actor::new(GUEST, &Config::default(), Vec3::ZERO);
        let counter = Arc::clone(&calls);
        let sub = actor.health.subscribe_health(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        actor.watch(sub);
        assert_eq!(actor.subscription_count(), 1);

        let mut outbox = ReplicationOutbox::new();
        actor.health.apply_damage(&host, 10.0, None, &mut outbox).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        drop(actor);
        assert_eq!(Arc::strong_count(&calls), 1);
    }
}
