//! Health and the Alive/Dead state machine.
//!
//! Canonical health lives on the authority in two authority-only replicated
//! variables: the current value and the dead flag. Observers only ever apply
//! updates. `dead` is true exactly when the current value is zero, until a
//! respawn restores both.

use skirmish_multiplayer::{
    ApplyOutcome, ReplicatedVar, ReplicationError, ReplicationOutbox, SessionContext,
    Subscription, WritePermission,
};
use skirmish_net::{ParticipantId, VarKey, VariableUpdate};

/// Variable slot carrying current health.
pub const HEALTH_SLOT: u16 = 0;
/// Variable slot carrying the dead flag.
pub const DEAD_SLOT: u16 = 1;

#[derive(Debug, thiserror::Error)]
pub enum CombatError {
    /// Only the authority may mutate canonical health.
    #[error("{0} is not the authority")]
    PermissionDenied(ParticipantId),

    /// Damage must be finite and non-negative.
    #[error("invalid damage amount {0}")]
    InvalidArgument(f32),

    #[error(transparent)]
    Replication(#[from] ReplicationError),
}

/// Observable combat state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifeState {
    Alive,
    Dead,
}

/// Result of [`HealthState::apply_damage`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DamageOutcome {
    /// The actor was already dead.
    Ignored,
    /// Health dropped but stayed above zero.
    Wounded { remaining: f32 },
    /// Health reached zero on this hit.
    Killed,
}

/// Health of one actor.
#[derive(Debug)]
pub struct HealthState {
    max: f32,
    current: ReplicatedVar<f32>,
    dead: ReplicatedVar<bool>,
    last_attacker: Option<ParticipantId>,
}

impl HealthState {
    /// Full health for the actor owned by `owner`.
    pub fn new(owner: ParticipantId, max: f32) -> Self {
        let max = max.max(0.0);
        Self {
            max,
            current: ReplicatedVar::new(
                VarKey::new(owner.0, HEALTH_SLOT),
                max,
                WritePermission::AuthorityOnly,
                owner,
            ),
            dead: ReplicatedVar::new(
                VarKey::new(owner.0, DEAD_SLOT),
                false,
                WritePermission::AuthorityOnly,
                owner,
            ),
            last_attacker: None,
        }
    }

    pub fn current(&self) -> f32 {
        *self.current.get()
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    pub fn is_dead(&self) -> bool {
        *self.dead.get()
    }

    pub fn state(&self) -> LifeState {
        if self.is_dead() {
            LifeState::Dead
        } else {
            LifeState::Alive
        }
    }

    /// `current / max`, or zero for a zero-max actor.
    pub fn fraction(&self) -> f32 {
        if self.max > 0.0 {
            self.current() / self.max
        } else {
            0.0
        }
    }

    /// Attacker recorded by the most recent kill.
    pub fn last_attacker(&self) -> Option<ParticipantId> {
        self.last_attacker
    }

    /// Applies damage on the authority.
    ///
    /// Negative or non-finite amounts are rejected, a dead actor ignores the
    /// hit, and health never drops below zero. Replication updates are queued
    /// on `outbox`.
    pub fn apply_damage(
        &mut self,
        ctx: &SessionContext,
        amount: f32,
        attacker: Option<ParticipantId>,
        outbox: &mut ReplicationOutbox,
    ) -> Result<DamageOutcome, CombatError> {
        if !ctx.is_authority() {
            return Err(CombatError::PermissionDenied(ctx.local()));
        }
        if !amount.is_finite() || amount < 0.0 {
            return Err(CombatError::InvalidArgument(amount));
        }
        if self.is_dead() {
            return Ok(DamageOutcome::Ignored);
        }

        let remaining = (self.current() - amount).max(0.0);
        outbox.push(self.current.set(ctx, remaining)?);

        if remaining > 0.0 {
            return Ok(DamageOutcome::Wounded { remaining });
        }

        outbox.push(self.dead.set(ctx, true)?);
        self.last_attacker = attacker;
        Ok(DamageOutcome::Killed)
    }

    /// Restores full health and clears the dead flag on the authority.
    pub fn respawn(
        &mut self,
        ctx: &SessionContext,
        outbox: &mut ReplicationOutbox,
    ) -> Result<(), CombatError> {
        if !ctx.is_authority() {
            return Err(CombatError::PermissionDenied(ctx.local()));
        }
        outbox.push(self.current.set(ctx, self.max)?);
        outbox.push(self.dead.set(ctx, false)?);
        Ok(())
    }

    /// Applies a health or dead-flag update from the authority.
    pub fn apply_update(&mut self, update: &VariableUpdate) -> Result<ApplyOutcome, ReplicationError> {
        match update.key.slot {
            HEALTH_SLOT => self.current.apply_update(update),
            _ => self.dead.apply_update(update),
        }
    }

    /// Current values re-encoded at their present versions, for late joiners.
    pub fn resync_updates(&self) -> Result<Vec<VariableUpdate>, ReplicationError> {
        Ok(vec![self.current.resync_update()?, self.dead.resync_update()?])
    }

    pub fn subscribe_health<F>(&self, callback: F) -> Subscription
    where
        F: FnMut(&f32, &f32) + Send + 'static,
    {
        self.current.subscribe(callback)
    }

    pub fn subscribe_dead<F>(&self, callback: F) -> Subscription
    where
        F: FnMut(&bool, &bool) + Send + 'static,
    {
        self.dead.subscribe(callback)
    }
}
