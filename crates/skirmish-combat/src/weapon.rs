//! Weapon ammo, reload and rate-of-fire state machine.
//!
//! Ammo and the reloading flag are owner-only replicated variables: the
//! firing participant predicts locally and every other peer mirrors. Firing
//! is gated by a cooldown of `60 / rpm` seconds since the last accepted
//! attempt, dry fire included.

use skirmish_config::WeaponConfig;
use skirmish_multiplayer::{
    ApplyOutcome, ReplicatedVar, ReplicationError, ReplicationOutbox, SessionContext,
    WritePermission,
};
use skirmish_net::{ParticipantId, VarKey, VariableUpdate};

use crate::timers::{ActorTimer, DelayQueue, TimerId};

/// Variable slot carrying rounds in the clip.
pub const CLIP_SLOT: u16 = 2;
/// Variable slot carrying reserve rounds.
pub const RESERVE_SLOT: u16 = 3;
/// Variable slot carrying the reloading flag.
pub const RELOADING_SLOT: u16 = 4;

/// Slack on the cooldown boundary so a shot exactly one interval later is
/// not lost to float rounding of an accumulated clock.
const FIRE_TIME_EPSILON: f64 = 1e-9;

#[derive(Debug, thiserror::Error)]
pub enum WeaponError {
    #[error("already reloading")]
    AlreadyReloading,

    #[error("clip is already full")]
    ClipFull,

    #[error("no reserve ammo")]
    NoReserve,

    /// Only the owning participant drives its weapon.
    #[error("{0} does not own this weapon")]
    PermissionDenied(ParticipantId),

    #[error(transparent)]
    Replication(#[from] ReplicationError),
}

/// Static weapon parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct WeaponProfile {
    pub name: String,
    pub damage: f32,
    pub headshot_multiplier: f32,
    pub clip_size: u32,
    pub max_reserve: u32,
    pub reload_secs: f64,
    pub range: f32,
    pub accuracy: f32,
    /// Minimum seconds between accepted fire attempts.
    pub fire_interval_secs: f64,
    pub automatic: bool,
}

impl WeaponProfile {
    pub fn from_config(config: &WeaponConfig) -> Self {
        Self {
            name: config.name.clone(),
            damage: config.damage,
            headshot_multiplier: config.headshot_multiplier,
            clip_size: config.clip_size,
            max_reserve: config.max_reserve,
            reload_secs: config.reload_secs,
            range: config.range,
            accuracy: config.accuracy,
            fire_interval_secs: config.seconds_between_shots(),
            automatic: config.automatic,
        }
    }

    /// Damage dealt by one hit.
    pub fn hit_damage(&self, headshot: bool) -> f32 {
        if headshot {
            self.damage * self.headshot_multiplier
        } else {
            self.damage
        }
    }
}

/// Result of a single fire attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireOutcome {
    /// One round left the clip.
    Fired,
    /// Inside the rate-of-fire window; ignored.
    CoolingDown,
    /// A reload is in progress; ignored.
    Reloading,
    /// Empty clip; an audible click, throttled like a shot.
    DryFire,
}

/// Trigger state sampled once per tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TriggerInput {
    /// Trigger is down this tick.
    pub held: bool,
    /// Trigger went down this tick.
    pub pressed: bool,
}

/// What the trigger policy did this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// No shot requested.
    Idle,
    Fire(FireOutcome),
    /// Empty clip with reserve left: a reload started instead.
    ReloadStarted,
}

/// Weapon of one actor.
#[derive(Debug)]
pub struct WeaponState {
    profile: WeaponProfile,
    clip: ReplicatedVar<u32>,
    reserve: ReplicatedVar<u32>,
    reloading: ReplicatedVar<bool>,
    last_fire_at: Option<f64>,
    pending_reload: Option<TimerId>,
}

impl WeaponState {
    /// Full clip and `starting_reserve` rounds (capped at `max_reserve`).
    pub fn new(owner: ParticipantId, profile: WeaponProfile, starting_reserve: u32) -> Self {
        let entity = owner.0;
        let reserve = starting_reserve.min(profile.max_reserve);
        Self {
            clip: ReplicatedVar::new(
                VarKey::new(entity, CLIP_SLOT),
                profile.clip_size,
                WritePermission::OwnerOnly,
                owner,
            ),
            reserve: ReplicatedVar::new(
                VarKey::new(entity, RESERVE_SLOT),
                reserve,
                WritePermission::OwnerOnly,
                owner,
            ),
            reloading: ReplicatedVar::new(
                VarKey::new(entity, RELOADING_SLOT),
                false,
                WritePermission::OwnerOnly,
                owner,
            ),
            profile,
            last_fire_at: None,
            pending_reload: None,
        }
    }

    pub fn profile(&self) -> &WeaponProfile {
        &self.profile
    }

    pub fn clip(&self) -> u32 {
        *self.clip.get()
    }

    pub fn reserve(&self) -> u32 {
        *self.reserve.get()
    }

    pub fn is_reloading(&self) -> bool {
        *self.reloading.get()
    }

    pub fn can_fire(&self) -> bool {
        self.clip() > 0 && !self.is_reloading()
    }

    pub fn can_reload(&self) -> bool {
        !self.is_reloading() && self.clip() < self.profile.clip_size && self.reserve() > 0
    }

    fn ensure_owner(&self, ctx: &SessionContext) -> Result<(), WeaponError> {
        if ctx.is_owner(self.clip.owner()) {
            Ok(())
        } else {
            Err(WeaponError::PermissionDenied(ctx.local()))
        }
    }

    /// One fire attempt at time `now`.
    pub fn fire(
        &mut self,
        ctx: &SessionContext,
        now: f64,
        outbox: &mut ReplicationOutbox,
    ) -> Result<FireOutcome, WeaponError> {
        self.ensure_owner(ctx)?;

        if let Some(last) = self.last_fire_at
            && now + FIRE_TIME_EPSILON < last + self.profile.fire_interval_secs
        {
            return Ok(FireOutcome::CoolingDown);
        }
        if self.is_reloading() {
            return Ok(FireOutcome::Reloading);
        }

        self.last_fire_at = Some(now);
        let clip = self.clip();
        if clip == 0 {
            return Ok(FireOutcome::DryFire);
        }

        outbox.push(self.clip.set(ctx, clip - 1)?);
        Ok(FireOutcome::Fired)
    }

    /// Starts a reload and schedules its completion on `timers`.
    pub fn start_reload(
        &mut self,
        ctx: &SessionContext,
        now: f64,
        timers: &mut DelayQueue<ActorTimer>,
        outbox: &mut ReplicationOutbox,
    ) -> Result<TimerId, WeaponError> {
        self.ensure_owner(ctx)?;

        if self.is_reloading() {
            return Err(WeaponError::AlreadyReloading);
        }
        if self.clip() >= self.profile.clip_size {
            return Err(WeaponError::ClipFull);
        }
        if self.reserve() == 0 {
            return Err(WeaponError::NoReserve);
        }

        outbox.push(self.reloading.set(ctx, true)?);
        let id = timers.schedule(now + self.profile.reload_secs, ActorTimer::CompleteReload);
        self.pending_reload = Some(id);
        Ok(id)
    }

    /// Moves rounds from reserve into the clip and clears `reloading`.
    /// Returns `false` without touching anything when no reload is running.
    pub fn complete_reload(
        &mut self,
        ctx: &SessionContext,
        outbox: &mut ReplicationOutbox,
    ) -> Result<bool, WeaponError> {
        self.ensure_owner(ctx)?;
        if !self.is_reloading() {
            return Ok(false);
        }

        let clip = self.clip();
        let reserve = self.reserve();
        let moved = self.profile.clip_size.saturating_sub(clip).min(reserve);
        if moved > 0 {
            outbox.push(self.clip.set(ctx, clip + moved)?);
            outbox.push(self.reserve.set(ctx, reserve - moved)?);
        }
        outbox.push(self.reloading.set(ctx, false)?);
        self.pending_reload = None;
        Ok(true)
    }

    /// Trigger policy: automatic weapons request a shot every tick the
    /// trigger is held, others only on the press edge. A requested shot with
    /// an empty clip starts a reload when one is possible.
    pub fn pull_trigger(
        &mut self,
        ctx: &SessionContext,
        input: TriggerInput,
        now: f64,
        timers: &mut DelayQueue<ActorTimer>,
        outbox: &mut ReplicationOutbox,
    ) -> Result<TriggerOutcome, WeaponError> {
        let requested = if self.profile.automatic {
            input.held
        } else {
            input.pressed
        };
        if !requested {
            return Ok(TriggerOutcome::Idle);
        }

        if self.clip() == 0 && self.can_reload() {
            self.start_reload(ctx, now, timers, outbox)?;
            return Ok(TriggerOutcome::ReloadStarted);
        }
        Ok(TriggerOutcome::Fire(self.fire(ctx, now, outbox)?))
    }

    /// Timer scheduled by the reload in progress, if any.
    pub fn pending_reload(&self) -> Option<TimerId> {
        self.pending_reload
    }

    /// Applies an update written by the owner.
    pub fn apply_update(&mut self, update: &VariableUpdate) -> Result<ApplyOutcome, ReplicationError> {
        match update.key.slot {
            CLIP_SLOT => self.clip.apply_update(update),
            RESERVE_SLOT => self.reserve.apply_update(update),
            _ => self.reloading.apply_update(update),
        }
    }

    pub fn resync_updates(&self) -> Result<Vec<VariableUpdate>, ReplicationError> {
        Ok(vec![
            self.clip.resync_update()?,
            self.reserve.resync_update()?,
            self.reloading.resync_update()?,
        ])
    }
}
