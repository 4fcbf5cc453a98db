//! Authoritative combat simulation core.
//!
//! Health, weapons, spawn placement and the per-participant [`Arena`] that
//! ties them to the replication layer, the physics collaborators and a
//! presentation sink.

pub mod actor;
pub mod arena;
pub mod health;
pub mod messages;
pub mod presentation;
pub mod spawn;
pub mod timers;
pub mod weapon;

pub use actor::Actor;
pub use arena::{Arena, ArenaError, ArenaStats, UNKNOWN_KILLER};
pub use health::{CombatError, DEAD_SLOT, DamageOutcome, HEALTH_SLOT, HealthState, LifeState};
pub use messages::GameRpc;
pub use presentation::{
    ActorSnapshot, PresentationEvent, PresentationSink, RecordingSink, TracingSink,
};
pub use spawn::{SpawnPlacer, SpawnResolution, SpawnSource};
pub use timers::{ActorTimer, DelayQueue, TimerId};
pub use weapon::{
    CLIP_SLOT, FireOutcome, RELOADING_SLOT, RESERVE_SLOT, TriggerInput, TriggerOutcome,
    WeaponError, WeaponProfile, WeaponState,
};
