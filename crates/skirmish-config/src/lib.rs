//! Configuration system for the Skirmish simulation core.
//!
//! Provides tunable session, combat, weapon, movement and spawn settings that
//! persist to disk as RON files. Supports CLI overrides via clap, validation
//! of loaded settings, and forward/backward compatible serialization.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    CombatConfig, Config, DebugConfig, GroundingConfig, JumpStyle, MovementConfig, NetworkConfig,
    SessionConfig, SpawnConfig, WeaponConfig,
};
pub use error::ConfigError;
