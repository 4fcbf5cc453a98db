//! Configuration structs with sensible defaults and RON persistence.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level simulation configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Tick rate, timers and RNG seeding.
    pub session: SessionConfig,
    /// Health settings.
    pub combat: CombatConfig,
    /// Weapon profile handed to every actor at spawn.
    pub weapon: WeaponConfig,
    /// Owner-side movement tuning.
    pub movement: MovementConfig,
    /// Ground probe geometry.
    pub grounding: GroundingConfig,
    /// Spawn and respawn placement.
    pub spawn: SpawnConfig,
    /// Transport settings.
    pub network: NetworkConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Session timing configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Fixed simulation rate in Hz.
    pub tick_rate: u32,
    /// Seconds between death and respawn.
    pub respawn_delay_secs: f64,
    /// Lifetime of the local hit-feedback flag in seconds.
    pub hit_effect_secs: f64,
    /// Seed for spawn sampling.
    pub rng_seed: u64,
}

/// Health configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CombatConfig {
    /// Health every actor starts and respawns with.
    pub max_health: f32,
}

/// Static weapon profile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WeaponConfig {
    /// Display name.
    pub name: String,
    /// Damage per hit.
    pub damage: f32,
    /// Multiplier applied to reported headshots.
    pub headshot_multiplier: f32,
    /// Rounds per clip.
    pub clip_size: u32,
    /// Upper bound of the reserve pool.
    pub max_reserve: u32,
    /// Reserve rounds handed out at spawn (clamped to `max_reserve`).
    pub starting_reserve: u32,
    /// Reload duration in seconds.
    pub reload_secs: f64,
    /// Maximum hit distance in meters.
    pub range: f32,
    /// Hit probability used by scripted shooters (0.0 - 1.0).
    pub accuracy: f32,
    /// Rate of fire in rounds per minute.
    pub fire_rate_rpm: f32,
    /// Fire continuously while the trigger is held.
    pub automatic: bool,
}

/// How a jump moves the body.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum JumpStyle {
    /// Set vertical velocity to `jump_impulse`.
    Impulse,
    /// Shift the body up by `jump_nudge` meters.
    Nudge,
}

/// Owner-side movement configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MovementConfig {
    /// Walk speed in m/s.
    pub speed: f32,
    /// Multiplier applied to look input.
    pub look_sensitivity: f32,
    /// Velocity blend rate; the per-step lerp factor is `dt * velocity_smoothing`.
    pub velocity_smoothing: f32,
    /// Minimum seconds between jumps.
    pub jump_cooldown_secs: f64,
    /// Upward velocity for [`JumpStyle::Impulse`].
    pub jump_impulse: f32,
    /// Upward displacement for [`JumpStyle::Nudge`].
    pub jump_nudge: f32,
    /// Jump behaviour.
    pub jump_style: JumpStyle,
}

/// Ground probe geometry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GroundingConfig {
    /// Length of each downward ray probe.
    pub probe_distance: f32,
    /// Horizontal offset of the four side probes.
    pub lateral_offset: f32,
    /// Radius of the wide sweep probe.
    pub sweep_radius: f32,
    /// The sweep starts this far above the lower extent.
    pub sweep_lift: f32,
}

/// Spawn placement configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SpawnConfig {
    /// Fixed spawn points as `[x, y, z]`.
    pub points: Vec<[f32; 3]>,
    /// Height above ground at which actors are placed.
    pub spawn_height: f32,
    /// Radius of the random sampling disc around the origin.
    pub random_radius: f32,
    /// Number of random samples before falling back.
    pub random_attempts: u32,
    /// No other actor may be closer than this to a spawn point.
    pub clearance_radius: f32,
    /// Extra depth below `spawn_height` searched when checking for ground.
    pub ground_check_extra: f32,
    /// Random samples are cast from `spawn_height + sample_lift`.
    pub sample_lift: f32,
    /// Random sample rays travel `spawn_height + sample_depth_extra`.
    pub sample_depth_extra: f32,
    /// Elevation of the deterministic fallback position.
    pub fallback_height: f32,
    /// Spacing between fallback positions of consecutive participant ids.
    pub fallback_spacing: f32,
}

/// Transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetworkConfig {
    /// Maximum number of participants in one session.
    pub max_participants: u32,
    /// Deliver every loopback packet twice (at-least-once testing).
    pub duplicate_delivery: bool,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
}

// --- Default implementations ---

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60,
            respawn_delay_secs: 3.0,
            hit_effect_secs: 0.1,
            rng_seed: 42,
        }
    }
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self { max_health: 100.0 }
    }
}

impl Default for WeaponConfig {
    fn default() -> Self {
        Self {
            name: "Assault Rifle".to_string(),
            damage: 25.0,
            headshot_multiplier: 2.0,
            clip_size: 30,
            max_reserve: 90,
            starting_reserve: 90,
            reload_secs: 2.5,
            range: 100.0,
            accuracy: 0.95,
            fire_rate_rpm: 600.0,
            automatic: true,
        }
    }
}

impl WeaponConfig {
    /// Seconds between two accepted shots (`60 / fire_rate_rpm`).
    pub fn seconds_between_shots(&self) -> f64 {
        if self.fire_rate_rpm <= 0.0 {
            return f64::INFINITY;
        }
        60.0 / self.fire_rate_rpm as f64
    }
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            speed: 5.0,
            look_sensitivity: 1.0,
            velocity_smoothing: 10.0,
            jump_cooldown_secs: 0.5,
            jump_impulse: 7.0,
            jump_nudge: 0.5,
            jump_style: JumpStyle::Nudge,
        }
    }
}

impl Default for GroundingConfig {
    fn default() -> Self {
        Self {
            probe_distance: 1.2,
            lateral_offset: 0.3,
            sweep_radius: 0.5,
            sweep_lift: 0.1,
        }
    }
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            points: Vec::new(),
            spawn_height: 2.0,
            random_radius: 15.0,
            random_attempts: 20,
            clearance_radius: 3.0,
            ground_check_extra: 2.0,
            sample_lift: 10.0,
            sample_depth_extra: 15.0,
            fallback_height: 5.0,
            fallback_spacing: 4.0,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            max_participants: 16,
            duplicate_delivery: false,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

// --- Validation ---

fn invalid(field: &'static str, reason: &'static str) -> ConfigError {
    ConfigError::Invalid { field, reason }
}

impl Config {
    /// Rejects settings the simulation cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session.tick_rate == 0 {
            return Err(invalid("session.tick_rate", "must be at least 1"));
        }
        if self.session.respawn_delay_secs.is_nan() || self.session.respawn_delay_secs < 0.0 {
            return Err(invalid("session.respawn_delay_secs", "must be non-negative"));
        }
        if !(self.combat.max_health.is_finite() && self.combat.max_health > 0.0) {
            return Err(invalid("combat.max_health", "must be positive and finite"));
        }

        let weapon = &self.weapon;
        if !(weapon.damage.is_finite() && weapon.damage >= 0.0) {
            return Err(invalid("weapon.damage", "must be non-negative and finite"));
        }
        if !(weapon.headshot_multiplier.is_finite() && weapon.headshot_multiplier >= 0.0) {
            return Err(invalid("weapon.headshot_multiplier", "must be non-negative and finite"));
        }
        if weapon.clip_size == 0 {
            return Err(invalid("weapon.clip_size", "must be at least 1"));
        }
        if weapon.starting_reserve > weapon.max_reserve {
            return Err(invalid("weapon.starting_reserve", "exceeds weapon.max_reserve"));
        }
        if weapon.reload_secs.is_nan() || weapon.reload_secs < 0.0 {
            return Err(invalid("weapon.reload_secs", "must be non-negative"));
        }
        if weapon.fire_rate_rpm.is_nan() || weapon.fire_rate_rpm < 0.0 {
            return Err(invalid("weapon.fire_rate_rpm", "must be non-negative"));
        }

        if self.spawn.clearance_radius < 0.0 || self.spawn.random_radius < 0.0 {
            return Err(invalid("spawn", "radii must be non-negative"));
        }
        if self.network.max_participants == 0 {
            return Err(invalid("network.max_participants", "must be at least 1"));
        }
        Ok(())
    }
}

// --- Load / Save / Reload ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join("config.ron");

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            config.validate()?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join("config.ron");
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }
}
