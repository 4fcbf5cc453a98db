//! Command-line argument parsing for Skirmish binaries.

use std::path::PathBuf;

use clap::Args;

use crate::Config;

/// Config-overriding command-line arguments.
///
/// Flatten into a binary's own parser with `#[command(flatten)]`. CLI values
/// override settings loaded from `config.ron`.
#[derive(Args, Debug, Clone, Default)]
pub struct CliArgs {
    /// Simulation tick rate in Hz.
    #[arg(long)]
    pub tick_rate: Option<u32>,

    /// Seconds between death and respawn.
    #[arg(long)]
    pub respawn_delay: Option<f64>,

    /// Maximum health for every actor.
    #[arg(long)]
    pub max_health: Option<f32>,

    /// Seed for spawn sampling.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(rate) = args.tick_rate {
            self.session.tick_rate = rate.max(1);
        }
        if let Some(delay) = args.respawn_delay {
            self.session.respawn_delay_secs = delay.max(0.0);
        }
        if let Some(health) = args.max_health {
            self.combat.max_health = health;
        }
        if let Some(seed) = args.seed {
            self.session.rng_seed = seed;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_override() {
        let mut config = Config::default();
        let args = CliArgs {
            tick_rate: Some(30),
            max_health: Some(200.0),
            log_level: Some("debug".to_string()),
            ..CliArgs::default()
        };
        config.apply_cli_overrides(&args);
        assert_eq!(config.session.tick_rate, 30);
        assert_eq!(config.combat.max_health, 200.0);
        assert_eq!(config.debug.log_level, "debug");
        // Non-overridden fields retain defaults
        assert_eq!(config.session.respawn_delay_secs, 3.0);
        assert_eq!(config.session.rng_seed, 42);
    }

    #[test]
    fn test_cli_no_override() {
        let original = Config::default();
        let mut config = Config::default();
        config.apply_cli_overrides(&CliArgs::default());
        assert_eq!(config, original);
    }

    #[test]
    fn test_zero_tick_rate_clamped() {
        let mut config = Config::default();
        config.apply_cli_overrides(&CliArgs {
            tick_rate: Some(0),
            ..CliArgs::default()
        });
        assert_eq!(config.session.tick_rate, 1);
    }
}
