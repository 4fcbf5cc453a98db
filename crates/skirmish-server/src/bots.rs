//! Scripted participants that exercise the full session without a player.
//!
//! Each bot drives one [`Arena`]. It circles and jumps now and then while
//! holding the trigger, and reports a hit on a random living opponent with a
//! seeded probability whenever a shot leaves the barrel.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use skirmish_combat::{Arena, FireOutcome, TriggerInput, TriggerOutcome};
use skirmish_net::ParticipantId;
use skirmish_physics::MovementInput;
use tracing::{debug, warn};

/// Chance per step of requesting a jump.
const JUMP_CHANCE: f32 = 0.02;
/// Chance per step of releasing and re-pressing the trigger.
const PRESS_CHANCE: f32 = 0.15;
/// Fraction of reported hits that count as headshots.
const HEADSHOT_CHANCE: f32 = 0.1;

/// Tunables for a scripted participant.
#[derive(Debug, Clone, Copy)]
pub struct BotProfile {
    /// Probability that a fired shot is reported as a hit.
    pub hit_chance: f32,
    /// Yaw input applied every step.
    pub turn_rate: f32,
}

impl Default for BotProfile {
    fn default() -> Self {
        Self {
            hit_chance: 0.25,
            turn_rate: 0.02,
        }
    }
}

pub struct Bot {
    arena: Arena,
    profile: BotProfile,
    rng: ChaCha8Rng,
    phase: f32,
}

impl Bot {
    pub fn new(arena: Arena, profile: BotProfile, seed: u64) -> Self {
        let local = arena.local_id().0;
        Self {
            arena,
            profile,
            rng: ChaCha8Rng::seed_from_u64(seed ^ local.rotate_left(17)),
            phase: 0.0,
        }
    }

    pub fn id(&self) -> ParticipantId {
        self.arena.local_id()
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    /// Runs one scripted step followed by the arena tick.
    pub fn step(&mut self, dt: f64) {
        let alive = self
            .arena
            .actor(self.id())
            .is_some_and(|actor| !actor.health.is_dead());

        if alive {
            self.handle_weapon();
        }

        let input = self.movement(dt as f32);
        self.arena.tick(dt, &input);
    }

    fn movement(&mut self, dt: f32) -> MovementInput {
        self.phase += dt;
        MovementInput {
            strafe: self.phase.sin(),
            forward: 1.0,
            yaw: self.profile.turn_rate,
            pitch: 0.0,
            jump: self.rng.random::<f32>() < JUMP_CHANCE,
        }
    }

    fn handle_weapon(&mut self) {
        let trigger = TriggerInput {
            held: true,
            pressed: self.rng.random::<f32>() < PRESS_CHANCE,
        };
        match self.arena.fire(trigger) {
            Ok(TriggerOutcome::Fire(FireOutcome::Fired)) => self.maybe_report_hit(),
            Ok(TriggerOutcome::Fire(FireOutcome::DryFire)) => {
                debug!(bot = %self.id(), "out of ammunition");
            }
            Ok(_) => {}
            Err(err) => warn!(bot = %self.id(), "fire failed: {err}"),
        }
    }

    fn maybe_report_hit(&mut self) {
        if self.rng.random::<f32>() >= self.profile.hit_chance {
            return;
        }
        let Some(target) = self.pick_target() else {
            return;
        };
        let headshot = self.rng.random::<f32>() < HEADSHOT_CHANCE;
        match self.arena.report_hit(target, headshot) {
            Ok(damage) => debug!(bot = %self.id(), %target, damage, headshot, "hit reported"),
            Err(err) => warn!(bot = %self.id(), %target, "hit report failed: {err}"),
        }
    }

    /// A random opponent that this bot's view shows alive.
    fn pick_target(&mut self) -> Option<ParticipantId> {
        let me = self.id();
        let living: Vec<ParticipantId> = self
            .arena
            .actor_ids()
            .into_iter()
            .filter(|id| *id != me)
            .filter(|id| {
                self.arena
                    .actor(*id)
                    .is_some_and(|actor| !actor.health.is_dead())
            })
            .collect();
        if living.is_empty() {
            return None;
        }
        let index = self.rng.random_range(0..living.len());
        Some(living[index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skirmish_config::{Config, SpawnConfig};
    use skirmish_multiplayer::SessionContext;

    const DT: f64 = 1.0 / 60.0;

    fn config() -> Config {
        Config {
            spawn: SpawnConfig {
                points: vec![[0.0, 2.0, 0.0], [10.0, 2.0, 0.0]],
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn solo_bot(profile: BotProfile) -> Bot {
        let mut arena = Arena::new(config(), SessionContext::host(ParticipantId(1)));
        arena.participant_joined(ParticipantId(2));
        Bot::new(arena, profile, 7)
    }

    #[test]
    fn test_bot_fires_and_reloads_on_its_own() {
        let mut bot = solo_bot(BotProfile {
            hit_chance: 0.0,
            ..Default::default()
        });
        for _ in 0..60 * 20 {
            bot.step(DT);
        }
        let arena = bot.arena();
        let weapon = &arena.actor(bot.id()).unwrap().weapon;
        assert!(arena.stats().shots_fired > 30, "emptied at least one clip");
        assert!(weapon.reserve() < 90, "reloaded from reserve");
        assert_eq!(arena.stats().hits_reported, 0);
    }

    #[test]
    fn test_sure_shot_bot_eliminates_opponent() {
        let mut bot = solo_bot(BotProfile {
            hit_chance: 1.0,
            ..Default::default()
        });
        for _ in 0..60 * 2 {
            bot.step(DT);
        }
        let arena = bot.arena();
        assert!(arena.stats().hits_reported >= 4);
        assert!(arena.stats().kills >= 1);
    }

    #[test]
    fn test_same_seed_same_script() {
        let run = || {
            let mut bot = solo_bot(BotProfile::default());
            for _ in 0..300 {
                bot.step(DT);
            }
            (bot.arena().stats(), bot.arena().actor(ParticipantId(2)).unwrap().health.current())
        };
        assert_eq!(run(), run());
    }
}
