//! Spawn placement.
//!
//! Resolution order: configured fixed points (starting at the participant's
//! join index and cycling), then random samples inside a disc projected onto
//! the ground, then a deterministic fallback row. Random sampling uses a
//! seeded ChaCha RNG so a match replays identically.

use std::f32::consts::TAU;

use glam::Vec3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use skirmish_config::SpawnConfig;
use skirmish_net::ParticipantId;
use skirmish_physics::SpatialQuery;
use tracing::{debug, trace};

/// Which stage of the resolution order produced a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnSource {
    /// Index into the configured fixed points.
    FixedPoint(usize),
    /// Random sample accepted on the given zero-based attempt.
    RandomSample { attempt: u32 },
    /// Nothing safe was found.
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnResolution {
    pub position: Vec3,
    pub source: SpawnSource,
}

/// Resolves spawn positions for actors.
pub struct SpawnPlacer {
    config: SpawnConfig,
    rng: ChaCha8Rng,
}

impl SpawnPlacer {
    pub fn new(config: SpawnConfig, seed: u64) -> Self {
        Self {
            config,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn config(&self) -> &SpawnConfig {
        &self.config
    }

    /// Picks a position for the actor of `id`, whose join index is
    /// `participant_index`. `occupied` holds the positions of every other
    /// live actor.
    ///
    /// Without a spatial query fixed points are judged on clearance alone
    /// and random sampling is skipped.
    pub fn resolve(
        &mut self,
        participant_index: usize,
        id: ParticipantId,
        spatial: Option<&dyn SpatialQuery>,
        occupied: &[Vec3],
    ) -> SpawnResolution {
        let points = &self.config.points;
        if !points.is_empty() {
            let start = participant_index % points.len();
            for offset in 0..points.len() {
                let index = (start + offset) % points.len();
                let candidate = Vec3::from_array(points[index]);
                if self.is_safe(candidate, spatial, occupied) {
                    debug!(%id, index, "spawn at fixed point");
                    return SpawnResolution {
                        position: candidate,
                        source: SpawnSource::FixedPoint(index),
                    };
                }
            }
        }

        if let Some(query) = spatial {
            for attempt in 0..self.config.random_attempts {
                let Some(candidate) = self.sample(query) else {
                    continue;
                };
                if self.is_safe(candidate, spatial, occupied) {
                    debug!(%id, attempt, "spawn at random sample");
                    return SpawnResolution {
                        position: candidate,
                        source: SpawnSource::RandomSample { attempt },
                    };
                }
            }
        }

        let position = self.fallback(id);
        debug!(%id, ?position, "spawn at fallback");
        SpawnResolution {
            position,
            source: SpawnSource::Fallback,
        }
    }

    /// `(id * fallback_spacing, fallback_height, 0)`.
    pub fn fallback(&self, id: ParticipantId) -> Vec3 {
        Vec3::new(
            id.0 as f32 * self.config.fallback_spacing,
            self.config.fallback_height,
            0.0,
        )
    }

    /// Uniform point in the disc, dropped onto the ground and raised by
    /// `spawn_height`. `None` when the drop ray misses.
    fn sample(&mut self, query: &dyn SpatialQuery) -> Option<Vec3> {
        let cfg = &self.config;
        let u: f32 = self.rng.random();
        let v: f32 = self.rng.random();
        let r = cfg.random_radius * u.sqrt();
        let theta = TAU * v;

        let origin = Vec3::new(
            r * theta.cos(),
            cfg.spawn_height + cfg.sample_lift,
            r * theta.sin(),
        );
        let hit = query.raycast(
            origin,
            Vec3::NEG_Y,
            cfg.spawn_height + cfg.sample_depth_extra,
            None,
        );
        trace!(?origin, hit = hit.is_some(), "spawn sample");
        hit.map(|hit| hit.point + Vec3::Y * cfg.spawn_height)
    }

    fn is_safe(&self, candidate: Vec3, spatial: Option<&dyn SpatialQuery>, occupied: &[Vec3]) -> bool {
        let clear = occupied
            .iter()
            .all(|other| other.distance(candidate) >= self.config.clearance_radius);
        if !clear {
            return false;
        }
        match spatial {
            Some(query) => query
                .raycast(
                    candidate,
                    Vec3::NEG_Y,
                    self.config.spawn_height + self.config.ground_check_extra,
                    None,
                )
                .is_some(),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use skirmish_physics::{BodyId, ProbeHit};

    use super::*;

    /// Flat ground at `y = 0` limited to `|x|, |z| <= half_size`.
    struct FlatGround {
        half_size: f32,
    }

    impl SpatialQuery for FlatGround {
        fn raycast(
            &self,
            origin: Vec3,
            direction: Vec3,
            max_distance: f32,
            _exclude: Option<BodyId>,
        ) -> Option<ProbeHit> {
            if direction.y >= 0.0 || origin.y < 0.0 {
                return None;
            }
            if origin.x.abs() > self.half_size || origin.z.abs() > self.half_size {
                return None;
            }
            let distance = origin.y / -direction.y;
            (distance <= max_distance).then(|| ProbeHit {
                point: Vec3::new(origin.x, 0.0, origin.z),
                distance,
            })
        }

        fn sphere_sweep(
            &self,
            origin: Vec3,
            _radius: f32,
            direction: Vec3,
            max_distance: f32,
            exclude: Option<BodyId>,
        ) -> Option<ProbeHit> {
            self.raycast(origin, direction, max_distance, exclude)
        }
    }

    fn config_with_points(points: Vec<[f32; 3]>) -> SpawnConfig {
        SpawnConfig {
            points,
            ..Default::default()
        }
    }

    #[test]
    fn test_fixed_point_starts_at_join_index() {
        let points = vec![[0.0, 2.0, 0.0], [10.0, 2.0, 0.0], [20.0, 2.0, 0.0]];
        let mut placer = SpawnPlacer::new(config_with_points(points), 1);
        let ground = FlatGround { half_size: 100.0 };

        let res = placer.resolve(4, ParticipantId(5), Some(&ground), &[]);
        assert_eq!(res.source, SpawnSource::FixedPoint(1));
        assert_eq!(res.position, Vec3::new(10.0, 2.0, 0.0));
    }

    #[test]
    fn test_occupied_point_cycles_to_next() {
        let points = vec![[0.0, 2.0, 0.0], [10.0, 2.0, 0.0]];
        let mut placer = SpawnPlacer::new(config_with_points(points), 1);
        let ground = FlatGround { half_size: 100.0 };

        let occupied = [Vec3::new(0.5, 2.0, 0.0)];
        let res = placer.resolve(0, ParticipantId(1), Some(&ground), &occupied);
        assert_eq!(res.source, SpawnSource::FixedPoint(1));
    }

    #[test]
    fn test_point_over_void_is_rejected() {
        let points = vec![[500.0, 2.0, 0.0]];
        let mut placer = SpawnPlacer::new(config_with_points(points), 7);
        let ground = FlatGround { half_size: 50.0 };

        let res = placer.resolve(0, ParticipantId(1), Some(&ground), &[]);
        assert!(matches!(res.source, SpawnSource::RandomSample { .. }));
        assert!((res.position.y - 2.0).abs() < 1e-5);
        let horizontal = Vec3::new(res.position.x, 0.0, res.position.z).length();
        assert!(horizontal <= 15.0 + 1e-4);
    }

    #[test]
    fn test_random_sampling_is_seeded() {
        let ground = FlatGround { half_size: 100.0 };
        let mut a = SpawnPlacer::new(SpawnConfig::default(), 99);
        let mut b = SpawnPlacer::new(SpawnConfig::default(), 99);

        for id in 1..5 {
            let ra = a.resolve(0, ParticipantId(id), Some(&ground), &[]);
            let rb = b.resolve(0, ParticipantId(id), Some(&ground), &[]);
            assert_eq!(ra, rb);
        }
    }

    #[test]
    fn test_no_ground_falls_back() {
        let ground = FlatGround { half_size: 0.0 };
        let mut placer = SpawnPlacer::new(SpawnConfig::default(), 3);

        let res = placer.resolve(0, ParticipantId(3), Some(&ground), &[]);
        assert_eq!(res.source, SpawnSource::Fallback);
        assert_eq!(res.position, Vec3::new(12.0, 5.0, 0.0));
    }

    #[test]
    fn test_without_spatial_query_uses_clearance_only() {
        let points = vec![[0.0, 2.0, 0.0]];
        let mut placer = SpawnPlacer::new(config_with_points(points), 3);

        let res = placer.resolve(0, ParticipantId(2), None, &[]);
        assert_eq!(res.source, SpawnSource::FixedPoint(0));

        let blocked = placer.resolve(0, ParticipantId(2), None, &[Vec3::new(0.0, 2.0, 1.0)]);
        assert_eq!(blocked.source, SpawnSource::Fallback);
        assert_eq!(blocked.position, Vec3::new(8.0, 5.0, 0.0));
    }

    #[test]
    fn test_random_candidate_respects_clearance() {
        let ground = FlatGround { half_size: 100.0 };
        let mut placer = SpawnPlacer::new(SpawnConfig::default(), 11);
        let occupied = [Vec3::new(0.0, 2.0, 0.0), Vec3::new(5.0, 2.0, 5.0)];

        let res = placer.resolve(0, ParticipantId(1), Some(&ground), &occupied);
        for other in occupied {
            assert!(res.position.distance(other) >= 3.0 || res.source == SpawnSource::Fallback);
        }
    }
}
