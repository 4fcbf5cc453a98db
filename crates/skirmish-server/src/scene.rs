//! Static arena geometry shared by every simulated participant.

use glam::Vec3;
use skirmish_physics::{PhysicsBackend, RapierBackend};

/// Half the side length of the square floor.
pub const FLOOR_HALF_SIZE: f32 = 60.0;

/// Cover blocks as (centre, half extents).
const COVER: [(Vec3, Vec3); 4] = [
    (Vec3::new(8.0, 1.5, 8.0), Vec3::new(1.5, 1.5, 1.5)),
    (Vec3::new(-8.0, 1.5, 8.0), Vec3::new(1.5, 1.5, 1.5)),
    (Vec3::new(8.0, 1.0, -8.0), Vec3::new(3.0, 1.0, 0.5)),
    (Vec3::new(-8.0, 1.0, -8.0), Vec3::new(0.5, 1.0, 3.0)),
];

/// Builds the floor and cover and steps once so queries see the colliders.
pub fn build(dt: f32) -> RapierBackend {
    let mut backend = RapierBackend::new();
    backend.add_floor(FLOOR_HALF_SIZE);
    for (center, half_extents) in COVER {
        backend.add_static_box(center, half_extents);
    }
    backend.step(dt);
    backend
}

#[cfg(test)]
mod tests {
    use super::*;
    use skirmish_physics::SpatialQuery;

    #[test]
    fn test_floor_is_hit_from_above() {
        let scene = build(1.0 / 60.0);
        let hit = scene
            .raycast(Vec3::new(20.0, 5.0, 20.0), Vec3::NEG_Y, 10.0, None)
            .expect("floor below");
        assert!((hit.point.y).abs() < 1e-3);
    }

    #[test]
    fn test_cover_rises_above_floor() {
        let scene = build(1.0 / 60.0);
        let hit = scene
            .raycast(Vec3::new(8.0, 10.0, 8.0), Vec3::NEG_Y, 20.0, None)
            .expect("cover below");
        assert!((hit.point.y - 3.0).abs() < 1e-3);
    }
}
