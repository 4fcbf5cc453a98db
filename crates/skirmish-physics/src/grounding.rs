//! Ground-contact detection.
//!
//! Five short downward rays (centre and four lateral offsets) are cast from
//! the body's lowest point, and one wider sphere sweep is cast from just above
//! that point. Any hit counts as grounded.

use glam::Vec3;
use skirmish_config::GroundingConfig;

use crate::spatial::{BodyControl, BodyId, SpatialQuery};

/// Which probes reported contact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroundProbeReport {
    /// Centre, +X, -X, +Z, -Z.
    pub rays: [bool; 5],
    pub sweep: bool,
}

impl GroundProbeReport {
    pub fn grounded(&self) -> bool {
        self.sweep || self.rays.iter().any(|&hit| hit)
    }
}

/// Probe layout derived from [`GroundingConfig`].
#[derive(Debug, Clone)]
pub struct GroundProbe {
    probe_distance: f32,
    lateral_offset: f32,
    sweep_radius: f32,
    sweep_lift: f32,
}

impl GroundProbe {
    pub fn new(config: &GroundingConfig) -> Self {
        Self {
            probe_distance: config.probe_distance,
            lateral_offset: config.lateral_offset,
            sweep_radius: config.sweep_radius,
            sweep_lift: config.sweep_lift,
        }
    }

    /// Ray origins for a body whose centre is at `center` and whose lowest
    /// point is at height `bottom`.
    pub fn ray_origins(&self, center: Vec3, bottom: f32) -> [Vec3; 5] {
        let foot = Vec3::new(center.x, bottom, center.z);
        let o = self.lateral_offset;
        [
            foot,
            foot + Vec3::new(o, 0.0, 0.0),
            foot - Vec3::new(o, 0.0, 0.0),
            foot + Vec3::new(0.0, 0.0, o),
            foot - Vec3::new(0.0, 0.0, o),
        ]
    }

    /// Runs every probe for `body`. An unknown body reports no contact.
    pub fn probe<B>(&self, query: &dyn SpatialQuery, bodies: &B, body: BodyId) -> GroundProbeReport
    where
        B: BodyControl + ?Sized,
    {
        let (Some(center), Some(bottom)) = (bodies.position(body), bodies.lower_extent(body)) else {
            return GroundProbeReport::default();
        };

        let mut report = GroundProbeReport::default();
        for (hit, origin) in report.rays.iter_mut().zip(self.ray_origins(center, bottom)) {
            *hit = query
                .raycast(origin, Vec3::NEG_Y, self.probe_distance, Some(body))
                .is_some();
        }

        let sweep_origin = Vec3::new(center.x, bottom, center.z) + Vec3::Y * self.sweep_lift;
        report.sweep = query
            .sphere_sweep(
                sweep_origin,
                self.sweep_radius,
                Vec3::NEG_Y,
                self.probe_distance + self.sweep_lift,
                Some(body),
            )
            .is_some();
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PhysicsBackend;
    use crate::rapier_backend::RapierBackend;

    const DT: f32 = 1.0 / 60.0;
    const ME: BodyId = BodyId(1);

    fn scene_with_body(at: Vec3) -> RapierBackend {
        let mut backend = RapierBackend::new();
        backend.add_floor(20.0);
        backend.spawn_body(ME, at);
        backend.step(DT);
        backend
    }

    fn probe() -> GroundProbe {
        GroundProbe::new(&GroundingConfig::default())
    }

    #[test]
    fn test_standing_body_is_grounded() {
        let backend = scene_with_body(Vec3::new(0.0, 1.05, 0.0));
        let report = probe().probe(backend.as_spatial(), &backend, ME);
        assert!(report.grounded());
        assert!(report.rays[0]);
    }

    #[test]
    fn test_airborne_body_is_not_grounded() {
        let backend = scene_with_body(Vec3::new(0.0, 6.0, 0.0));
        let report = probe().probe(backend.as_spatial(), &backend, ME);
        assert_eq!(report, GroundProbeReport::default());
        assert!(!report.grounded());
    }

    #[test]
    fn test_ledge_caught_by_lateral_ray() {
        let mut backend = RapierBackend::new();
        // Narrow beam under +X offset only.
        backend.add_static_box(Vec3::new(0.3, -0.5, 0.0), Vec3::new(0.05, 0.5, 0.05));
        backend.spawn_body(ME, Vec3::new(0.0, 1.5, 0.0));
        backend.step(DT);

        let report = probe().probe(backend.as_spatial(), &backend, ME);
        assert!(!report.rays[0]);
        assert!(report.rays[1]);
        assert!(report.grounded());
    }

    #[test]
    fn test_ledge_beyond_rays_caught_by_sweep() {
        let mut backend = RapierBackend::new();
        // Strip outside every ray, 0.8 below the feet.
        backend.add_static_box(Vec3::new(0.44, -0.3, 0.0), Vec3::new(0.06, 0.5, 0.5));
        backend.spawn_body(ME, Vec3::new(0.0, 2.0, 0.0));
        backend.step(DT);

        let report = probe().probe(backend.as_spatial(), &backend, ME);
        assert_eq!(report.rays, [false; 5]);
        assert!(report.sweep);
        assert!(report.grounded());
    }

    #[test]
    fn test_unknown_body_reports_nothing() {
        let backend = scene_with_body(Vec3::new(0.0, 1.05, 0.0));
        let report = probe().probe(backend.as_spatial(), &backend, BodyId(42));
        assert!(!report.grounded());
    }

    #[test]
    fn test_ray_origins_layout() {
        let origins = probe().ray_origins(Vec3::new(1.0, 5.0, 2.0), 4.0);
        assert_eq!(origins[0], Vec3::new(1.0, 4.0, 2.0));
        assert!(origins[1].abs_diff_eq(Vec3::new(1.3, 4.0, 2.0), 1e-6));
        assert!(origins[4].abs_diff_eq(Vec3::new(1.0, 4.0, 1.7), 1e-6));
    }
}
