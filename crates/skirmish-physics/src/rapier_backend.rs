//! Rapier-backed implementation of the physics collaborator traits.
//!
//! Actors are dynamic capsules with locked rotations. Scene geometry is added
//! as fixed cuboids. Queries go through the broad phase's query pipeline, so
//! call [`PhysicsBackend::step`] once after adding geometry before probing.

use glam::Vec3;
use rapier3d::prelude::*;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::PhysicsWorld;
use crate::spatial::{BodyControl, BodyId, PhysicsBackend, ProbeHit, SpatialQuery};

/// Half-height of the cylindrical part of an actor capsule.
pub const ACTOR_HALF_HEIGHT: f32 = 0.5;

/// Radius of an actor capsule.
pub const ACTOR_RADIUS: f32 = 0.5;

/// Rays used to approximate a sphere sweep, excluding the centre ray.
const SWEEP_RING_RAYS: usize = 8;

struct TrackedBody {
    handle: RigidBodyHandle,
    extent_below: f32,
}

/// Owns a [`PhysicsWorld`] and the mapping from actor ids to Rapier bodies.
pub struct RapierBackend {
    world: PhysicsWorld,
    bodies: FxHashMap<BodyId, TrackedBody>,
    /// Teleported bodies kept out of the simulation until the next step ends.
    suspended: Vec<RigidBodyHandle>,
}

fn to_rapier(v: Vec3) -> Vector {
    Vector::new(v.x, v.y, v.z)
}

impl RapierBackend {
    pub fn new() -> Self {
        Self {
            world: PhysicsWorld::new(),
            bodies: FxHashMap::default(),
            suspended: Vec::new(),
        }
    }

    pub fn world(&self) -> &PhysicsWorld {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut PhysicsWorld {
        &mut self.world
    }

    /// Adds an immovable box centred at `center`.
    pub fn add_static_box(&mut self, center: Vec3, half_extents: Vec3) -> ColliderHandle {
        let body = RigidBodyBuilder::fixed().translation(to_rapier(center)).build();
        let handle = self.world.rigid_body_set.insert(body);
        let collider = ColliderBuilder::cuboid(half_extents.x, half_extents.y, half_extents.z).build();
        self.world
            .collider_set
            .insert_with_parent(collider, handle, &mut self.world.rigid_body_set)
    }

    /// Adds a square floor whose top surface sits at `y = 0`.
    pub fn add_floor(&mut self, half_size: f32) -> ColliderHandle {
        self.add_static_box(Vec3::new(0.0, -0.5, 0.0), Vec3::new(half_size, 0.5, half_size))
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    fn handle(&self, body: BodyId) -> Option<RigidBodyHandle> {
        self.bodies.get(&body).map(|tracked| tracked.handle)
    }

    fn cast(&self, origin: Vec3, direction: Vec3, max_distance: f32, exclude: Option<BodyId>) -> Option<ProbeHit> {
        let direction = direction.normalize_or_zero();
        if direction == Vec3::ZERO || max_distance <= 0.0 {
            return None;
        }

        let filter = match exclude.and_then(|id| self.handle(id)) {
            Some(handle) => QueryFilter::new().exclude_rigid_body(handle),
            None => QueryFilter::new(),
        };
        let query_pipeline = self.world.broad_phase.as_query_pipeline(
            self.world.narrow_phase.query_dispatcher(),
            &self.world.rigid_body_set,
            &self.world.collider_set,
            filter,
        );

        let ray = Ray::new(to_rapier(origin), to_rapier(direction));
        query_pipeline
            .cast_ray(&ray, max_distance, true)
            .map(|(_, distance)| ProbeHit {
                point: origin + direction * distance,
                distance,
            })
    }
}

impl Default for RapierBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SpatialQuery for RapierBackend {
    fn raycast(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        exclude: Option<BodyId>,
    ) -> Option<ProbeHit> {
        self.cast(origin, direction, max_distance, exclude)
    }

    /// Approximated by a centre ray from the sphere's leading point plus a
    /// ring of parallel rays across its silhouette.
    fn sphere_sweep(
        &self,
        origin: Vec3,
        radius: f32,
        direction: Vec3,
        max_distance: f32,
        exclude: Option<BodyId>,
    ) -> Option<ProbeHit> {
        let direction = direction.normalize_or_zero();
        if direction == Vec3::ZERO {
            return None;
        }

        let side = direction.any_orthonormal_vector();
        let up = direction.cross(side);
        let ring = radius * 0.9;
        let ring_depth = (radius * radius - ring * ring).max(0.0).sqrt();

        let mut best = self.cast(origin + direction * radius, direction, max_distance, exclude);
        for i in 0..SWEEP_RING_RAYS {
            let angle = i as f32 / SWEEP_RING_RAYS as f32 * std::f32::consts::TAU;
            let offset = (side * angle.cos() + up * angle.sin()) * ring;
            let start = origin + offset + direction * ring_depth;
            if let Some(hit) = self.cast(start, direction, max_distance, exclude)
                && best.is_none_or(|b| hit.distance < b.distance)
            {
                best = Some(hit);
            }
        }
        best
    }
}

impl BodyControl for RapierBackend {
    fn position(&self, body: BodyId) -> Option<Vec3> {
        let handle = self.handle(body)?;
        let t = self.world.rigid_body_set.get(handle)?.translation();
        Some(Vec3::new(t.x, t.y, t.z))
    }

    fn lower_extent(&self, body: BodyId) -> Option<f32> {
        let tracked = self.bodies.get(&body)?;
        let t = self.world.rigid_body_set.get(tracked.handle)?.translation();
        Some(t.y - tracked.extent_below)
    }

    fn linear_velocity(&self, body: BodyId) -> Option<Vec3> {
        let handle = self.handle(body)?;
        let v = self.world.rigid_body_set.get(handle)?.linvel();
        Some(Vec3::new(v.x, v.y, v.z))
    }

    fn set_linear_velocity(&mut self, body: BodyId, velocity: Vec3) {
        if let Some(handle) = self.handle(body)
            && let Some(rb) = self.world.rigid_body_set.get_mut(handle)
        {
            rb.set_linvel(to_rapier(velocity), true);
        }
    }

    fn set_angular_velocity(&mut self, body: BodyId, velocity: Vec3) {
        if let Some(handle) = self.handle(body)
            && let Some(rb) = self.world.rigid_body_set.get_mut(handle)
        {
            rb.set_angvel(to_rapier(velocity), true);
        }
    }

    fn translate(&mut self, body: BodyId, offset: Vec3) {
        if let Some(handle) = self.handle(body)
            && let Some(rb) = self.world.rigid_body_set.get_mut(handle)
        {
            let t = rb.translation();
            let moved = Vector::new(t.x + offset.x, t.y + offset.y, t.z + offset.z);
            rb.set_translation(moved, true);
        }
    }

    /// Disables the body and its colliders, moves it, and leaves it disabled
    /// for the next step so no contact from the old position is resolved.
    fn teleport(&mut self, body: BodyId, position: Vec3) -> bool {
        let Some(handle) = self.handle(body) else {
            return false;
        };
        let Some(rb) = self.world.rigid_body_set.get_mut(handle) else {
            return false;
        };
        rb.set_enabled(false);
        rb.set_translation(to_rapier(position), false);
        if !self.suspended.contains(&handle) {
            self.suspended.push(handle);
        }

        debug!(body = body.0, x = position.x, y = position.y, z = position.z, "body teleported");
        true
    }
}

impl PhysicsBackend for RapierBackend {
    fn spawn_body(&mut self, body: BodyId, position: Vec3) {
        self.remove_body(body);

        let rb = RigidBodyBuilder::dynamic()
            .translation(to_rapier(position))
            .lock_rotations()
            .build();
        let handle = self.world.rigid_body_set.insert(rb);
        let collider = ColliderBuilder::capsule_y(ACTOR_HALF_HEIGHT, ACTOR_RADIUS).build();
        self.world
            .collider_set
            .insert_with_parent(collider, handle, &mut self.world.rigid_body_set);

        self.bodies.insert(
            body,
            TrackedBody {
                handle,
                extent_below: ACTOR_HALF_HEIGHT + ACTOR_RADIUS,
            },
        );
    }

    fn remove_body(&mut self, body: BodyId) -> bool {
        let Some(tracked) = self.bodies.remove(&body) else {
            return false;
        };
        self.suspended.retain(|handle| *handle != tracked.handle);
        let world = &mut self.world;
        world.rigid_body_set.remove(
            tracked.handle,
            &mut world.island_manager,
            &mut world.collider_set,
            &mut world.impulse_joint_set,
            &mut world.multibody_joint_set,
            true,
        );
        true
    }

    /// A non-positive or NaN `dt` leaves the world untouched.
    fn step(&mut self, dt: f32) {
        if dt.is_nan() || dt <= 0.0 {
            return;
        }
        self.world.integration_parameters.dt = dt;
        self.world.step();

        for handle in self.suspended.drain(..) {
            if let Some(rb) = self.world.rigid_body_set.get_mut(handle) {
                rb.set_enabled(true);
                rb.wake_up(true);
            }
        }
    }

    fn as_spatial(&self) -> &dyn SpatialQuery {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    fn floor_scene() -> RapierBackend {
        let mut backend = RapierBackend::new();
        backend.add_floor(50.0);
        backend.step(DT);
        backend
    }

    #[test]
    fn test_raycast_hits_floor() {
        let backend = floor_scene();
        let hit = backend
            .raycast(Vec3::new(0.0, 3.0, 0.0), Vec3::NEG_Y, 10.0, None)
            .expect("floor below");
        assert!((hit.distance - 3.0).abs() < 1e-3, "distance={}", hit.distance);
        assert!(hit.point.y.abs() < 1e-3);
    }

    #[test]
    fn test_raycast_respects_max_distance() {
        let backend = floor_scene();
        assert!(backend.raycast(Vec3::new(0.0, 3.0, 0.0), Vec3::NEG_Y, 2.0, None).is_none());
        assert!(backend.raycast(Vec3::new(0.0, 3.0, 0.0), Vec3::ZERO, 10.0, None).is_none());
    }

    #[test]
    fn test_sphere_sweep_hits_floor() {
        let backend = floor_scene();
        let hit = backend
            .sphere_sweep(Vec3::new(0.0, 2.0, 0.0), 0.5, Vec3::NEG_Y, 3.0, None)
            .expect("floor below sweep");
        assert!(hit.distance <= 1.5 + 1e-3, "distance={}", hit.distance);
    }

    #[test]
    fn test_own_body_is_excluded() {
        let mut backend = floor_scene();
        let id = BodyId(1);
        backend.spawn_body(id, Vec3::new(0.0, 5.0, 0.0));
        backend.step(DT);

        let from_above = Vec3::new(0.0, 8.0, 0.0);
        let blocked = backend.raycast(from_above, Vec3::NEG_Y, 20.0, None).unwrap();
        let excluded = backend.raycast(from_above, Vec3::NEG_Y, 20.0, Some(id)).unwrap();
        assert!(blocked.distance < 3.0);
        assert!(excluded.distance > 7.0);
    }

    #[test]
    fn test_body_lifecycle() {
        let mut backend = floor_scene();
        let id = BodyId(4);
        backend.spawn_body(id, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(backend.body_count(), 1);
        assert_eq!(backend.position(id), Some(Vec3::new(1.0, 2.0, 3.0)));
        assert_eq!(backend.lower_extent(id), Some(1.0));

        assert!(backend.remove_body(id));
        assert!(!backend.remove_body(id));
        assert_eq!(backend.position(id), None);
        assert_eq!(backend.body_count(), 0);
    }

    #[test]
    fn test_teleport_suspends_body_for_one_step() {
        let mut backend = floor_scene();
        let id = BodyId(2);
        let target = Vec3::new(10.0, 4.0, -2.0);
        backend.spawn_body(id, Vec3::new(0.0, 1.0, 0.0));
        backend.set_linear_velocity(id, Vec3::new(3.0, 0.0, 0.0));

        assert!(backend.teleport(id, target));
        assert_eq!(backend.position(id), Some(target));
        assert!(!backend.teleport(BodyId(99), Vec3::ZERO));

        backend.step(DT);
        assert_eq!(backend.position(id), Some(target), "no integration while suspended");
        let handle = backend.handle(id).unwrap();
        assert!(backend.world().rigid_body_set[handle].is_enabled());

        backend.step(DT);
        let hit = backend.raycast(Vec3::new(10.0, 10.0, -2.0), Vec3::NEG_Y, 20.0, None).unwrap();
        assert!(hit.point.y > 3.0, "teleported body should block the ray again");
    }

    #[test]
    fn test_non_positive_step_is_noop() {
        let mut backend = floor_scene();
        let id = BodyId(5);
        let start = Vec3::new(0.0, 2.0, 0.0);
        backend.spawn_body(id, start);

        for _ in 0..30 {
            backend.step(0.0);
        }
        backend.step(-DT);
        backend.step(f32::NAN);
        assert_eq!(backend.position(id), Some(start));

        backend.step(DT);
        assert!(backend.position(id).unwrap().y < start.y);
    }

    #[test]
    fn test_velocity_round_trip() {
        let mut backend = floor_scene();
        let id = BodyId(3);
        backend.spawn_body(id, Vec3::new(0.0, 1.0, 0.0));
        backend.set_linear_velocity(id, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(backend.linear_velocity(id), Some(Vec3::new(1.0, 2.0, 3.0)));

        backend.translate(id, Vec3::new(0.0, 0.5, 0.0));
        assert_eq!(backend.position(id), Some(Vec3::new(0.0, 1.5, 0.0)));
    }
}
