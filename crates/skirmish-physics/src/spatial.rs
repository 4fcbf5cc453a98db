//! Collaborator interfaces the simulation core consumes from a physics engine.
//!
//! [`SpatialQuery`] answers ray and sphere-sweep probes. [`BodyControl`]
//! reads and writes actor bodies. [`PhysicsBackend`] bundles both with body
//! lifetime and stepping; the Rapier implementation lives in
//! [`crate::rapier_backend`].

use glam::Vec3;

/// Physics-side handle for an actor body. The simulation uses the owning
/// participant's id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyId(pub u64);

/// Result of a successful probe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeHit {
    /// World-space contact point.
    pub point: Vec3,
    /// Distance travelled along the probe direction.
    pub distance: f32,
}

/// Ray and shape probes against static and dynamic geometry.
pub trait SpatialQuery: Send + Sync {
    /// Casts a ray and returns the closest hit within `max_distance`.
    /// `exclude` skips one body, usually the prober's own.
    fn raycast(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        exclude: Option<BodyId>,
    ) -> Option<ProbeHit>;

    /// Sweeps a sphere of `radius` from `origin` and returns the first contact
    /// within `max_distance`.
    fn sphere_sweep(
        &self,
        origin: Vec3,
        radius: f32,
        direction: Vec3,
        max_distance: f32,
        exclude: Option<BodyId>,
    ) -> Option<ProbeHit>;
}

/// Read/write access to actor bodies. Unknown ids are ignored or yield `None`.
pub trait BodyControl: Send + Sync {
    fn position(&self, body: BodyId) -> Option<Vec3>;

    /// World-space height of the body's lowest point.
    fn lower_extent(&self, body: BodyId) -> Option<f32>;

    fn linear_velocity(&self, body: BodyId) -> Option<Vec3>;

    fn set_linear_velocity(&mut self, body: BodyId, velocity: Vec3);

    fn set_angular_velocity(&mut self, body: BodyId, velocity: Vec3);

    /// Moves the body by `offset` without touching its velocity.
    fn translate(&mut self, body: BodyId, offset: Vec3);

    /// Places the body at `position` with collision and integration
    /// suspended until the next step has run. Returns `false` for unknown
    /// bodies.
    fn teleport(&mut self, body: BodyId, position: Vec3) -> bool;
}

/// A complete physics engine as seen by one participant.
pub trait PhysicsBackend: SpatialQuery + BodyControl {
    /// Creates an actor body at `position`, replacing any existing one.
    fn spawn_body(&mut self, body: BodyId, position: Vec3);

    /// Destroys an actor body. Returns `false` if it did not exist.
    fn remove_body(&mut self, body: BodyId) -> bool;

    /// Advances the simulation by `dt` seconds. Non-positive `dt` is a no-op.
    fn step(&mut self, dt: f32);

    /// The query half of this backend.
    fn as_spatial(&self) -> &dyn SpatialQuery;
}
