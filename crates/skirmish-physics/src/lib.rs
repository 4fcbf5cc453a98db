//! Physics collaborators for the combat core: spatial queries, actor body
//! control, ground detection and owner-side motion integration.
//!
//! The core only talks to the traits in [`spatial`]. [`RapierBackend`] is the
//! stock implementation, built on the [`PhysicsWorld`] below that owns all
//! Rapier state.

pub mod grounding;
pub mod motion;
pub mod rapier_backend;
pub mod spatial;

use rapier3d::prelude::*;

pub use grounding::{GroundProbe, GroundProbeReport};
pub use motion::{
    JumpRejected, Locomotion, MotionState, MotionStep, MovementInput, blend_velocity,
};
pub use rapier_backend::{ACTOR_HALF_HEIGHT, ACTOR_RADIUS, RapierBackend};
pub use spatial::{BodyControl, BodyId, PhysicsBackend, ProbeHit, SpatialQuery};

/// Default gravity along -Y, in m/s².
pub const DEFAULT_GRAVITY: f32 = -9.81;

/// Central physics simulation state owning all Rapier sets and pipelines.
pub struct PhysicsWorld {
    pub gravity: Vector,
    /// Timestep and solver configuration.
    pub integration_parameters: IntegrationParameters,
    pub physics_pipeline: PhysicsPipeline,
    pub island_manager: IslandManager,
    /// Broad phase; also provides the query pipeline.
    pub broad_phase: BroadPhaseBvh,
    pub narrow_phase: NarrowPhase,
    pub rigid_body_set: RigidBodySet,
    pub collider_set: ColliderSet,
    pub impulse_joint_set: ImpulseJointSet,
    pub multibody_joint_set: MultibodyJointSet,
    pub ccd_solver: CCDSolver,
}

impl PhysicsWorld {
    /// Creates a world stepping at 60 Hz under [`DEFAULT_GRAVITY`].
    pub fn new() -> Self {
        Self::with_timestep(1.0 / 60.0)
    }

    /// Creates a world with a custom fixed timestep in seconds.
    pub fn with_timestep(dt: f32) -> Self {
        let integration_parameters = IntegrationParameters {
            dt,
            ..Default::default()
        };

        Self {
            gravity: Vector::new(0.0, DEFAULT_GRAVITY, 0.0),
            integration_parameters,
            physics_pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: BroadPhaseBvh::new(),
            narrow_phase: NarrowPhase::new(),
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
        }
    }

    /// Advances the simulation by one timestep.
    pub fn step(&mut self) {
        self.physics_pipeline.step(
            self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            &(),
            &(),
        );
    }
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}
