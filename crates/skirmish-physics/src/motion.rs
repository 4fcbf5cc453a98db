//! Owner-side motion integration.
//!
//! Every fixed step the owning participant turns input into a desired
//! horizontal velocity and a yaw delta, refreshes the grounded flag, handles
//! jump requests, and blends the body's velocity toward the desired one while
//! leaving the vertical component alone. Nothing here is replicated; observers
//! see positions through whatever transform sync the embedding provides.

use std::f32::consts::FRAC_PI_2;

use glam::{Quat, Vec3};
use skirmish_config::{GroundingConfig, JumpStyle, MovementConfig};
use tracing::trace;

use crate::grounding::GroundProbe;
use crate::spatial::{BodyId, PhysicsBackend};

/// Camera pitch is clamped just short of straight up/down.
const MAX_CAMERA_PITCH: f32 = FRAC_PI_2 - 0.01;

/// Per-step input from the owning participant.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MovementInput {
    /// Right is positive, in `[-1, 1]`.
    pub strafe: f32,
    /// Forward is positive, in `[-1, 1]`.
    pub forward: f32,
    /// Yaw input, scaled by look sensitivity into radians.
    pub yaw: f32,
    /// Pitch input, scaled by look sensitivity into radians. Positive looks up.
    pub pitch: f32,
    /// Jump requested this step.
    pub jump: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum JumpRejected {
    #[error("not grounded")]
    NotGrounded,

    #[error("jump on cooldown for another {remaining_secs:.2}s")]
    CoolingDown { remaining_secs: f64 },
}

/// Local motion state of one actor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MotionState {
    /// Horizontal velocity requested by the latest input.
    pub desired_velocity: Vec3,
    /// Yaw change requested by the latest input, in radians.
    pub rotation_delta: f32,
    pub grounded: bool,
    /// Simulation time of the last accepted jump.
    pub last_jump_at: Option<f64>,
    /// Body yaw in radians.
    pub yaw: f32,
    /// Camera pitch in radians, independent of the body.
    pub camera_pitch: f32,
}

impl MotionState {
    pub fn facing(&self) -> Quat {
        Quat::from_rotation_y(self.yaw)
    }

    /// Derives desired velocity, rotation delta and camera pitch from input.
    pub fn plan(&mut self, input: &MovementInput, config: &MovementConfig) {
        let facing = self.facing();
        let right = facing * Vec3::X;
        let forward = facing * Vec3::NEG_Z;

        let direction = (right * input.strafe + forward * input.forward).normalize_or_zero();
        self.desired_velocity = direction * config.speed;
        self.rotation_delta = input.yaw * config.look_sensitivity;
        self.camera_pitch = (self.camera_pitch + input.pitch * config.look_sensitivity)
            .clamp(-MAX_CAMERA_PITCH, MAX_CAMERA_PITCH);
    }

    /// Checks whether a jump is allowed at `now`.
    pub fn can_jump(&self, now: f64, config: &MovementConfig) -> Result<(), JumpRejected> {
        if !self.grounded {
            return Err(JumpRejected::NotGrounded);
        }
        if let Some(last) = self.last_jump_at {
            let elapsed = now - last;
            if elapsed < config.jump_cooldown_secs {
                return Err(JumpRejected::CoolingDown {
                    remaining_secs: config.jump_cooldown_secs - elapsed,
                });
            }
        }
        Ok(())
    }
}

/// Moves `current` toward the desired horizontal velocity, keeping its
/// vertical component. Zero desired velocity leaves `current` untouched.
pub fn blend_velocity(current: Vec3, desired: Vec3, t: f32) -> Vec3 {
    if desired == Vec3::ZERO {
        return current;
    }
    let target = Vec3::new(desired.x, current.y, desired.z);
    current.lerp(target, t.clamp(0.0, 1.0))
}

/// What happened during one [`Locomotion::step`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MotionStep {
    pub jumped: bool,
    pub jump_rejected: Option<JumpRejected>,
}

/// Fixed-step motion integrator for one participant.
#[derive(Debug, Clone)]
pub struct Locomotion {
    movement: MovementConfig,
    probe: GroundProbe,
}

impl Locomotion {
    pub fn new(movement: &MovementConfig, grounding: &GroundingConfig) -> Self {
        Self {
            movement: movement.clone(),
            probe: GroundProbe::new(grounding),
        }
    }

    pub fn movement(&self) -> &MovementConfig {
        &self.movement
    }

    /// Integrates one step for `body`.
    ///
    /// Without a physics backend only the state is updated and the actor is
    /// never grounded.
    pub fn step(
        &self,
        state: &mut MotionState,
        input: &MovementInput,
        dt: f32,
        now: f64,
        physics: Option<&mut (dyn PhysicsBackend + 'static)>,
        body: BodyId,
    ) -> MotionStep {
        state.plan(input, &self.movement);
        state.yaw += state.rotation_delta;

        let mut result = MotionStep::default();
        let Some(physics) = physics else {
            state.grounded = false;
            if input.jump {
                result.jump_rejected = Some(JumpRejected::NotGrounded);
            }
            return result;
        };

        {
            let backend: &dyn PhysicsBackend = &*physics;
            state.grounded = self.probe.probe(backend.as_spatial(), backend, body).grounded();
        }

        if input.jump {
            match state.can_jump(now, &self.movement) {
                Ok(()) => {
                    self.apply_jump(physics, body);
                    state.last_jump_at = Some(now);
                    result.jumped = true;
                }
                Err(rejected) => {
                    trace!(body = body.0, %rejected, "jump rejected");
                    result.jump_rejected = Some(rejected);
                }
            }
        }

        if let Some(current) = physics.linear_velocity(body) {
            let t = dt * self.movement.velocity_smoothing;
            let blended = blend_velocity(current, state.desired_velocity, t);
            if blended != current {
                physics.set_linear_velocity(body, blended);
            }
        }

        result
    }

    fn apply_jump(&self, physics: &mut dyn PhysicsBackend, body: BodyId) {
        match self.movement.jump_style {
            JumpStyle::Nudge => physics.translate(body, Vec3::Y * self.movement.jump_nudge),
            JumpStyle::Impulse => {
                let v = physics.linear_velocity(body).unwrap_or(Vec3::ZERO);
                physics.set_linear_velocity(body, Vec3::new(v.x, self.movement.jump_impulse, v.z));
            }
        }
    }
}
