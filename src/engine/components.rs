// Core ECS components for the walker sandbox.
// A walker is one entity carrying a `Walker`; presentation-only data (body
// model, limbs, name tag) lives in separate components the simulation never
// touches.

use bevy_ecs::prelude::*;
use glam::{Mat4, Quat, Vec3};
use std::fmt;

use super::gait::{FootfallMemory, GaitParams};
use super::math;
use super::steering::SteerParams;

/// Session-unique walker id. Assigned sequentially at spawn, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WalkerId(pub u64);

impl fmt::Display for WalkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Opaque handle to a positional emitter owned by the audio subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EmitterHandle(pub u32);

/// Spawn-in scale animation. Present only while the walker is popping in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnTransition {
    /// Progress in [0, 1].
    pub progress: f32,
}

impl SpawnTransition {
    /// Seconds from invisible to full size.
    pub const DURATION: f32 = 1.0 / 3.0;
    /// Scale used before the first frame so the walker is not a zero-size matrix.
    pub const INITIAL_SCALE: f32 = 0.01;

    pub fn start() -> Self {
        Self { progress: 0.0 }
    }

    /// Advance by `dt` seconds. Returns true once the transition is complete.
    pub fn advance(&mut self, dt: f32) -> bool {
        self.progress = (self.progress + dt / Self::DURATION).min(1.0);
        self.progress >= 1.0
    }

    /// Current uniform scale. Overshoots 1.0 briefly near the end.
    pub fn scale(&self) -> f32 {
        if self.progress <= 0.0 {
            Self::INITIAL_SCALE
        } else {
            math::ease_out_back(self.progress)
        }
    }
}

/// Everything needed to build a walker. Randomized values (position, target,
/// base speed, hop frequency) are drawn by the caller.
#[derive(Debug, Clone)]
pub struct WalkerInit {
    pub id: WalkerId,
    pub key: String,
    pub name: String,
    pub position: Vec3,
    pub target: Vec3,
    pub bounds_half: f32,
    pub base_speed: f32,
    pub speed_mult: f32,
    pub steer: SteerParams,
    pub gait: GaitParams,
}

/// One simulated character.
#[derive(Component, Debug, Clone)]
pub struct Walker {
    pub id: WalkerId,
    key: String,
    name: String,

    pub position: Vec3,
    /// Current heading, always in (-PI, PI]. Yaw 0 faces +Z.
    pub yaw: f32,
    /// Heading implied by the last steering direction.
    pub desired_yaw: f32,
    /// Active waypoint; replaced on arrival.
    pub target: Vec3,
    /// Half-width of the square arena this walker is confined to.
    pub bounds_half: f32,

    base_speed: f32,
    /// `base_speed × speed_mult`, recomputed on every retune.
    pub speed: f32,
    pub steer: SteerParams,

    pub gait: GaitParams,
    pub footfall: FootfallMemory,
    pub spawn: Option<SpawnTransition>,
    pub foot: Option<EmitterHandle>,
}

impl Walker {
    pub fn new(init: WalkerInit) -> Self {
        Self {
            id: init.id,
            key: init.key,
            name: init.name,
            position: init.position,
            yaw: 0.0,
            desired_yaw: 0.0,
            target: init.target,
            bounds_half: init.bounds_half,
            base_speed: init.base_speed,
            speed: init.base_speed * init.speed_mult,
            steer: init.steer,
            gait: init.gait,
            footfall: FootfallMemory::default(),
            spawn: None,
            foot: None,
        }
    }

    /// Stable asset key, used for name persistence.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn base_speed(&self) -> f32 {
        self.base_speed
    }

    /// Replace every tunable copy in one go.
    pub fn retune(&mut self, speed_mult: f32, steer: SteerParams) {
        self.speed = self.base_speed * speed_mult;
        self.steer = steer;
    }

    /// Uniform scale from the spawn transition (1.0 once it has finished).
    pub fn spawn_scale(&self) -> f32 {
        self.spawn.map_or(1.0, |s| s.scale())
    }

    /// Arena placement: translation to `position` and rotation by `yaw`.
    pub fn placement(&self) -> Mat4 {
        Mat4::from_rotation_translation(Quat::from_rotation_y(self.yaw), self.position)
    }
}

/// Marker for the walker the camera follows / the panel edits.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Selected;
