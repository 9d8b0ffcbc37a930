// Scene assembly.
// Flattens the population into one list of coloured unit-cube instances:
// floor, obstacles, every body part of every walker, and the selection ring.
// Also places name tags and resolves click picking in screen space.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Quat, Vec3};
use std::f32::consts::TAU;

use super::arena::Arena;
use super::assets::{Body, Part};
use super::obstacles::{ObstacleShape, PlacedObstacle};
use super::population::Population;
use crate::engine::components::{Walker, WalkerId};
use crate::engine::gait::{self, GaitPose};

pub const FLOOR_COLOR: [f32; 3] = [0.32, 0.55, 0.3];
pub const OBSTACLE_COLOR: [f32; 3] = [0.55, 0.5, 0.46];
/// 0x00e5ff
pub const RING_COLOR: [f32; 3] = [0.0, 0.898, 1.0];
pub const RING_INNER: f32 = 0.55;
pub const RING_OUTER: f32 = 0.68;
const RING_SEGMENTS: usize = 24;
const FLOOR_THICKNESS: f32 = 0.04;

/// Per-instance data for the cube pipeline.
///
/// Shader locations:
///   @location(2..=5) model matrix columns
///   @location(6)     color (rgb, a unused)
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct InstanceData {
    pub model: [[f32; 4]; 4],
    pub color: [f32; 4],
}

impl InstanceData {
    pub fn new(model: Mat4, color: [f32; 3]) -> Self {
        Self { model: model.to_cols_array_2d(), color: [color[0], color[1], color[2], 1.0] }
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.model)
    }

    const ATTRIBUTES: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
        2 => Float32x4,
        3 => Float32x4,
        4 => Float32x4,
        5 => Float32x4,
        6 => Float32x4,
    ];

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<InstanceData>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance, // One per instance, not per vertex
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Unit-cube transform for one part, swung about X around its pivot.
pub fn part_matrix(part: &Part, swing: f32) -> Mat4 {
    let cube = Mat4::from_scale_rotation_translation(part.size, Quat::IDENTITY, part.center);
    if swing == 0.0 {
        return cube;
    }
    let pivot = part.pivot();
    Mat4::from_translation(pivot) * Mat4::from_rotation_x(swing) * Mat4::from_translation(-pivot) * cube
}

/// Swing for part `idx`. A part named as both arm and leg takes the leg swing.
fn part_swing(body: &Body, idx: usize, pose: &GaitPose) -> f32 {
    if body.limbs.legs.contains(&idx) {
        pose.leg_angle()
    } else if body.limbs.arms.contains(&idx) {
        pose.arm_angle()
    } else {
        0.0
    }
}

/// World transform of a walker's body root at session time `t`.
pub fn walker_matrix(walker: &Walker, pose: &GaitPose, ground_y: f32) -> Mat4 {
    Mat4::from_translation(Vec3::Y * ground_y)
        * walker.placement()
        * Mat4::from_scale(Vec3::splat(walker.spawn_scale()))
        * pose.local_matrix()
}

pub fn walker_instances(walker: &Walker, body: &Body, t: f64, ground_y: f32, out: &mut Vec<InstanceData>) {
    let pose = gait::pose(t, &walker.gait);
    let root = walker_matrix(walker, &pose, ground_y);
    for (idx, part) in body.model.parts.iter().enumerate() {
        let swing = part_swing(body, idx, &pose);
        out.push(InstanceData::new(root * part_matrix(part, swing), part.color));
    }
}

/// Flat annulus under a walker, built from short tangent slabs.
pub fn ring_instances(position: Vec3, ground_y: f32, out: &mut Vec<InstanceData>) {
    let radius = (RING_INNER + RING_OUTER) * 0.5;
    let width = RING_OUTER - RING_INNER;
    let arc = TAU * radius / RING_SEGMENTS as f32 * 1.08;
    for i in 0..RING_SEGMENTS {
        let angle = i as f32 / RING_SEGMENTS as f32 * TAU;
        let center = Vec3::new(position.x + angle.cos() * radius, ground_y + 0.01, position.z + angle.sin() * radius);
        let m = Mat4::from_scale_rotation_translation(
            Vec3::new(width, 0.01, arc),
            Quat::from_rotation_y(-angle),
            center,
        );
        out.push(InstanceData::new(m, RING_COLOR));
    }
}

pub fn floor_instance(arena: &Arena) -> InstanceData {
    let m = Mat4::from_scale_rotation_translation(
        Vec3::new(arena.floor_size, FLOOR_THICKNESS, arena.floor_size),
        Quat::IDENTITY,
        Vec3::new(0.0, arena.ground_y - FLOOR_THICKNESS * 0.5, 0.0),
    );
    InstanceData::new(m, FLOOR_COLOR)
}

/// Cylinders are drawn as their bounding box.
pub fn obstacle_instance(placed: &PlacedObstacle, ground_y: f32) -> InstanceData {
    let size = match placed.shape {
        ObstacleShape::Box { width, depth, height } => Vec3::new(width, height, depth),
        ObstacleShape::Cylinder { radius, height } => Vec3::new(radius * 2.0, height, radius * 2.0),
    };
    let center = Vec3::new(placed.position.x, ground_y + size.y * 0.5, placed.position.z);
    InstanceData::new(Mat4::from_scale_rotation_translation(size, Quat::IDENTITY, center), OBSTACLE_COLOR)
}

/// Every instance for one frame, posed at session time `t`.
pub fn scene_instances(population: &Population, t: f64) -> Vec<InstanceData> {
    let arena = population.arena();
    let selected = population.selected();
    let mut out = vec![floor_instance(arena)];
    out.extend(population.obstacles().iter().map(|o| obstacle_instance(o, arena.ground_y)));
    for (walker, body) in population.entries() {
        if let Some(body) = body {
            walker_instances(walker, body, t, arena.ground_y, &mut out);
        }
        if selected == Some(walker.id) {
            ring_instances(walker.position, arena.ground_y, &mut out);
        }
    }
    out
}

/// World point a walker's name tag hangs from.
pub fn tag_anchor(walker: &Walker, body: Option<&Body>, t: f64, ground_y: f32) -> Vec3 {
    let height = body.map_or(1.0, |b| b.tag_height);
    let bob = gait::pose(t, &walker.gait).bob;
    walker.position + Vec3::Y * (ground_y + (height + bob) * walker.spawn_scale())
}

/// Closest candidate to `click` within `radius` pixels.
pub fn pick(
    candidates: impl IntoIterator<Item = (WalkerId, (f32, f32))>,
    click: (f32, f32),
    radius: f32,
) -> Option<WalkerId> {
    candidates
        .into_iter()
        .map(|(id, (x, y))| (id, (x - click.0).hypot(y - click.1)))
        .filter(|&(_, d)| d <= radius)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(id, _)| id)
}
