// Local steering for walkers: seek + separation + obstacle avoidance + soft
// boundary containment, blended into a unit direction and integrated with a
// rate-limited turn.
//
// Every force term is guarded against zero-length vectors so degenerate
// geometry contributes nothing instead of NaN.
//
// Neighbour positions come in as a plain slice (one entry per roster member)
// collected by the caller, the same snapshot shape the frame pass keeps up to
// date as it walks the roster.

use glam::Vec3;
use rand::Rng;
use thiserror::Error;

use super::components::Walker;
use super::math::{self, EPSILON};

/// Distance to the target under which the walker picks a new waypoint.
pub const ARRIVAL_RADIUS: f32 = 0.4;
/// Approximate footprint radius of a walker, added to obstacle radii.
pub const WALKER_FOOTPRINT: f32 = 0.6;
/// Upper bound on the integration step; longer frames (tab stalls) are clamped.
pub const MAX_STEP_DT: f32 = 0.05;

// ============================================================================
// PARAMETERS
// ============================================================================

/// Per-walker copy of the tunable steering weights. Refreshed by value on
/// every retune; never read from shared state during a step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SteerParams {
    pub separation_radius: f32,
    pub separation_weight: f32,
    pub seek_weight: f32,
    pub boundary_weight: f32,
    pub obstacle_weight: f32,
    pub edge_padding: f32,
    /// Maximum heading change in radians per second.
    pub turn_speed: f32,
}

impl Default for SteerParams {
    fn default() -> Self {
        Self {
            separation_radius: 1.25,
            separation_weight: 1.6,
            seek_weight: 0.9,
            boundary_weight: 2.2,
            obstacle_weight: 1.8,
            edge_padding: 0.8,
            turn_speed: 3.0,
        }
    }
}

/// Static round obstacle on the ground plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Obstacle {
    pub position: Vec3,
    /// Avoidance radius (footprint plus clearance).
    pub radius: f32,
}

/// What a single step did to the walker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepOutcome {
    /// Target reached: a new waypoint was drawn and nothing moved this frame.
    Retargeted { target: Vec3 },
    /// Walker moved along `steer` (unit length).
    Moved { steer: Vec3 },
}

#[derive(Debug, Error, PartialEq)]
pub enum StepError {
    #[error("step produced a non-finite position or heading (position {position}, yaw {yaw})")]
    NonFinite { position: Vec3, yaw: f32 },
}

// ============================================================================
// FORCE TERMS
// ============================================================================

/// Unit direction toward `target` on the ground plane, or `None` once the
/// walker is within `ARRIVAL_RADIUS`.
pub fn seek_direction(position: Vec3, target: Vec3) -> Option<Vec3> {
    let to_target = math::planar(target - position);
    let dist = to_target.length();
    if dist < ARRIVAL_RADIUS {
        return None;
    }
    Some(to_target / dist)
}

/// Repulsion from every other roster member within `radius`.
///
/// Each neighbour pushes along the unit direction away from it with
/// magnitude 1/d², so close neighbours dominate. The sum is normalized; no
/// neighbours (or only coincident ones) yields zero.
pub fn separation(positions: &[Vec3], me: usize, radius: f32) -> Vec3 {
    let Some(&own) = positions.get(me) else {
        return Vec3::ZERO;
    };
    let radius_sq = radius * radius;
    let mut sum = Vec3::ZERO;
    for (idx, &other) in positions.iter().enumerate() {
        if idx == me {
            continue;
        }
        let off = math::planar(own - other);
        let d_sq = off.length_squared();
        if d_sq > EPSILON * EPSILON && d_sq < radius_sq {
            let away = off / d_sq.sqrt();
            sum += away / d_sq;
        }
    }
    math::normalize_or_zero(sum)
}

/// Radial push away from obstacles within `radius + WALKER_FOOTPRINT`, with
/// quadratic falloff `(1 - d / threshold)²`. Normalized; zero when clear.
pub fn obstacle_avoidance(position: Vec3, obstacles: &[Obstacle]) -> Vec3 {
    let mut sum = Vec3::ZERO;
    for obstacle in obstacles {
        let off = math::planar(position - obstacle.position);
        let d = off.length();
        let threshold = obstacle.radius + WALKER_FOOTPRINT;
        if d > EPSILON && d < threshold {
            let strength = 1.0 - d / threshold;
            sum += (off / d) * (strength * strength);
        }
    }
    math::normalize_or_zero(sum)
}

/// Soft containment inside the square [-half, half]².
///
/// Per axis, zero up to `half - padding`, then rising linearly to 1 at
/// `half`, always pointing back toward the centre. Not clamped past the edge.
pub fn boundary_force(position: Vec3, half: f32, padding: f32) -> Vec3 {
    Vec3::new(
        boundary_axis(position.x, half, padding),
        0.0,
        boundary_axis(position.z, half, padding),
    )
}

fn boundary_axis(coord: f32, half: f32, padding: f32) -> f32 {
    let start = half - padding;
    let abs = coord.abs();
    // Dead centre has no inward direction, even when padding exceeds half.
    if abs <= start || coord == 0.0 {
        return 0.0;
    }
    let band = half - start;
    let penetration = if band > EPSILON {
        (abs - start) / band
    } else {
        // No padding band: full push as soon as the edge is crossed.
        1.0
    };
    -coord.signum() * penetration
}

/// Weighted blend of the four terms, returned as a unit direction.
/// Falls back to the raw seek direction when the blend cancels out.
pub fn compose(seek: Vec3, separation: Vec3, obstacle: Vec3, boundary: Vec3, params: &SteerParams) -> Vec3 {
    let steer = seek * params.seek_weight
        + separation * params.separation_weight
        + obstacle * params.obstacle_weight
        + boundary * params.boundary_weight;
    if steer.length_squared() <= EPSILON * EPSILON {
        seek
    } else {
        steer.normalize()
    }
}

/// Rotate `yaw` toward `desired` along the shortest arc, by at most
/// `turn_speed · dt`. Result is wrapped to (-PI, PI].
pub fn turn_toward(yaw: f32, desired: f32, turn_speed: f32, dt: f32) -> f32 {
    let diff = math::shortest_angle(yaw, desired);
    let max_turn = (turn_speed * dt).max(0.0);
    math::wrap_angle(yaw + diff.clamp(-max_turn, max_turn))
}

// ============================================================================
// INTEGRATION
// ============================================================================

/// Advance one walker by `dt` seconds.
///
/// `positions` holds the current position of every roster member and `me`
/// is this walker's index in it. On arrival the walker retargets and does
/// not move. A step that would produce non-finite state is rejected and the
/// walker is left untouched.
pub fn step<R: Rng + ?Sized>(
    walker: &mut Walker,
    dt: f32,
    positions: &[Vec3],
    me: usize,
    obstacles: &[Obstacle],
    rng: &mut R,
) -> Result<StepOutcome, StepError> {
    let Some(seek) = seek_direction(walker.position, walker.target) else {
        let target = math::random_point(walker.bounds_half, rng);
        walker.target = target;
        return Ok(StepOutcome::Retargeted { target });
    };

    let params = walker.steer;
    let sep = separation(positions, me, params.separation_radius);
    let obs = obstacle_avoidance(walker.position, obstacles);
    let edge = boundary_force(walker.position, walker.bounds_half, params.edge_padding);
    let steer = compose(seek, sep, obs, edge, &params);

    let position = walker.position + steer * walker.speed * dt;
    let desired_yaw = math::heading_of(steer);
    let yaw = turn_toward(walker.yaw, desired_yaw, params.turn_speed, dt);

    if !position.is_finite() || !yaw.is_finite() {
        return Err(StepError::NonFinite { position, yaw });
    }

    walker.position = position;
    walker.desired_yaw = desired_yaw;
    walker.yaw = yaw;
    Ok(StepOutcome::Moved { steer })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::components::{WalkerId, WalkerInit};
    use crate::engine::gait::GaitParams;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::f32::consts::PI;

    fn walker_at(position: Vec3, target: Vec3) -> Walker {
        Walker::new(WalkerInit {
            id: WalkerId(1),
            key: "blob.obj".into(),
            name: "Blob".into(),
            position,
            target,
            bounds_half: 10.0,
            base_speed: 1.0,
            speed_mult: 1.0,
            steer: SteerParams::default(),
            gait: GaitParams::default(),
        })
    }

    #[test]
    fn arrival_retargets_without_moving() {
        let mut rng = StdRng::seed_from_u64(3);
        let start = Vec3::new(1.0, 0.0, 1.0);
        let mut w = walker_at(start, Vec3::new(1.2, 0.0, 1.1));
        let yaw = w.yaw;
        let out = step(&mut w, 0.05, &[start], 0, &[], &mut rng).unwrap();
        let StepOutcome::Retargeted { target } = out else {
            panic!("expected retarget, got {out:?}");
        };
        assert_eq!(w.position, start);
        assert_eq!(w.yaw, yaw);
        assert_eq!(w.target, target);
        assert!(target.x.abs() <= 10.0 && target.z.abs() <= 10.0);
    }

    #[test]
    fn arrival_threshold_is_exclusive() {
        // Exactly at the radius still seeks.
        let dir = seek_direction(Vec3::ZERO, Vec3::new(ARRIVAL_RADIUS, 0.0, 0.0));
        assert_eq!(dir, Some(Vec3::X));
        assert_eq!(seek_direction(Vec3::ZERO, Vec3::new(0.39, 0.0, 0.0)), None);
    }

    #[test]
    fn seek_ignores_height() {
        let dir = seek_direction(Vec3::new(0.0, 5.0, 0.0), Vec3::new(0.0, -3.0, 2.0)).unwrap();
        assert_eq!(dir, Vec3::Z);
    }

    #[test]
    fn separation_is_antisymmetric_for_a_pair() {
        let positions = [Vec3::new(0.3, 0.0, -0.2), Vec3::new(-0.4, 0.0, 0.5)];
        let a = separation(&positions, 0, 1.25);
        let b = separation(&positions, 1, 1.25);
        assert!((a.length() - 1.0).abs() < 1e-5);
        assert!((a.length() - b.length()).abs() < 1e-6);
        assert!((a + b).length() < 1e-6);
        // a points away from b
        assert!(a.dot(positions[0] - positions[1]) > 0.0);
    }

    #[test]
    fn separation_without_neighbours_is_zero() {
        let positions = [Vec3::ZERO, Vec3::new(5.0, 0.0, 0.0)];
        assert_eq!(separation(&positions, 0, 1.25), Vec3::ZERO);
        // Coincident walkers have no defined "away" and contribute nothing.
        let stacked = [Vec3::ONE, Vec3::ONE];
        assert_eq!(separation(&stacked, 0, 1.25), Vec3::ZERO);
        assert_eq!(separation(&[], 0, 1.25), Vec3::ZERO);
    }

    #[test]
    fn closer_neighbour_dominates_separation() {
        // Near neighbour on +X at 0.3, far one on -X at 1.0: push toward -X.
        let positions = [Vec3::ZERO, Vec3::new(0.3, 0.0, 0.0), Vec3::new(-1.0, 0.0, 0.0)];
        let s = separation(&positions, 0, 1.25);
        assert!(s.x < -0.99);
    }

    #[test]
    fn separation_weights_by_inverse_square_distance() {
        // Unit pushes of 1/0.25 along -X and 1/1 along -Z.
        let positions = [Vec3::ZERO, Vec3::new(0.5, 0.0, 0.0), Vec3::new(0.0, 0.0, 1.0)];
        let s = separation(&positions, 0, 1.25);
        let expected = Vec3::new(-4.0, 0.0, -1.0).normalize();
        assert!((s - expected).length() < 1e-5, "{s:?}");
        // A 1/d weighting would give (-0.894, 0, -0.447).
        assert!((s.x + 0.97014).abs() < 1e-4 && (s.z + 0.24254).abs() < 1e-4);
    }

    #[test]
    fn obstacle_avoidance_falls_off_to_zero() {
        let ob = Obstacle { position: Vec3::ZERO, radius: 1.0 };
        // Inside threshold (1.6): pushes away.
        let f = obstacle_avoidance(Vec3::new(1.0, 0.0, 0.0), &[ob]);
        assert!((f - Vec3::X).length() < 1e-6);
        // At or beyond threshold: nothing.
        assert_eq!(obstacle_avoidance(Vec3::new(1.7, 0.0, 0.0), &[ob]), Vec3::ZERO);
        assert_eq!(obstacle_avoidance(Vec3::new(3.0, 0.0, 0.0), &[ob]), Vec3::ZERO);
        // Dead centre has no direction.
        assert_eq!(obstacle_avoidance(Vec3::ZERO, &[ob]), Vec3::ZERO);
        assert_eq!(obstacle_avoidance(Vec3::X, &[]), Vec3::ZERO);
    }

    #[test]
    fn obstacle_push_falls_off_quadratically() {
        // Threshold 1.6 for both: strengths 0.6875 and 0.25, squared.
        let near = Obstacle { position: Vec3::new(-0.5, 0.0, 0.0), radius: 1.0 };
        let far = Obstacle { position: Vec3::new(0.0, 0.0, 1.2), radius: 1.0 };
        let f = obstacle_avoidance(Vec3::ZERO, &[near, far]);
        let expected = Vec3::new(0.6875 * 0.6875, 0.0, -0.25 * 0.25).normalize();
        assert!((f - expected).length() < 1e-5, "{f:?}");
        assert!((f.x - 0.99137).abs() < 1e-4 && (f.z + 0.13109).abs() < 1e-4);
    }

    #[test]
    fn boundary_force_is_soft_and_monotonic() {
        let half = 10.0;
        let pad = 0.8;
        let start = half - pad;
        assert_eq!(boundary_force(Vec3::new(start, 0.0, 0.0), half, pad), Vec3::ZERO);
        let at_edge = boundary_force(Vec3::new(half, 0.0, -half), half, pad);
        assert!((at_edge.x + 1.0).abs() < 1e-5);
        assert!((at_edge.z - 1.0).abs() < 1e-5);

        let mut last = 0.0;
        for i in 1..=20 {
            let x = start + pad * i as f32 / 20.0;
            let f = -boundary_force(Vec3::new(x, 0.0, 0.0), half, pad).x;
            assert!(f > last);
            last = f;
        }
        assert_eq!(boundary_force(Vec3::new(3.0, 0.0, -4.0), half, pad), Vec3::ZERO);
    }

    #[test]
    fn boundary_force_without_padding_is_a_step() {
        assert_eq!(boundary_force(Vec3::new(10.0, 0.0, 0.0), 10.0, 0.0), Vec3::ZERO);
        assert_eq!(boundary_force(Vec3::new(10.5, 0.0, 0.0), 10.0, 0.0), Vec3::new(-1.0, 0.0, 0.0));
    }

    #[test]
    fn tiny_floor_leaves_the_centre_unpushed() {
        // Padding wider than the half-bound puts the centre inside the band.
        assert_eq!(boundary_force(Vec3::ZERO, 0.25, 0.8), Vec3::ZERO);
        let off_centre = boundary_force(Vec3::new(0.1, 0.0, -0.1), 0.25, 0.8);
        assert!(off_centre.x < 0.0 && off_centre.z > 0.0);
    }

    #[test]
    fn compose_falls_back_to_seek_when_cancelled() {
        let params = SteerParams {
            seek_weight: 1.0,
            separation_weight: 1.0,
            ..SteerParams::default()
        };
        let seek = Vec3::Z;
        let out = compose(seek, -Vec3::Z, Vec3::ZERO, Vec3::ZERO, &params);
        assert_eq!(out, seek);
    }

    #[test]
    fn compose_is_unit_length() {
        let params = SteerParams::default();
        let out = compose(Vec3::Z, Vec3::X, Vec3::ZERO, Vec3::new(-0.5, 0.0, 0.0), &params);
        assert!((out.length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn turn_is_clamped_to_rate() {
        let dt = 0.05;
        let speed = 3.0;
        let max = speed * dt;
        // Large positive request.
        let yaw = turn_toward(0.0, 1.0, speed, dt);
        assert!((yaw - max).abs() < 1e-6);
        // Large negative request.
        let yaw = turn_toward(0.5, -1.0, speed, dt);
        assert!((yaw - (0.5 - max)).abs() < 1e-6);
        // Small request applies exactly.
        let yaw = turn_toward(0.2, 0.25, speed, dt);
        assert!((yaw - 0.25).abs() < 1e-6);
    }

    #[test]
    fn turn_takes_the_short_way_round() {
        // From 170° to -170° is +20°, not -340°.
        let from = 170f32.to_radians();
        let to = -170f32.to_radians();
        let yaw = turn_toward(from, to, 3.0, 0.05);
        let moved = crate::engine::math::shortest_angle(from, yaw);
        assert!((moved - 0.15).abs() < 1e-5);
        assert!(yaw > -PI && yaw <= PI);
    }

    #[test]
    fn pure_seek_moves_exactly_speed_dt() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut w = walker_at(Vec3::ZERO, Vec3::new(0.0, 0.0, 5.0));
        w.steer.separation_weight = 0.0;
        w.steer.boundary_weight = 0.0;
        w.steer.obstacle_weight = 0.0;
        w.steer.seek_weight = 1.0;
        let out = step(&mut w, 1.0, &[Vec3::ZERO], 0, &[], &mut rng).unwrap();
        assert_eq!(out, StepOutcome::Moved { steer: Vec3::Z });
        assert_eq!(w.position, Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(w.desired_yaw, 0.0);
    }

    #[test]
    fn boundary_pushes_walker_back_inside() {
        let mut rng = StdRng::seed_from_u64(9);
        let pos = Vec3::new(9.9, 0.0, 0.0);
        // Target outside along +X; the edge term must win and bend the path.
        let mut w = walker_at(pos, Vec3::new(14.0, 0.0, 0.0));
        w.steer.boundary_weight = 4.0;
        let out = step(&mut w, 0.05, &[pos], 0, &[], &mut rng).unwrap();
        let StepOutcome::Moved { steer } = out else { panic!() };
        assert!(steer.x < 0.0);
        assert!(w.position.x < pos.x);
    }

    #[test]
    fn non_finite_step_is_rejected() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut w = walker_at(Vec3::ZERO, Vec3::new(0.0, 0.0, 5.0));
        w.speed = f32::INFINITY;
        let before = w.clone();
        let err = step(&mut w, 0.05, &[Vec3::ZERO], 0, &[], &mut rng).unwrap_err();
        assert!(matches!(err, StepError::NonFinite { .. }));
        assert_eq!(w.position, before.position);
        assert_eq!(w.yaw, before.yaw);
    }
}
