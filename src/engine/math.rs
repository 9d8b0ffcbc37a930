// Small geometry helpers shared by steering, gait and spawning.
// Everything here works on the XZ ground plane unless stated otherwise.

use glam::Vec3;
use rand::Rng;
use std::f32::consts::{PI, TAU};

/// Lengths below this are treated as zero when normalizing.
pub const EPSILON: f32 = 1e-6;

/// Wrap an angle into the canonical (-PI, PI] range.
pub fn wrap_angle(a: f32) -> f32 {
    let wrapped = (a + PI).rem_euclid(TAU) - PI;
    // rem_euclid lands on [-PI, PI) (or exactly PI after rounding);
    // fold the lower edge onto +PI.
    if wrapped <= -PI {
        wrapped + TAU
    } else if wrapped > PI {
        wrapped - TAU
    } else {
        wrapped
    }
}

/// Signed shortest angular difference `to - from`, in (-PI, PI].
#[inline]
pub fn shortest_angle(from: f32, to: f32) -> f32 {
    wrap_angle(to - from)
}

/// Drop the height component so the vector lies on the ground plane.
#[inline]
pub fn planar(v: Vec3) -> Vec3 {
    Vec3::new(v.x, 0.0, v.z)
}

/// Unit vector, or zero when the input is too short to have a direction.
#[inline]
pub fn normalize_or_zero(v: Vec3) -> Vec3 {
    let len_sq = v.length_squared();
    if len_sq > EPSILON * EPSILON {
        v / len_sq.sqrt()
    } else {
        Vec3::ZERO
    }
}

/// Uniform random point inside the square [-half, half]² on the ground plane.
pub fn random_point<R: Rng + ?Sized>(half: f32, rng: &mut R) -> Vec3 {
    if half <= 0.0 {
        return Vec3::ZERO;
    }
    Vec3::new(rng.gen_range(-half..=half), 0.0, rng.gen_range(-half..=half))
}

/// Ease-out with overshoot ("back" curve). Input is clamped to [0, 1];
/// the output rises past 1.0 near the end before settling at exactly 1.0.
pub fn ease_out_back(x: f32) -> f32 {
    const C1: f32 = 1.70158;
    const C3: f32 = C1 + 1.0;
    let t = x.clamp(0.0, 1.0) - 1.0;
    1.0 + C3 * t * t * t + C1 * t * t
}

/// Heading (yaw) that faces along `dir` on the ground plane. Yaw 0 faces +Z.
#[inline]
pub fn heading_of(dir: Vec3) -> f32 {
    dir.x.atan2(dir.z)
}
