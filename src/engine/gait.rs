// Procedural gait: a periodic bob/tilt/squash/limb-swing pose derived purely
// from elapsed time and the walker's hop frequency, plus footfall edge
// detection on the normalized bob phase.
//
// The pose is a pure function of (t, params). The only state a walker keeps
// is FootfallMemory, which remembers last frame's phase so the footstep fires
// once per descent instead of every frame spent below the threshold.

use glam::{Mat4, Quat, Vec3};
use std::f64::consts::TAU;

/// Normalized bob phase below which a descending walker counts as "landed".
pub const FOOTFALL_THRESHOLD: f32 = 0.15;

/// Peak limb swing in radians.
pub const LIMB_SWING: f32 = 0.5;

/// Fixed-per-walker oscillator parameters. `hop_f` is randomized once at spawn;
/// the rest come from configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaitParams {
    /// Bob frequency in Hz.
    pub hop_f: f32,
    /// Bob amplitude in world units.
    pub hop_a: f32,
    /// Peak side-to-side tilt in radians.
    pub tilt_a: f32,
    /// Peak squash intensity at the bottom of the bob.
    pub squash: f32,
}

impl Default for GaitParams {
    fn default() -> Self {
        Self {
            hop_f: 1.7,
            hop_a: 0.22,
            tilt_a: 0.12,
            squash: 0.12,
        }
    }
}

/// Local gait pose for one frame, relative to the walker's placement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaitPose {
    /// Normalized bob phase in [0, 1].
    pub hop01: f32,
    /// Vertical offset of the body.
    pub bob: f32,
    /// Rotation about the forward (Z) axis.
    pub tilt: f32,
    /// Non-uniform body scale: (xz up, y down, xz up) at peak squash.
    pub scale: Vec3,
    /// Arm swing about X; legs use the opposite sign.
    pub limb_swing: f32,
}

impl GaitPose {
    pub fn arm_angle(&self) -> f32 {
        self.limb_swing
    }

    pub fn leg_angle(&self) -> f32 {
        -self.limb_swing
    }

    /// Body-local transform: bob translation, then tilt, then squash scale.
    pub fn local_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            self.scale,
            Quat::from_rotation_z(self.tilt),
            Vec3::new(0.0, self.bob, 0.0),
        )
    }
}

/// `sin(2π · t · hop_f)`, computed on the fractional cycle so long sessions
/// keep full precision.
pub fn oscillation(t: f64, hop_f: f32) -> f32 {
    let cycles = (t * hop_f as f64).fract();
    (cycles * TAU).sin() as f32
}

/// Normalized bob phase `0.5 · (sin(2π · t · hop_f) + 1)`, in [0, 1].
pub fn hop01(t: f64, hop_f: f32) -> f32 {
    0.5 * (oscillation(t, hop_f) + 1.0)
}

/// Evaluate the full pose at time `t`. Deterministic: the same `t` always
/// yields the same pose.
pub fn pose(t: f64, params: &GaitParams) -> GaitPose {
    let wave = oscillation(t, params.hop_f);
    let hop01 = 0.5 * (wave + 1.0);
    let low = 1.0 - hop01;
    let squash = params.squash * low * low;
    GaitPose {
        hop01,
        bob: params.hop_a * hop01,
        tilt: params.tilt_a * wave,
        scale: Vec3::new(1.0 + squash * 0.5, 1.0 - squash, 1.0 + squash * 0.5),
        limb_swing: LIMB_SWING * wave,
    }
}

// ============================================================================
// FOOTFALL EDGE DETECTION
// ============================================================================

/// Last frame's bob phase. Empty until the walker's first animated frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FootfallMemory {
    prev_hop01: Option<f32>,
}

impl FootfallMemory {
    /// Feed this frame's phase; returns true only on the frame where the phase
    /// descends from above the threshold to at-or-below it.
    pub fn observe(&mut self, hop01: f32) -> bool {
        let prev = self.prev_hop01.unwrap_or(hop01);
        self.prev_hop01 = Some(hop01);
        let descending = hop01 < prev;
        descending && prev > FOOTFALL_THRESHOLD && hop01 <= FOOTFALL_THRESHOLD
    }

    pub fn previous(&self) -> Option<f32> {
        self.prev_hop01
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pose_is_deterministic() {
        let params = GaitParams { hop_f: 1.83, ..GaitParams::default() };
        for i in 0..40 {
            let t = i as f64 * 0.037;
            assert_eq!(pose(t, &params), pose(t, &params));
        }
    }

    #[test]
    fn pose_matches_closed_form() {
        let params = GaitParams::default();
        // Quarter cycle: sin = 1, phase at the top.
        let t = 0.25 / params.hop_f as f64;
        let p = pose(t, &params);
        assert!((p.hop01 - 1.0).abs() < 1e-5);
        assert!((p.bob - params.hop_a).abs() < 1e-5);
        assert!((p.tilt - params.tilt_a).abs() < 1e-5);
        assert!((p.scale - Vec3::ONE).length() < 1e-5);
        assert!((p.arm_angle() - 0.5).abs() < 1e-5);
        assert!((p.leg_angle() + 0.5).abs() < 1e-5);

        // Three-quarter cycle: bottom of the bob, full squash.
        let t = 0.75 / params.hop_f as f64;
        let p = pose(t, &params);
        assert!(p.hop01.abs() < 1e-5);
        assert!((p.scale.y - (1.0 - params.squash)).abs() < 1e-5);
        assert!((p.scale.x - (1.0 + params.squash * 0.5)).abs() < 1e-5);
        assert_eq!(p.scale.x, p.scale.z);
    }

    #[test]
    fn hop01_stays_normalized_over_long_sessions() {
        for i in 0..200 {
            let t = 86_400.0 + i as f64 * 0.013;
            let h = hop01(t, 1.4);
            assert!((0.0..=1.0).contains(&h));
        }
    }

    #[test]
    fn footfall_fires_once_on_descent() {
        let mut mem = FootfallMemory::default();
        assert!(!mem.observe(0.5)); // first frame only primes the memory
        assert!(!mem.observe(0.3));
        assert!(mem.observe(0.1));
        // Holding below the threshold never retriggers.
        for _ in 0..10 {
            assert!(!mem.observe(0.1));
        }
        assert!(!mem.observe(0.05));
        // Rising back up and descending again fires once more.
        assert!(!mem.observe(0.6));
        assert!(mem.observe(0.15));
    }

    #[test]
    fn footfall_ignores_ascending_crossings() {
        let mut mem = FootfallMemory::default();
        mem.observe(0.0);
        assert!(!mem.observe(0.1));
        assert!(!mem.observe(0.2));
        assert_eq!(mem.previous(), Some(0.2));
    }

    #[test]
    fn one_footfall_per_cycle_when_sampled_densely() {
        let params = GaitParams { hop_f: 2.0, ..GaitParams::default() };
        let mut mem = FootfallMemory::default();
        let mut hits = 0;
        // Five seconds at 60 Hz covers ten full cycles.
        for frame in 0..300 {
            let t = frame as f64 / 60.0;
            if mem.observe(pose(t, &params).hop01) {
                hits += 1;
            }
        }
        assert_eq!(hits, 10);
    }
}
