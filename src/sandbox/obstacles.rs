// Random obstacle scatter.
// Boxes and cylinders are reduced to a centre and an avoidance radius: the
// shape's horizontal half-extent plus a fixed clearance.

use glam::Vec3;
use rand::Rng;

use crate::engine::steering::Obstacle;

/// Added to each shape's half-extent.
pub const CLEARANCE: f32 = 0.35;
/// Probability that a scattered obstacle is a box rather than a cylinder.
pub const BOX_CHANCE: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ObstacleShape {
    Box { width: f32, depth: f32, height: f32 },
    Cylinder { radius: f32, height: f32 },
}

impl ObstacleShape {
    pub fn avoidance_radius(&self) -> f32 {
        match *self {
            ObstacleShape::Box { width, depth, .. } => width.max(depth) / 2.0 + CLEARANCE,
            ObstacleShape::Cylinder { radius, .. } => radius + CLEARANCE,
        }
    }

    pub fn height(&self) -> f32 {
        match *self {
            ObstacleShape::Box { height, .. } | ObstacleShape::Cylinder { height, .. } => height,
        }
    }
}

/// A placed obstacle: what steering sees plus the shape the viewer draws.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacedObstacle {
    pub shape: ObstacleShape,
    pub position: Vec3,
}

impl PlacedObstacle {
    pub fn obstacle(&self) -> Obstacle {
        Obstacle { position: self.position, radius: self.shape.avoidance_radius() }
    }
}

/// Scatter `count` obstacles with centres at least `margin` inside `half`.
/// Returns nothing when the arena is too small for the margin.
pub fn scatter<R: Rng + ?Sized>(half: f32, count: usize, margin: f32, rng: &mut R) -> Vec<PlacedObstacle> {
    let limit = half - margin;
    if limit <= 0.0 {
        if count > 0 {
            log::warn!("arena half {half} leaves no room for obstacles with margin {margin}");
        }
        return Vec::new();
    }
    (0..count)
        .map(|_| {
            let shape = if rng.gen_bool(BOX_CHANCE) {
                ObstacleShape::Box {
                    width: rng.gen_range(0.8..2.0),
                    depth: rng.gen_range(0.8..2.0),
                    height: rng.gen_range(0.6..1.6),
                }
            } else {
                ObstacleShape::Cylinder { radius: rng.gen_range(0.5..1.2), height: rng.gen_range(0.8..1.8) }
            };
            let position = Vec3::new(rng.gen_range(-limit..=limit), 0.0, rng.gen_range(-limit..=limit));
            PlacedObstacle { shape, position }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn scatter_respects_margin_and_count() {
        let mut rng = StdRng::seed_from_u64(9);
        let placed = scatter(11.0, 40, 2.0, &mut rng);
        assert_eq!(placed.len(), 40);
        for p in &placed {
            assert!(p.position.x.abs() <= 9.0 && p.position.z.abs() <= 9.0);
            assert_eq!(p.position.y, 0.0);
            let r = p.obstacle().radius;
            assert!((0.75..=1.55).contains(&r), "radius {r}");
        }
    }

    #[test]
    fn radius_follows_shape() {
        let b = ObstacleShape::Box { width: 1.0, depth: 1.6, height: 1.0 };
        assert!((b.avoidance_radius() - 1.15).abs() < 1e-6);
        let c = ObstacleShape::Cylinder { radius: 0.5, height: 1.0 };
        assert!((c.avoidance_radius() - 0.85).abs() < 1e-6);
    }

    #[test]
    fn cramped_arena_gets_no_obstacles() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(scatter(1.5, 3, 2.0, &mut rng).is_empty());
    }
}
