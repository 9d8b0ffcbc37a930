// Arena bounds provider.
// A floor is a square of side `size`; walkers keep a one-unit margin from its
// edge, so their half-bound is `size / 2 - 1`.

use serde::{Deserialize, Serialize};

use super::config::ArenaConfig;

/// Margin kept between walkers and the visible floor edge.
pub const EDGE_MARGIN: f32 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloorConfig {
    pub name: String,
    /// Side length of the square floor.
    pub size: f32,
}

impl FloorConfig {
    pub fn walker_half(&self) -> f32 {
        half_for_size(self.size)
    }
}

pub fn half_for_size(size: f32) -> f32 {
    (size / 2.0 - EDGE_MARGIN).max(0.0)
}

/// Current bounds: the walker half-bound and the ground height.
#[derive(Debug, Clone, PartialEq)]
pub struct Arena {
    pub half: f32,
    pub ground_y: f32,
    /// Side of the visible floor quad.
    pub floor_size: f32,
    /// Index into the configured floors, `None` for the default ground.
    pub floor: Option<usize>,
}

impl Arena {
    pub fn from_config(config: &ArenaConfig) -> Self {
        let mut arena = Self {
            half: half_for_size(config.ground_size),
            ground_y: config.ground_y,
            floor_size: config.ground_size,
            floor: None,
        };
        if let Some(name) = &config.initial_floor {
            if let Some(idx) = config.floors.iter().position(|f| &f.name == name) {
                arena.use_floor(idx, &config.floors[idx]);
            }
        }
        arena
    }

    pub fn use_floor(&mut self, idx: usize, floor: &FloorConfig) {
        self.half = floor.walker_half();
        self.floor_size = floor.size;
        self.floor = Some(idx);
    }
}
