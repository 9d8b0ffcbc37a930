// Live tuning snapshot.
//
// The UI emits a complete snapshot on every change. The population keeps the
// authoritative copy and pushes it, by value, into every walker.

use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

use crate::engine::steering::SteerParams;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TuningSnapshot {
    pub speed_mult: f32,
    pub separation_radius: f32,
    pub separation_weight: f32,
    pub seek_weight: f32,
    pub boundary_weight: f32,
    pub obstacle_weight: f32,
    pub edge_padding: f32,
    pub paused: bool,
}

impl Default for TuningSnapshot {
    fn default() -> Self {
        Self {
            speed_mult: 1.0,
            separation_radius: 1.25,
            separation_weight: 1.6,
            seek_weight: 0.9,
            boundary_weight: 2.2,
            obstacle_weight: 1.8,
            edge_padding: 0.8,
            paused: false,
        }
    }
}

/// Which scalar a slider edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TuningField {
    SpeedMult,
    SeparationRadius,
    SeparationWeight,
    SeekWeight,
    BoundaryWeight,
    ObstacleWeight,
    EdgePadding,
}

/// Slider label and range for each editable field, in panel order.
pub const SLIDERS: [(TuningField, &str, RangeInclusive<f32>); 7] = [
    (TuningField::SpeedMult, "Speed", 0.2..=2.0),
    (TuningField::SeparationRadius, "Sep. radius", 0.3..=2.0),
    (TuningField::SeparationWeight, "Sep. weight", 0.0..=3.0),
    (TuningField::SeekWeight, "Seek weight", 0.3..=2.0),
    (TuningField::BoundaryWeight, "Edge weight", 0.5..=4.0),
    (TuningField::ObstacleWeight, "Obstacle weight", 0.0..=4.0),
    (TuningField::EdgePadding, "Edge padding", 0.0..=3.0),
];

impl TuningSnapshot {
    /// Per-walker steering copy. Turn speed is not live-tunable and comes
    /// from configuration.
    pub fn steer_params(&self, turn_speed: f32) -> SteerParams {
        SteerParams {
            separation_radius: self.separation_radius,
            separation_weight: self.separation_weight,
            seek_weight: self.seek_weight,
            boundary_weight: self.boundary_weight,
            obstacle_weight: self.obstacle_weight,
            edge_padding: self.edge_padding,
            turn_speed,
        }
    }

    pub fn field(&self, field: TuningField) -> f32 {
        match field {
            TuningField::SpeedMult => self.speed_mult,
            TuningField::SeparationRadius => self.separation_radius,
            TuningField::SeparationWeight => self.separation_weight,
            TuningField::SeekWeight => self.seek_weight,
            TuningField::BoundaryWeight => self.boundary_weight,
            TuningField::ObstacleWeight => self.obstacle_weight,
            TuningField::EdgePadding => self.edge_padding,
        }
    }

    pub fn field_mut(&mut self, field: TuningField) -> &mut f32 {
        match field {
            TuningField::SpeedMult => &mut self.speed_mult,
            TuningField::SeparationRadius => &mut self.separation_radius,
            TuningField::SeparationWeight => &mut self.separation_weight,
            TuningField::SeekWeight => &mut self.seek_weight,
            TuningField::BoundaryWeight => &mut self.boundary_weight,
            TuningField::ObstacleWeight => &mut self.obstacle_weight,
            TuningField::EdgePadding => &mut self.edge_padding,
        }
    }

    /// Replace non-finite values with defaults and negative ones with zero,
    /// so a bad emission can't poison every walker.
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        for (field, _, _) in SLIDERS.iter() {
            let fallback = defaults.field(*field);
            let value = self.field_mut(*field);
            if !value.is_finite() {
                log::warn!("tuning {field:?} was {value}; using {fallback}");
                *value = fallback;
            } else if *value < 0.0 {
                *value = 0.0;
            }
        }
        self
    }
}
