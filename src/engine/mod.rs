// Engine module - simulation and camera pieces that know nothing about
// assets, audio backends or persistence.

pub mod camera;
pub mod components;
pub mod footstep;
pub mod gait;
pub mod input;
pub mod math;
pub mod steering;
pub mod systems;

// Re-export commonly used items
pub use components::*;
