// Sandbox module - everything around the engine: config, asset loading,
// audio backends, name persistence, the walker roster and the UI panel.

pub mod arena;
pub mod assets;
pub mod audio;
pub mod config;
pub mod error;
pub mod loader_queue;
pub mod names;
pub mod obstacles;
pub mod panel;
pub mod population;
pub mod scene;
pub mod session;
pub mod tuning;

pub use config::SandboxConfig;
pub use session::{Command, Session, name_store};
