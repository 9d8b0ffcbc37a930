// Frame driver.
//
// The UI and keyboard never touch the roster directly: they send `Command`s
// over a channel and the session applies them at the start of the next
// frame, before the walker pass. Spawns go through the loader queue and
// materialise on whichever frame their load finishes.

use crossbeam_channel::{Receiver, Sender, unbounded};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use super::arena::FloorConfig;
use super::assets::{AssetLoader, LoadedModel, ManifestLoader, ModelEntry};
use super::audio;
use super::config::SandboxConfig;
use super::loader_queue::{LoadResult, LoaderQueue};
use super::names::{self, JsonFileStore, MemoryStore, NameSaver, NameStore};
use super::obstacles::{self, PlacedObstacle};
use super::population::Population;
use super::tuning::TuningSnapshot;
use crate::engine::components::WalkerId;
use crate::engine::footstep::AudioSink;
use crate::engine::systems::PassReport;

/// The JSON name file if `names_path` is set, an in-memory map otherwise.
pub fn name_store(config: &SandboxConfig, base_dir: &Path) -> Arc<dyn NameStore> {
    match &config.names_path {
        Some(path) => Arc::new(JsonFileStore::new(base_dir.join(path))),
        None => Arc::new(MemoryStore::default()),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Spawn the next archetype in the configured cycle.
    Spawn,
    /// Spawn a specific archetype by key.
    SpawnArchetype(String),
    /// Complete replacement of the tuning snapshot, pause flag included.
    Retune(TuningSnapshot),
    SelectFloor(usize),
    Rename { id: WalkerId, name: String },
    Select(Option<WalkerId>),
    SetObstacles(Vec<PlacedObstacle>),
    /// Replace the obstacles with `n` random ones inside the current bounds.
    ScatterObstacles(usize),
}

pub struct Session {
    population: Population,
    loader: LoaderQueue,
    commands_tx: Sender<Command>,
    commands_rx: Receiver<Command>,
    audio: Box<dyn AudioSink>,
    rng: StdRng,
    saver: NameSaver,
    models: Vec<ModelEntry>,
    next_model: usize,
    floors: Vec<FloorConfig>,
    obstacle_margin: f32,
    /// Wall-clock seconds since start; keeps running while paused.
    clock: f64,
    /// Clock value of the last pass that ran, for drawing poses.
    pose_time: f64,
}

impl Session {
    pub fn new(
        config: &SandboxConfig,
        loader: Arc<dyn AssetLoader>,
        store: Arc<dyn NameStore>,
        audio: Box<dyn AudioSink>,
    ) -> std::io::Result<Self> {
        let saved = names::fetch_or_empty(store.as_ref());
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let (commands_tx, commands_rx) = unbounded();
        let mut session = Self {
            population: Population::new(config, saved),
            loader: LoaderQueue::spawn(loader)?,
            commands_tx,
            commands_rx,
            audio,
            rng,
            saver: NameSaver::spawn(store),
            models: config.models.clone(),
            next_model: 0,
            floors: config.arena.floors.clone(),
            obstacle_margin: config.obstacles.margin,
            clock: 0.0,
            pose_time: 0.0,
        };
        if config.obstacles.count > 0 {
            session.scatter_obstacles(config.obstacles.count);
        }
        Ok(session)
    }

    /// The usual wiring: manifests relative to `base_dir`, a JSON name file if
    /// configured (memory otherwise) and the configured audio backend.
    pub fn from_config(config: &SandboxConfig, base_dir: &Path) -> std::io::Result<Self> {
        let loader = Arc::new(ManifestLoader::new(base_dir));
        Self::new(config, loader, name_store(config, base_dir), audio::backend(&config.audio))
    }

    /// A handle the UI can keep to send commands.
    pub fn sender(&self) -> Sender<Command> {
        self.commands_tx.clone()
    }

    pub fn send(&self, command: Command) {
        // Both ends live in `self`, so this cannot disconnect.
        let _ = self.commands_tx.send(command);
    }

    /// Advance one frame of `raw_dt` seconds.
    pub fn frame(&mut self, raw_dt: f32) -> Option<PassReport> {
        if raw_dt.is_finite() && raw_dt > 0.0 {
            self.clock += f64::from(raw_dt);
        }
        self.apply_commands();
        let finished = self.loader.drain();
        self.materialise(finished);

        let report = self.population.tick(raw_dt, self.clock, self.audio.as_mut(), &mut self.rng);
        if report.is_some() {
            self.pose_time = self.clock;
        }
        report
    }

    /// Block until pending loads finish (or `timeout` passes) and spawn them.
    pub fn finish_loads(&mut self, timeout: Duration) -> usize {
        self.apply_commands();
        let finished = self.loader.drain_blocking(timeout);
        self.materialise(finished)
    }

    fn apply_commands(&mut self) {
        let commands: Vec<Command> = self.commands_rx.try_iter().collect();
        for command in commands {
            self.apply(command);
        }
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::Spawn => {
                if self.models.is_empty() {
                    log::warn!("spawn requested but no models are configured");
                    return;
                }
                let entry = self.models[self.next_model].clone();
                self.next_model = (self.next_model + 1) % self.models.len();
                self.loader.request(entry);
            }
            Command::SpawnArchetype(key) => match self.models.iter().find(|m| m.key == key) {
                Some(entry) => {
                    self.loader.request(entry.clone());
                }
                None => log::warn!("no archetype '{key}'"),
            },
            Command::Retune(snapshot) => self.population.retune(snapshot),
            Command::SelectFloor(idx) => match self.floors.get(idx) {
                Some(floor) => self.population.use_floor(idx, floor),
                None => log::warn!("no floor at index {idx}"),
            },
            Command::Rename { id, name } => {
                if let Some((key, name)) = self.population.rename(id, &name) {
                    self.saver.save(&key, &name);
                }
            }
            Command::Select(id) => self.population.select(id),
            Command::SetObstacles(placed) => self.population.set_obstacles(placed),
            Command::ScatterObstacles(count) => self.scatter_obstacles(count),
        }
    }

    fn scatter_obstacles(&mut self, count: usize) {
        let half = self.population.arena().half;
        let placed = obstacles::scatter(half, count, self.obstacle_margin, &mut self.rng);
        self.population.set_obstacles(placed);
    }

    fn materialise(&mut self, finished: Vec<LoadResult>) -> usize {
        let mut spawned = 0;
        for LoadResult { ticket, key, result } in finished {
            match result {
                Ok(loaded) => {
                    self.spawn_loaded(&loaded);
                    spawned += 1;
                }
                Err(err) => log::warn!("spawn {} of {key} failed: {err}", ticket.0),
            }
        }
        spawned
    }

    fn spawn_loaded(&mut self, loaded: &LoadedModel) -> WalkerId {
        self.population.spawn_loaded(loaded, self.audio.as_mut(), &mut self.rng)
    }

    pub fn population(&self) -> &Population {
        &self.population
    }

    /// Scripted access to the roster. Prefer commands from UI code.
    pub fn population_mut(&mut self) -> &mut Population {
        &mut self.population
    }

    pub fn floors(&self) -> &[FloorConfig] {
        &self.floors
    }

    pub fn models(&self) -> &[ModelEntry] {
        &self.models
    }

    pub fn clock(&self) -> f64 {
        self.clock
    }

    pub fn pose_time(&self) -> f64 {
        self.pose_time
    }

    pub fn pending_loads(&self) -> usize {
        self.loader.in_flight()
    }
}
