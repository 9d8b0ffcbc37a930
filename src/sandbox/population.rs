// The live roster.
//
// `Population` owns the ECS world the walkers live in, the authoritative
// tuning snapshot and the current arena. Every mutation that has to reach
// all walkers (retune, floor change) is applied to the whole roster inside
// one call, between ticks.

use bevy_ecs::prelude::*;
use rand::{Rng, RngCore};
use std::collections::HashMap;
use std::ops::{Range, RangeInclusive};

use super::arena::{Arena, FloorConfig};
use super::assets::{Body, LoadedModel, find_limbs};
use super::config::{SandboxConfig, WalkerConfig};
use super::names::{NameMap, humanize_name};
use super::obstacles::PlacedObstacle;
use super::tuning::TuningSnapshot;
use crate::engine::components::{SpawnTransition, Selected, Walker, WalkerId, WalkerInit};
use crate::engine::footstep::{AudioSink, FootstepTrigger};
use crate::engine::math;
use crate::engine::steering::MAX_STEP_DT;
use crate::engine::systems::{self, Obstacles, PassReport, Roster};

pub struct Population {
    world: World,
    next_id: u64,
    tuning: TuningSnapshot,
    arena: Arena,
    walker_config: WalkerConfig,
    trigger: FootstepTrigger,
    pop_rate: RangeInclusive<f32>,
    saved_names: NameMap,
    placed: Vec<PlacedObstacle>,
    /// Id lookup next to the `Roster` resource, which keeps spawn order.
    index: HashMap<WalkerId, Entity>,
    selected: Option<WalkerId>,
}

fn sample(range: Range<f32>, rng: &mut dyn RngCore) -> f32 {
    if range.start < range.end { rng.gen_range(range) } else { range.start }
}

impl Population {
    pub fn new(config: &SandboxConfig, saved_names: NameMap) -> Self {
        let mut world = World::new();
        world.insert_resource(Roster::default());
        world.insert_resource(Obstacles::default());
        let [step_lo, step_hi] = config.audio.step_rate;
        let [pop_lo, pop_hi] = config.audio.pop_rate;
        Self {
            world,
            next_id: 1,
            tuning: config.tuning.sanitized(),
            arena: Arena::from_config(&config.arena),
            walker_config: config.walker.clone(),
            trigger: FootstepTrigger::new(step_lo..=step_hi),
            pop_rate: pop_lo..=pop_hi,
            saved_names,
            placed: Vec::new(),
            index: HashMap::new(),
            selected: None,
        }
    }

    /// Materialise a finished load as a new walker at a random point, walking
    /// toward another random point. Returns the new id.
    pub fn spawn_loaded(&mut self, loaded: &LoadedModel, audio: &mut dyn AudioSink, rng: &mut dyn RngCore) -> WalkerId {
        let id = WalkerId(self.next_id);
        self.next_id += 1;

        let name = match self.saved_names.get(&loaded.key) {
            Some(saved) => saved.clone(),
            None => humanize_name(loaded.name.as_deref().unwrap_or(&loaded.key)),
        };
        let half = self.arena.half;
        let position = math::random_point(half, &mut *rng);
        let target = math::random_point(half, &mut *rng);
        let base_speed = sample(self.walker_config.base_speed_range(), rng);
        let hop_f = sample(self.walker_config.hop_f_range(), rng);

        let mut walker = Walker::new(WalkerInit {
            id,
            key: loaded.key.clone(),
            name,
            position,
            target,
            bounds_half: half,
            base_speed,
            speed_mult: self.tuning.speed_mult,
            steer: self.tuning.steer_params(self.walker_config.turn_speed),
            gait: self.walker_config.gait(hop_f),
        });
        walker.spawn = Some(SpawnTransition::start());
        walker.foot = audio.create_foot_emitter();
        if walker.foot.is_none() {
            log::debug!("walker {id} spawned without a foot emitter");
        }

        let body = Body {
            model: loaded.model.clone(),
            limbs: find_limbs(&loaded.model),
            tag_height: loaded.height + self.walker_config.tag_margin,
        };
        log::debug!(
            "spawned walker {id} '{}' from {} ({} arms, {} legs) at ({:.2}, {:.2})",
            walker.name(),
            loaded.key,
            body.limbs.arms.len(),
            body.limbs.legs.len(),
            position.x,
            position.z
        );

        let entity = self.world.spawn((walker, body)).id();
        self.world.get_resource_or_insert_with(Roster::default).0.push(entity);
        self.index.insert(id, entity);

        let rate = if self.pop_rate.start() <= self.pop_rate.end() {
            rng.gen_range(self.pop_rate.clone())
        } else {
            1.0
        };
        audio.play_pop(rate);
        id
    }

    /// Replace the tuning snapshot and push it to every walker.
    pub fn retune(&mut self, snapshot: TuningSnapshot) {
        let snapshot = snapshot.sanitized();
        self.tuning = snapshot;
        let steer = snapshot.steer_params(self.walker_config.turn_speed);
        let mut count = 0;
        for &entity in self.index.values() {
            if let Some(mut walker) = self.world.get_mut::<Walker>(entity) {
                walker.retune(snapshot.speed_mult, steer);
                count += 1;
            }
        }
        log::debug!("retuned {count} walkers (speed x{:.2}, paused {})", snapshot.speed_mult, snapshot.paused);
    }

    pub fn tuning(&self) -> TuningSnapshot {
        self.tuning
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.tuning.paused = paused;
    }

    pub fn is_paused(&self) -> bool {
        self.tuning.paused
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    /// Switch floors and move every walker onto the new bounds.
    pub fn use_floor(&mut self, idx: usize, floor: &FloorConfig) {
        self.arena.use_floor(idx, floor);
        self.set_bounds_half(self.arena.half);
        log::debug!("floor '{}' active, walker half-bound {:.2}", floor.name, self.arena.half);
    }

    pub fn set_bounds_half(&mut self, half: f32) {
        self.arena.half = half;
        for &entity in self.index.values() {
            if let Some(mut walker) = self.world.get_mut::<Walker>(entity) {
                walker.bounds_half = half;
            }
        }
    }

    pub fn set_obstacles(&mut self, placed: Vec<PlacedObstacle>) {
        let obstacles = placed.iter().map(PlacedObstacle::obstacle).collect();
        self.world.insert_resource(Obstacles(obstacles));
        log::debug!("{} obstacles placed", placed.len());
        self.placed = placed;
    }

    pub fn obstacles(&self) -> &[PlacedObstacle] {
        &self.placed
    }

    /// Rename a walker locally. Returns the `(key, name)` pair to persist, or
    /// `None` if the name is blank or the walker is unknown.
    pub fn rename(&mut self, id: WalkerId, name: &str) -> Option<(String, String)> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let entity = self.entity_of(id)?;
        let mut walker = self.world.get_mut::<Walker>(entity)?;
        walker.rename(name);
        let key = walker.key().to_string();
        self.saved_names.insert(key.clone(), name.to_string());
        log::debug!("walker {id} renamed to '{name}'");
        Some((key, name.to_string()))
    }

    /// One frame. `raw_dt` is clamped to [0, MAX_STEP_DT]; nothing runs while
    /// paused.
    pub fn tick(&mut self, raw_dt: f32, t: f64, audio: &mut dyn AudioSink, rng: &mut dyn RngCore) -> Option<PassReport> {
        let dt = if raw_dt.is_finite() { raw_dt.clamp(0.0, MAX_STEP_DT) } else { 0.0 };
        self.advance(dt, t, audio, rng)
    }

    /// Run one pass with `dt` exactly as given.
    pub fn advance(&mut self, dt: f32, t: f64, audio: &mut dyn AudioSink, rng: &mut dyn RngCore) -> Option<PassReport> {
        if self.tuning.paused {
            return None;
        }
        let report = systems::walker_pass(&mut self.world, dt, t, audio, &self.trigger, rng);
        if report.failed > 0 {
            log::warn!("{} walkers failed this frame", report.failed);
        }
        Some(report)
    }

    fn entity_of(&self, id: WalkerId) -> Option<Entity> {
        self.index.get(&id).copied()
    }

    /// Walkers in spawn order.
    pub fn walkers(&self) -> Vec<&Walker> {
        self.entries().into_iter().map(|(w, _)| w).collect()
    }

    /// Walkers with their bodies, in spawn order.
    pub fn entries(&self) -> Vec<(&Walker, Option<&Body>)> {
        let Some(roster) = self.world.get_resource::<Roster>() else {
            return Vec::new();
        };
        roster
            .0
            .iter()
            .filter_map(|&e| self.world.get::<Walker>(e).map(|w| (w, self.world.get::<Body>(e))))
            .collect()
    }

    pub fn walker(&self, id: WalkerId) -> Option<&Walker> {
        let entity = self.entity_of(id)?;
        self.world.get::<Walker>(entity)
    }

    /// Direct access for scripted setups; changes bypass retune.
    pub fn walker_mut(&mut self, id: WalkerId) -> Option<Mut<'_, Walker>> {
        let entity = self.entity_of(id)?;
        self.world.get_mut::<Walker>(entity)
    }

    /// Make `id` the only selected walker, or clear the selection.
    pub fn select(&mut self, id: Option<WalkerId>) {
        let selected: Vec<Entity> = self.world.query_filtered::<Entity, With<Selected>>().iter(&self.world).collect();
        for entity in selected {
            self.world.entity_mut(entity).remove::<Selected>();
        }
        self.selected = None;
        if let Some((id, entity)) = id.and_then(|id| self.entity_of(id).map(|e| (id, e))) {
            self.world.entity_mut(entity).insert(Selected);
            self.selected = Some(id);
        }
    }

    pub fn selected(&self) -> Option<WalkerId> {
        self.selected
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::assets::{AssetLoader, ManifestLoader, builtin_models};
    use crate::sandbox::audio::{NullAudio, RecordingAudio};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn loaded(idx: usize) -> LoadedModel {
        ManifestLoader::default().load(&builtin_models()[idx]).unwrap()
    }

    fn population() -> Population {
        Population::new(&SandboxConfig::default(), NameMap::new())
    }

    #[test]
    fn spawn_assigns_sequential_ids_and_starts_small() {
        let mut pop = population();
        let mut audio = RecordingAudio::default();
        let mut rng = StdRng::seed_from_u64(5);
        let a = pop.spawn_loaded(&loaded(0), &mut audio, &mut rng);
        let b = pop.spawn_loaded(&loaded(1), &mut audio, &mut rng);
        assert_eq!((a, b), (WalkerId(1), WalkerId(2)));
        let w = pop.walker(a).unwrap();
        assert_eq!(w.spawn_scale(), SpawnTransition::INITIAL_SCALE);
        assert!(w.foot.is_some());
        assert!((0.9..1.6).contains(&w.base_speed()));
        assert!((1.4..2.0).contains(&w.gait.hop_f));
        assert!(w.position.x.abs() <= 11.0 && w.target.z.abs() <= 11.0);
        assert_eq!(w.name(), "Minion Gold");
        assert_eq!(audio.log().pops(), 2);
    }

    #[test]
    fn configured_name_and_saved_name_take_precedence() {
        let mut saved = NameMap::new();
        saved.insert("models/minion_gold.obj".into(), "Bob".into());
        let mut pop = Population::new(&SandboxConfig::default(), saved);
        let mut rng = StdRng::seed_from_u64(5);
        let a = pop.spawn_loaded(&loaded(0), &mut NullAudio, &mut rng);
        let b = pop.spawn_loaded(&loaded(2), &mut NullAudio, &mut rng);
        assert_eq!(pop.walker(a).unwrap().name(), "Bob");
        assert_eq!(pop.walker(b).unwrap().name(), "Ghost");
        assert!(pop.walker(a).unwrap().foot.is_none());
    }

    #[test]
    fn tag_sits_above_the_model() {
        let mut pop = population();
        let mut rng = StdRng::seed_from_u64(5);
        pop.spawn_loaded(&loaded(1), &mut NullAudio, &mut rng);
        let (_, body) = pop.entries()[0];
        assert!((body.unwrap().tag_height - (1.4 + 0.22)).abs() < 1e-4);
    }

    #[test]
    fn rename_trims_and_remembers_for_later_spawns() {
        let mut pop = population();
        let mut rng = StdRng::seed_from_u64(5);
        let a = pop.spawn_loaded(&loaded(0), &mut NullAudio, &mut rng);
        assert_eq!(pop.rename(a, "   "), None);
        let saved = pop.rename(a, "  Sir Hops ").unwrap();
        assert_eq!(saved, ("models/minion_gold.obj".to_string(), "Sir Hops".to_string()));
        let b = pop.spawn_loaded(&loaded(0), &mut NullAudio, &mut rng);
        assert_eq!(pop.walker(b).unwrap().name(), "Sir Hops");
        assert_eq!(pop.rename(WalkerId(99), "Nobody"), None);
    }

    #[test]
    fn selection_is_exclusive() {
        let mut pop = population();
        let mut rng = StdRng::seed_from_u64(5);
        let a = pop.spawn_loaded(&loaded(0), &mut NullAudio, &mut rng);
        let b = pop.spawn_loaded(&loaded(1), &mut NullAudio, &mut rng);
        pop.select(Some(a));
        assert_eq!(pop.selected(), Some(a));
        pop.select(Some(b));
        assert_eq!(pop.selected(), Some(b));
        pop.select(None);
        assert_eq!(pop.selected(), None);
        // Selection changes archetypes but never the roster order.
        let ids: Vec<WalkerId> = pop.walkers().iter().map(|w| w.id).collect();
        assert_eq!(ids, vec![a, b]);
        pop.select(Some(WalkerId(99)));
        assert_eq!(pop.selected(), None);
        assert!(pop.world.query_filtered::<Entity, With<Selected>>().iter(&pop.world).next().is_none());
    }

    #[test]
    fn id_lookup_matches_roster_order() {
        let mut pop = population();
        let mut rng = StdRng::seed_from_u64(6);
        let ids: Vec<WalkerId> = (0..4).map(|i| pop.spawn_loaded(&loaded(i % 3), &mut NullAudio, &mut rng)).collect();
        assert_eq!(pop.len(), 4);
        let roster = pop.world.get_resource::<Roster>().unwrap().0.clone();
        for (id, entity) in ids.iter().zip(roster) {
            assert_eq!(pop.entity_of(*id), Some(entity));
            assert_eq!(pop.walker(*id).unwrap().id, *id);
        }
        assert!(pop.walker(WalkerId(42)).is_none());
    }

    #[test]
    fn tick_clamps_large_frames() {
        let mut pop = population();
        let mut rng = StdRng::seed_from_u64(5);
        let a = pop.spawn_loaded(&loaded(0), &mut NullAudio, &mut rng);
        {
            let mut w = pop.walker_mut(a).unwrap();
            w.position = glam::Vec3::ZERO;
            w.target = glam::Vec3::new(0.0, 0.0, 8.0);
            w.speed = 1.0;
        }
        pop.retune(TuningSnapshot { separation_weight: 0.0, boundary_weight: 0.0, ..TuningSnapshot::default() });
        pop.walker_mut(a).unwrap().speed = 1.0;
        pop.tick(2.0, 0.0, &mut NullAudio, &mut rng);
        let z = pop.walker(a).unwrap().position.z;
        assert!((z - MAX_STEP_DT).abs() < 1e-6, "moved {z}");
    }

    #[test]
    fn obstacles_reach_the_pass() {
        let mut pop = population();
        let mut rng = StdRng::seed_from_u64(5);
        let placed = crate::sandbox::obstacles::scatter(11.0, 4, 2.0, &mut rng);
        pop.set_obstacles(placed.clone());
        assert_eq!(pop.obstacles(), placed.as_slice());
        let resource = pop.world.get_resource::<Obstacles>().unwrap();
        assert_eq!(resource.0.len(), 4);
    }
}
