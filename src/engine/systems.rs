// Per-frame walker pass.
// Visits walkers in roster (spawn) order: steer + integrate, then gait and
// footfall, then the spawn-in transition. A neighbour-position snapshot is
// taken once and patched after each walker commits, so later walkers see the
// positions earlier walkers moved to this same frame.

use bevy_ecs::prelude::*;
use glam::Vec3;
use rand::RngCore;

use super::components::Walker;
use super::footstep::{AudioSink, FootstepTrigger};
use super::gait;
use super::steering::{self, Obstacle, StepOutcome};

/// Walker entities in spawn order. Query iteration order is not stable across
/// archetype changes (e.g. adding `Selected`), so order lives here.
#[derive(Resource, Debug, Clone, Default)]
pub struct Roster(pub Vec<Entity>);

/// Static obstacles every walker avoids.
#[derive(Resource, Debug, Clone, Default)]
pub struct Obstacles(pub Vec<Obstacle>);

/// Counters for one pass, mostly for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    pub moved: usize,
    pub retargeted: usize,
    pub footfalls: usize,
    pub footsteps_played: usize,
    pub failed: usize,
}

impl std::ops::AddAssign for PassReport {
    fn add_assign(&mut self, other: Self) {
        self.moved += other.moved;
        self.retargeted += other.retargeted;
        self.footfalls += other.footfalls;
        self.footsteps_played += other.footsteps_played;
        self.failed += other.failed;
    }
}

/// Run one simulation step for every walker in the roster.
///
/// `dt` is the (already clamped) step length, `t` the session clock used by
/// the gait oscillator. A walker whose step fails is logged and skipped; the
/// rest of the roster still runs.
pub fn walker_pass(
    world: &mut World,
    dt: f32,
    t: f64,
    audio: &mut dyn AudioSink,
    trigger: &FootstepTrigger,
    rng: &mut dyn RngCore,
) -> PassReport {
    let mut report = PassReport::default();
    let roster = world.get_resource::<Roster>().map(|r| r.0.clone()).unwrap_or_default();
    let obstacles = world.get_resource::<Obstacles>().map(|o| o.0.clone()).unwrap_or_default();

    let mut live: Vec<Entity> = Vec::with_capacity(roster.len());
    let mut positions: Vec<Vec3> = Vec::with_capacity(roster.len());
    for &entity in &roster {
        match world.get::<Walker>(entity) {
            Some(walker) => {
                live.push(entity);
                positions.push(walker.position);
            }
            None => {
                log::warn!("roster entry {entity:?} has no walker; skipping");
                report.failed += 1;
            }
        }
    }

    for (idx, entity) in live.into_iter().enumerate() {
        let Some(mut walker_mut) = world.get_mut::<Walker>(entity) else {
            continue;
        };
        let walker: &mut Walker = &mut walker_mut;

        match steering::step(walker, dt, &positions, idx, &obstacles, &mut *rng) {
            Ok(StepOutcome::Retargeted { target }) => {
                log::trace!("walker {} reached its target; next ({:.2}, {:.2})", walker.id, target.x, target.z);
                report.retargeted += 1;
            }
            Ok(StepOutcome::Moved { .. }) => {
                report.moved += 1;
                positions[idx] = walker.position;

                let hop = gait::hop01(t, walker.gait.hop_f);
                if walker.footfall.observe(hop) {
                    report.footfalls += 1;
                    if let Some(emitter) = walker.foot {
                        trigger.fire(audio, emitter, &mut *rng);
                        report.footsteps_played += 1;
                    }
                }
            }
            Err(err) => {
                log::warn!("walker {} skipped this frame: {err}", walker.id);
                report.failed += 1;
            }
        }

        advance_spawn(walker, dt);
    }

    report
}

/// Advance the spawn-in transition and drop it once complete.
pub fn advance_spawn(walker: &mut Walker, dt: f32) {
    if let Some(spawn) = walker.spawn.as_mut() {
        if spawn.advance(dt) {
            walker.spawn = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::components::{EmitterHandle, SpawnTransition, WalkerId, WalkerInit};
    use crate::engine::gait::GaitParams;
    use crate::engine::steering::SteerParams;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[derive(Default)]
    struct CountingAudio {
        plays: usize,
    }

    impl AudioSink for CountingAudio {
        fn create_foot_emitter(&mut self) -> Option<EmitterHandle> {
            Some(EmitterHandle(0))
        }
        fn apply_random_variant(&mut self, _emitter: EmitterHandle, _rng: &mut dyn RngCore) {}
        fn play(&mut self, _emitter: EmitterHandle, _rate: f32) {
            self.plays += 1;
        }
        fn stop(&mut self, _emitter: EmitterHandle) {}
        fn play_pop(&mut self, _rate: f32) {}
    }

    fn spawn(world: &mut World, id: u64, position: Vec3, target: Vec3) -> Entity {
        let walker = Walker::new(WalkerInit {
            id: WalkerId(id),
            key: format!("w{id}"),
            name: format!("W{id}"),
            position,
            target,
            bounds_half: 10.0,
            base_speed: 1.0,
            speed_mult: 1.0,
            steer: SteerParams::default(),
            gait: GaitParams::default(),
        });
        let entity = world.spawn(walker).id();
        world.get_resource_or_insert_with(Roster::default).0.push(entity);
        entity
    }

    #[test]
    fn pass_moves_every_walker_in_order() {
        let mut world = World::new();
        let a = spawn(&mut world, 1, Vec3::new(-5.0, 0.0, 0.0), Vec3::new(-5.0, 0.0, 5.0));
        let b = spawn(&mut world, 2, Vec3::new(5.0, 0.0, 0.0), Vec3::new(5.0, 0.0, 5.0));
        let mut audio = CountingAudio::default();
        let mut rng = StdRng::seed_from_u64(1);
        let report = walker_pass(&mut world, 0.05, 0.0, &mut audio, &FootstepTrigger::default(), &mut rng);
        assert_eq!(report.moved, 2);
        assert!(world.get::<Walker>(a).unwrap().position.z > 0.0);
        assert!(world.get::<Walker>(b).unwrap().position.z > 0.0);
    }

    #[test]
    fn later_walkers_see_earlier_commits() {
        // B sits just outside A's separation radius. A steps toward B first,
        // so by the time B runs, A is inside the radius and B is pushed away.
        let mut world = World::new();
        let _a = spawn(&mut world, 1, Vec3::new(0.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 8.0));
        let b = spawn(&mut world, 2, Vec3::new(0.0, 0.0, 1.27), Vec3::new(5.0, 0.0, 1.27));
        let mut audio = CountingAudio::default();
        let mut rng = StdRng::seed_from_u64(1);
        walker_pass(&mut world, 0.05, 0.0, &mut audio, &FootstepTrigger::default(), &mut rng);
        let b_pos = world.get::<Walker>(b).unwrap().position;
        assert!(b_pos.z > 1.27, "B should have been pushed along +z, got {b_pos}");
    }

    #[test]
    fn failing_walker_does_not_stop_the_pass() {
        let mut world = World::new();
        let bad = spawn(&mut world, 1, Vec3::ZERO, Vec3::new(0.0, 0.0, 5.0));
        let good = spawn(&mut world, 2, Vec3::new(4.0, 0.0, 0.0), Vec3::new(4.0, 0.0, 5.0));
        world.get_mut::<Walker>(bad).unwrap().speed = f32::NAN;
        let mut audio = CountingAudio::default();
        let mut rng = StdRng::seed_from_u64(1);
        let report = walker_pass(&mut world, 0.05, 0.0, &mut audio, &FootstepTrigger::default(), &mut rng);
        assert_eq!(report.failed, 1);
        assert_eq!(report.moved, 1);
        assert_eq!(world.get::<Walker>(bad).unwrap().position, Vec3::ZERO);
        assert!(world.get::<Walker>(good).unwrap().position.z > 0.0);
    }

    #[test]
    fn despawned_roster_entry_is_skipped() {
        let mut world = World::new();
        let gone = spawn(&mut world, 1, Vec3::ZERO, Vec3::new(0.0, 0.0, 5.0));
        spawn(&mut world, 2, Vec3::new(3.0, 0.0, 0.0), Vec3::new(3.0, 0.0, 5.0));
        world.despawn(gone);
        let mut audio = CountingAudio::default();
        let mut rng = StdRng::seed_from_u64(1);
        let report = walker_pass(&mut world, 0.05, 0.0, &mut audio, &FootstepTrigger::default(), &mut rng);
        assert_eq!(report.failed, 1);
        assert_eq!(report.moved, 1);
    }

    #[test]
    fn footsteps_play_only_with_an_emitter() {
        let mut world = World::new();
        let loud = spawn(&mut world, 1, Vec3::new(-6.0, 0.0, -9.0), Vec3::new(-6.0, 0.0, 9.0));
        spawn(&mut world, 2, Vec3::new(6.0, 0.0, -9.0), Vec3::new(6.0, 0.0, 9.0));
        world.get_mut::<Walker>(loud).unwrap().foot = Some(EmitterHandle(3));
        let mut audio = CountingAudio::default();
        let mut rng = StdRng::seed_from_u64(1);
        let trigger = FootstepTrigger::default();
        let mut footfalls = 0;
        // Two seconds at 60 Hz: at least two full gait cycles for both.
        for frame in 0..120 {
            let t = frame as f64 / 60.0;
            let report = walker_pass(&mut world, 1.0 / 60.0, t, &mut audio, &trigger, &mut rng);
            footfalls += report.footfalls;
        }
        assert!(audio.plays >= 2);
        assert!(footfalls > audio.plays);
    }

    #[test]
    fn spawn_transition_is_removed_when_done() {
        let mut world = World::new();
        let e = spawn(&mut world, 1, Vec3::ZERO, Vec3::new(0.0, 0.0, 9.0));
        world.get_mut::<Walker>(e).unwrap().spawn = Some(SpawnTransition::start());
        let mut audio = CountingAudio::default();
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..7 {
            walker_pass(&mut world, 0.05, 0.0, &mut audio, &FootstepTrigger::default(), &mut rng);
        }
        assert!(world.get::<Walker>(e).unwrap().spawn.is_none());
        assert_eq!(world.get::<Walker>(e).unwrap().spawn_scale(), 1.0);
    }
}
