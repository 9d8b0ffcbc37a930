// Footstep trigger: turns a footfall edge into a one-shot play request on the
// walker's positional emitter, with a random step variant and a random
// playback rate so repeated steps don't sound mechanical.

use rand::{Rng, RngCore};
use std::ops::RangeInclusive;

use super::components::EmitterHandle;

/// Default playback-rate spread for footsteps.
pub const STEP_RATE_RANGE: RangeInclusive<f32> = 0.92..=1.25;

/// The audio operations the simulation calls. Buffer loading, synthesis and
/// fallbacks belong to the implementation; every call must be safe to make
/// when audio is unavailable (it simply does nothing).
pub trait AudioSink {
    /// A new positional emitter for one walker, or `None` if audio is off.
    fn create_foot_emitter(&mut self) -> Option<EmitterHandle>;
    /// Point the emitter at a uniformly chosen buffer from the step pool.
    fn apply_random_variant(&mut self, emitter: EmitterHandle, rng: &mut dyn RngCore);
    fn play(&mut self, emitter: EmitterHandle, rate: f32);
    fn stop(&mut self, emitter: EmitterHandle);
    /// Non-positional spawn "pop".
    fn play_pop(&mut self, rate: f32);
}

/// Fires footsteps on footfall edges.
#[derive(Debug, Clone, PartialEq)]
pub struct FootstepTrigger {
    pub rate_range: RangeInclusive<f32>,
}

impl Default for FootstepTrigger {
    fn default() -> Self {
        Self { rate_range: STEP_RATE_RANGE }
    }
}

impl FootstepTrigger {
    pub fn new(rate_range: RangeInclusive<f32>) -> Self {
        Self { rate_range }
    }

    /// Restart the emitter with a fresh variant and pitch. Returns the rate used.
    pub fn fire(&self, audio: &mut dyn AudioSink, emitter: EmitterHandle, rng: &mut dyn RngCore) -> f32 {
        audio.stop(emitter);
        audio.apply_random_variant(emitter, rng);
        let rate = if self.rate_range.start() < self.rate_range.end() {
            rng.gen_range(self.rate_range.clone())
        } else {
            *self.rate_range.start()
        };
        audio.play(emitter, rate);
        log::trace!("footstep on emitter {} at rate {rate:.3}", emitter.0);
        rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[derive(Default)]
    struct Calls(Vec<String>);

    impl AudioSink for Calls {
        fn create_foot_emitter(&mut self) -> Option<EmitterHandle> {
            Some(EmitterHandle(0))
        }
        fn apply_random_variant(&mut self, emitter: EmitterHandle, _rng: &mut dyn RngCore) {
            self.0.push(format!("variant {}", emitter.0));
        }
        fn play(&mut self, emitter: EmitterHandle, _rate: f32) {
            self.0.push(format!("play {}", emitter.0));
        }
        fn stop(&mut self, emitter: EmitterHandle) {
            self.0.push(format!("stop {}", emitter.0));
        }
        fn play_pop(&mut self, _rate: f32) {
            self.0.push("pop".into());
        }
    }

    #[test]
    fn fire_stops_then_picks_variant_then_plays() {
        let mut calls = Calls::default();
        let mut rng = StdRng::seed_from_u64(11);
        FootstepTrigger::default().fire(&mut calls, EmitterHandle(7), &mut rng);
        assert_eq!(calls.0, vec!["stop 7", "variant 7", "play 7"]);
    }

    #[test]
    fn rate_stays_in_range() {
        let mut calls = Calls::default();
        let mut rng = StdRng::seed_from_u64(5);
        let trigger = FootstepTrigger::default();
        for _ in 0..200 {
            let rate = trigger.fire(&mut calls, EmitterHandle(1), &mut rng);
            assert!(STEP_RATE_RANGE.contains(&rate));
        }
    }

    #[test]
    fn degenerate_range_uses_the_single_rate() {
        let mut calls = Calls::default();
        let mut rng = StdRng::seed_from_u64(5);
        let trigger = FootstepTrigger::new(1.0..=1.0);
        assert_eq!(trigger.fire(&mut calls, EmitterHandle(1), &mut rng), 1.0);
    }
}
