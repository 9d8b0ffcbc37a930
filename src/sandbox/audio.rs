// Audio backends.
// Buffer decoding and playback are outside the sandbox; these backends keep
// the emitter bookkeeping (one current step variant per emitter) and either
// drop, log or record the requests.

use rand::{Rng, RngCore};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::config::AudioConfig;
use crate::engine::components::EmitterHandle;
use crate::engine::footstep::AudioSink;

/// Audio is unavailable: no emitters, every call is a no-op.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAudio;

impl AudioSink for NullAudio {
    fn create_foot_emitter(&mut self) -> Option<EmitterHandle> {
        None
    }
    fn apply_random_variant(&mut self, _emitter: EmitterHandle, _rng: &mut dyn RngCore) {}
    fn play(&mut self, _emitter: EmitterHandle, _rate: f32) {}
    fn stop(&mut self, _emitter: EmitterHandle) {}
    fn play_pop(&mut self, _rate: f32) {}
}

/// One request made to an audio backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AudioEvent {
    Variant { emitter: EmitterHandle, variant: u32 },
    Play { emitter: EmitterHandle, variant: u32, rate: f32, volume: f32 },
    Stop { emitter: EmitterHandle },
    Pop { rate: f32, volume: f32 },
}

/// Emitter table shared by the logging and recording backends.
#[derive(Debug, Clone)]
struct Emitters {
    next: u32,
    variant: HashMap<EmitterHandle, u32>,
    pool: u32,
}

impl Emitters {
    fn new(pool: u32) -> Self {
        Self { next: 0, variant: HashMap::new(), pool }
    }

    fn create(&mut self) -> EmitterHandle {
        let handle = EmitterHandle(self.next);
        self.next += 1;
        self.variant.insert(handle, 0);
        handle
    }

    fn pick(&mut self, emitter: EmitterHandle, rng: &mut dyn RngCore) -> Option<u32> {
        if self.pool == 0 {
            return None;
        }
        let variant = rng.gen_range(0..self.pool);
        let slot = self.variant.get_mut(&emitter)?;
        *slot = variant;
        Some(variant)
    }

    fn current(&self, emitter: EmitterHandle) -> Option<u32> {
        if self.pool == 0 {
            return None;
        }
        self.variant.get(&emitter).copied()
    }
}

/// Shared view of what a `RecordingAudio` has received. Stays readable after
/// the backend itself has been boxed into a session.
#[derive(Debug, Clone, Default)]
pub struct AudioLog {
    events: Arc<Mutex<Vec<AudioEvent>>>,
}

impl AudioLog {
    fn push(&self, event: AudioEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }

    pub fn events(&self) -> Vec<AudioEvent> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }

    pub fn plays(&self) -> Vec<AudioEvent> {
        self.events().into_iter().filter(|e| matches!(e, AudioEvent::Play { .. })).collect()
    }

    pub fn plays_for(&self, emitter: EmitterHandle) -> usize {
        self.plays()
            .iter()
            .filter(|e| matches!(e, AudioEvent::Play { emitter: h, .. } if *h == emitter))
            .count()
    }

    pub fn pops(&self) -> usize {
        self.events().iter().filter(|e| matches!(e, AudioEvent::Pop { .. })).count()
    }
}

/// Keeps every request in memory. Used by headless runs and tests.
#[derive(Debug, Clone)]
pub struct RecordingAudio {
    emitters: Emitters,
    step_volume: f32,
    pop_volume: f32,
    log: AudioLog,
}

impl RecordingAudio {
    pub fn new(config: &AudioConfig) -> Self {
        Self {
            emitters: Emitters::new(config.step_variants),
            step_volume: config.step_volume,
            pop_volume: config.pop_volume,
            log: AudioLog::default(),
        }
    }

    pub fn log(&self) -> AudioLog {
        self.log.clone()
    }
}

impl Default for RecordingAudio {
    fn default() -> Self {
        Self::new(&AudioConfig::default())
    }
}

impl AudioSink for RecordingAudio {
    fn create_foot_emitter(&mut self) -> Option<EmitterHandle> {
        Some(self.emitters.create())
    }

    fn apply_random_variant(&mut self, emitter: EmitterHandle, rng: &mut dyn RngCore) {
        if let Some(variant) = self.emitters.pick(emitter, rng) {
            self.log.push(AudioEvent::Variant { emitter, variant });
        }
    }

    fn play(&mut self, emitter: EmitterHandle, rate: f32) {
        let Some(variant) = self.emitters.current(emitter) else {
            return;
        };
        self.log.push(AudioEvent::Play { emitter, variant, rate, volume: self.step_volume });
    }

    fn stop(&mut self, emitter: EmitterHandle) {
        self.log.push(AudioEvent::Stop { emitter });
    }

    fn play_pop(&mut self, rate: f32) {
        self.log.push(AudioEvent::Pop { rate, volume: self.pop_volume });
    }
}

/// Logs each request at debug level instead of making sound.
#[derive(Debug, Clone)]
pub struct LogAudio {
    emitters: Emitters,
}

impl LogAudio {
    pub fn new(config: &AudioConfig) -> Self {
        Self { emitters: Emitters::new(config.step_variants) }
    }
}

impl AudioSink for LogAudio {
    fn create_foot_emitter(&mut self) -> Option<EmitterHandle> {
        Some(self.emitters.create())
    }

    fn apply_random_variant(&mut self, emitter: EmitterHandle, rng: &mut dyn RngCore) {
        self.emitters.pick(emitter, rng);
    }

    fn play(&mut self, emitter: EmitterHandle, rate: f32) {
        if let Some(variant) = self.emitters.current(emitter) {
            log::debug!("step {variant} on emitter {} at rate {rate:.2}", emitter.0);
        }
    }

    fn stop(&mut self, _emitter: EmitterHandle) {}

    fn play_pop(&mut self, rate: f32) {
        log::debug!("pop at rate {rate:.2}");
    }
}

/// Pick the backend for a config. Disabled audio gets the silent backend.
pub fn backend(config: &AudioConfig) -> Box<dyn AudioSink> {
    if !config.enabled {
        log::info!("audio disabled; footsteps and pops are silent");
        return Box::new(NullAudio);
    }
    if config.step_variants == 0 {
        log::warn!("no footstep variants configured; footsteps are silent");
    }
    Box::new(LogAudio::new(config))
}
