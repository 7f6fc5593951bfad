//! Audio engine for Chamber
//!
//! Owns every synth driver, the resonance engine, and the backend they all
//! play through. One call to [`Engine::process`] is one tick of the frame loop.

mod backend;
mod driver;
mod error;
mod memory;
mod player;
mod recorder;

pub use backend::{AudioBackend, StreamHandle, StreamSpec};
pub use driver::SynthDriver;
pub use error::{Error, Result};
pub use memory::{MemoryBackend, MemoryStream};
pub use player::{default_device_name, list_output_devices, CpalBackend};
pub use recorder::WavBackend;

use crate::config::ChamberConfig;
use crate::resonance::{ResonanceEngine, ResonanceParams};
use crate::synth::{Shape, SmoothingParams, Waveform};

/// A directly driven oscillator
#[derive(Debug)]
pub struct Voice {
    name: String,
    driver: SynthDriver,
    /// Amplitude the voice sounds at while active
    level: f64,
    active: bool,
}

impl Voice {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn waveform(&self) -> &Waveform {
        self.driver.waveform()
    }

    pub fn driver(&self) -> &SynthDriver {
        &self.driver
    }

    pub fn level(&self) -> f64 {
        self.level
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    fn apply_level(&mut self) {
        let target = if self.active { self.level } else { 0.0 };
        self.driver.waveform_mut().set_amplitude(target);
    }
}

/// An oscillator whose level is derived from the voices each tick
#[derive(Debug)]
pub struct Resonator {
    name: String,
    driver: SynthDriver,
    gain: f64,
}

impl Resonator {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn waveform(&self) -> &Waveform {
        self.driver.waveform()
    }

    pub fn driver(&self) -> &SynthDriver {
        &self.driver
    }

    pub fn gain(&self) -> f64 {
        self.gain
    }
}

/// The main audio engine
pub struct Engine<B: AudioBackend> {
    sample_rate: u32,
    voices: Vec<Voice>,
    resonators: Vec<Resonator>,
    resonance: ResonanceEngine,
    backend: B,
    running: bool,
    ticks: u64,
}

impl<B: AudioBackend> Engine<B> {
    /// Create a new engine with the given configuration
    pub fn new(config: &ChamberConfig, backend: B) -> Self {
        let sample_rate = config.audio.sample_rate;
        let hz = sample_rate as f64;
        let block_size = config.audio.block_size;
        let channels = config.audio.channels;
        let (frequency_smoothing, amplitude_smoothing) = smoothing_for(config);

        let make_driver = |shape: Shape, frequency: f64, amplitude: f64, offset: f64| {
            let waveform = Waveform::new(shape, frequency / hz, amplitude, offset, block_size)
                .with_smoothing(frequency_smoothing, amplitude_smoothing);
            SynthDriver::new(waveform, sample_rate, channels)
        };

        let voices = config
            .voices
            .iter()
            .map(|v| Voice {
                name: v.name.clone(),
                driver: make_driver(
                    v.shape,
                    v.frequency,
                    if v.active { v.amplitude } else { 0.0 },
                    v.offset,
                ),
                level: v.amplitude,
                active: v.active,
            })
            .collect();

        let resonators = config
            .resonators
            .iter()
            .map(|r| Resonator {
                name: r.name.clone(),
                driver: make_driver(r.shape, r.frequency, 0.0, 0.0),
                gain: r.gain,
            })
            .collect();

        Self {
            sample_rate,
            voices,
            resonators,
            resonance: ResonanceEngine::new(ResonanceParams::from(&config.resonance)),
            backend,
            running: false,
            ticks: 0,
        }
    }

    /// Get the sample rate
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    pub fn resonators(&self) -> &[Resonator] {
        &self.resonators
    }

    pub fn resonance(&self) -> &ResonanceEngine {
        &self.resonance
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Ticks processed since start
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Check if the engine is running
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Find a voice by name
    pub fn voice_index(&self, name: &str) -> Option<usize> {
        self.voices.iter().position(|v| v.name == name)
    }

    /// Set a voice's frequency target in Hz
    pub fn set_voice_frequency(&mut self, index: usize, frequency: f64) {
        let hz = self.sample_rate as f64;
        if let Some(voice) = self.voices.get_mut(index) {
            voice.driver.waveform_mut().set_frequency(frequency / hz);
        }
    }

    /// Set the amplitude a voice sounds at while active
    pub fn set_voice_amplitude(&mut self, index: usize, amplitude: f64) {
        if let Some(voice) = self.voices.get_mut(index) {
            voice.level = amplitude;
            voice.apply_level();
        }
    }

    /// Gate a voice; inactive voices fade to silence and excite nothing
    pub fn set_voice_active(&mut self, index: usize, active: bool) {
        if let Some(voice) = self.voices.get_mut(index) {
            voice.active = active;
            voice.apply_level();
        }
    }

    /// Start every driver.
    ///
    /// If any driver fails, the ones already started are finished again and
    /// the engine must not be used further.
    pub fn start(&mut self) -> Result<()> {
        let drivers = self
            .voices
            .iter_mut()
            .map(|v| &mut v.driver)
            .chain(self.resonators.iter_mut().map(|r| &mut r.driver));

        let mut started: Vec<&mut SynthDriver> = Vec::new();
        for driver in drivers {
            if let Err(e) = driver.start(&mut self.backend) {
                for driver in started {
                    driver.finish(&mut self.backend);
                }
                return Err(e);
            }
            started.push(driver);
        }

        self.running = true;
        tracing::info!(
            backend = self.backend.name(),
            voices = self.voices.len(),
            resonators = self.resonators.len(),
            "engine started"
        );
        Ok(())
    }

    /// One tick: derive resonator levels, then let every driver produce.
    ///
    /// Returns the number of blocks handed to the backend.
    pub fn process(&mut self) -> Result<usize> {
        self.update_resonators();

        let mut written = 0;
        for voice in &mut self.voices {
            if voice.driver.process(&mut self.backend)? {
                written += 1;
            }
        }
        for resonator in &mut self.resonators {
            if resonator.driver.process(&mut self.backend)? {
                written += 1;
            }
        }

        self.ticks += 1;
        Ok(written)
    }

    /// Release every driver's stream
    pub fn finish(&mut self) {
        for voice in &mut self.voices {
            voice.driver.finish(&mut self.backend);
        }
        for resonator in &mut self.resonators {
            resonator.driver.finish(&mut self.backend);
        }
        self.running = false;
        tracing::info!(ticks = self.ticks, "engine finished");
    }

    /// Take the backend back, e.g. to finalize a recording
    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Set each resonator's amplitude target from the active voices.
    ///
    /// Every (resonator, voice) pair is evaluated each tick; the cache only
    /// saves the ratio search.
    fn update_resonators(&mut self) {
        for resonator in &mut self.resonators {
            let frequency = resonator.driver.waveform().frequency().current();
            let mut excitation = 0.0;
            for voice in self.voices.iter().filter(|v| v.active) {
                let waveform = voice.driver.waveform();
                let factor = self.resonance.factor(frequency, waveform.frequency().current());
                excitation += waveform.amplitude().current() * factor;
            }
            resonator
                .driver
                .waveform_mut()
                .set_amplitude(resonator.gain * excitation);
        }
    }
}

/// Smoothing actually applied to a configured engine (frequency in cycles/sample)
pub fn smoothing_for(config: &ChamberConfig) -> (SmoothingParams, SmoothingParams) {
    (
        config.smoothing.frequency.to_params(config.audio.sample_rate as f64),
        config.smoothing.amplitude.to_params(1.0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ResonatorConfig, VoiceConfig};
    use tempfile::NamedTempFile;

    fn test_config() -> ChamberConfig {
        let mut config = ChamberConfig::default();
        config.audio.block_size = 64;
        config.voices = vec![VoiceConfig {
            name: "root".to_string(),
            shape: Shape::Sine,
            frequency: 220.0,
            amplitude: 6000.0,
            offset: 0.0,
            active: true,
        }];
        config.resonators = vec![
            ResonatorConfig {
                name: "octave".to_string(),
                shape: Shape::Sine,
                frequency: 440.0,
                gain: 0.5,
            },
            ResonatorConfig {
                name: "off".to_string(),
                shape: Shape::Saw,
                frequency: 220.0 * std::f64::consts::SQRT_2,
                gain: 1.0,
            },
        ];
        config
    }

    #[test]
    fn test_engine_creation() {
        let engine = Engine::new(&test_config(), MemoryBackend::new());

        assert_eq!(engine.sample_rate(), 44100);
        assert!(!engine.is_running());
        assert_eq!(engine.voices().len(), 1);
        assert_eq!(engine.resonators().len(), 2);

        let root = &engine.voices()[0];
        assert_eq!(root.name(), "root");
        assert!((root.waveform().frequency().current() - 220.0 / 44100.0).abs() < 1e-15);
        assert_eq!(root.waveform().amplitude().current(), 6000.0);
        assert_eq!(root.waveform().block_size(), 64);
        assert_eq!(engine.resonators()[0].waveform().amplitude().current(), 0.0);
    }

    #[test]
    fn test_engine_start_allocates_all_streams() {
        let mut engine = Engine::new(&test_config(), MemoryBackend::new());
        engine.start().unwrap();

        assert!(engine.is_running());
        assert_eq!(engine.backend().stream_count(), 3);
        assert!(engine.voices()[0].driver().is_started());

        engine.finish();
        assert!(!engine.is_running());
        assert!(engine.backend().stream(2).unwrap().released);
    }

    #[test]
    fn test_process_writes_every_driver() {
        let mut engine = Engine::new(&test_config(), MemoryBackend::new());
        engine.start().unwrap();

        assert_eq!(engine.process().unwrap(), 3);
        assert_eq!(engine.ticks(), 1);
        assert_eq!(engine.backend().total_writes(), 3);

        engine.backend_mut().set_ready(false);
        assert_eq!(engine.process().unwrap(), 0);
        assert_eq!(engine.backend().total_writes(), 3);

        engine.finish();
    }

    #[test]
    fn test_octave_resonator_is_excited() {
        let mut engine = Engine::new(&test_config(), MemoryBackend::new());
        engine.start().unwrap();
        engine.process().unwrap();

        // gain 0.5 * amplitude 6000 * factor(2:1) 0.8
        let octave = engine.resonators()[0].waveform().amplitude().target();
        assert!((octave - 2400.0).abs() < 1.0, "octave target {}", octave);

        let off = engine.resonators()[1].waveform().amplitude().target();
        assert!(off < 50.0, "dissonant target {}", off);

        for _ in 0..100 {
            engine.process().unwrap();
        }
        let octave_level = engine.resonators()[0].waveform().amplitude().current();
        assert!((octave_level - 2400.0).abs() < 2.0);

        engine.finish();
    }

    #[test]
    fn test_inactive_voice_excites_nothing() {
        let mut engine = Engine::new(&test_config(), MemoryBackend::new());
        engine.start().unwrap();
        engine.set_voice_active(0, false);
        engine.process().unwrap();

        assert!(!engine.voices()[0].is_active());
        assert_eq!(engine.voices()[0].waveform().amplitude().target(), 0.0);
        assert_eq!(engine.resonators()[0].waveform().amplitude().target(), 0.0);

        engine.set_voice_active(0, true);
        assert_eq!(engine.voices()[0].waveform().amplitude().target(), 6000.0);

        engine.finish();
    }

    #[test]
    fn test_resonator_sums_every_active_voice() {
        let mut config = test_config();
        config.voices.push(VoiceConfig {
            name: "upper".to_string(),
            shape: Shape::Saw,
            frequency: 440.0,
            amplitude: 3000.0,
            offset: 0.0,
            active: true,
        });

        let mut reference = ResonanceEngine::default();
        let octave = 440.0 / 44100.0;
        let from_root = 6000.0 * reference.factor(octave, 220.0 / 44100.0);
        let from_upper = 3000.0 * reference.factor(octave, 440.0 / 44100.0);
        assert!(from_root > 0.0 && from_upper > 0.0);

        let mut engine = Engine::new(&config, MemoryBackend::new());
        engine.start().unwrap();
        engine.process().unwrap();

        // gain 0.5 * (6000 * 0.8 + 3000 * 1.0)
        let target = engine.resonators()[0].waveform().amplitude().target();
        assert!((target - 0.5 * (from_root + from_upper)).abs() < 1e-9);
        assert!((target - 3900.0).abs() < 1.0, "summed target {}", target);

        let upper = engine.voice_index("upper").unwrap();
        engine.set_voice_active(upper, false);
        engine.process().unwrap();
        let target = engine.resonators()[0].waveform().amplitude().target();
        assert!((target - 0.5 * from_root).abs() < 1e-9);

        engine.set_voice_active(upper, true);
        engine.set_voice_active(0, false);
        engine.process().unwrap();
        let target = engine.resonators()[0].waveform().amplitude().target();
        assert!((target - 0.5 * from_upper).abs() < 1e-9);

        engine.finish();
    }

    #[test]
    fn test_resonance_is_memoized_across_ticks() {
        let mut engine = Engine::new(&test_config(), MemoryBackend::new());
        engine.start().unwrap();

        engine.process().unwrap();
        let searches = engine.resonance().search_count();
        assert_eq!(searches, 2);

        for _ in 0..10 {
            engine.process().unwrap();
        }
        assert_eq!(engine.resonance().search_count(), searches);

        engine.finish();
    }

    #[test]
    fn test_voice_controls() {
        let mut engine = Engine::new(&test_config(), MemoryBackend::new());
        let index = engine.voice_index("root").unwrap();
        assert_eq!(engine.voice_index("missing"), None);

        engine.set_voice_frequency(index, 441.0);
        engine.set_voice_amplitude(index, 1000.0);
        let wave = engine.voices()[index].waveform();
        assert!((wave.frequency().target() - 0.01).abs() < 1e-15);
        assert_eq!(wave.amplitude().target(), 1000.0);
        assert_eq!(engine.voices()[index].level(), 1000.0);

        // Out of range indices are ignored
        engine.set_voice_amplitude(99, 1.0);
    }

    #[test]
    fn test_render_to_wav() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_path_buf();

        let config = test_config();
        let backend = WavBackend::new(&path, config.audio.sample_rate, 1).unwrap();
        let mut engine = Engine::new(&config, backend);
        engine.start().unwrap();
        for _ in 0..10 {
            engine.process().unwrap();
        }
        engine.finish();
        engine.into_backend().finalize().unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.duration(), 640);
        let samples: Vec<i16> = reader.into_samples().map(|s| s.unwrap()).collect();
        assert!(samples.iter().any(|&s| s.abs() > 1000));
    }

    #[test]
    fn test_smoothing_for() {
        let config = test_config();
        let (frequency, amplitude) = smoothing_for(&config);
        assert!((frequency.min_significant_difference - 0.01 / 44100.0).abs() < 1e-18);
        assert_eq!(amplitude.min_significant_difference, 1.0);
    }
}
