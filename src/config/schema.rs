//! Configuration schema definitions

use crate::synth::{Shape, SmoothingParams, DEFAULT_FREQUENCY_THRESHOLD_HZ, DEFAULT_SAMPLE_RATE};
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Main configuration for Chamber
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChamberConfig {
    /// Audio output settings
    #[serde(default)]
    pub audio: AudioConfig,

    /// Frame loop rate in Hz for real-time playback (default: 60)
    #[serde(default = "default_tick_rate")]
    pub tick_rate: u32,

    /// Control smoothing
    #[serde(default)]
    pub smoothing: SmoothingConfig,

    /// Resonance search tuning
    #[serde(default)]
    pub resonance: ResonanceConfig,

    /// Directly driven oscillators
    #[serde(default)]
    pub voices: Vec<VoiceConfig>,

    /// Oscillators excited by the voices through resonance
    #[serde(default)]
    pub resonators: Vec<ResonatorConfig>,
}

fn default_tick_rate() -> u32 { 60 }

impl Default for ChamberConfig {
    fn default() -> Self {
        Self {
            audio: AudioConfig::default(),
            tick_rate: default_tick_rate(),
            smoothing: SmoothingConfig::default(),
            resonance: ResonanceConfig::default(),
            voices: Vec::new(),
            resonators: Vec::new(),
        }
    }
}

impl ChamberConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        // Validate audio settings
        if self.audio.sample_rate < 8000 || self.audio.sample_rate > 192000 {
            bail!("Sample rate must be between 8000 and 192000");
        }
        if self.audio.block_size < 64 || self.audio.block_size > 16384 {
            bail!("Block size must be between 64 and 16384");
        }
        if self.audio.channels == 0 || self.audio.channels > 8 {
            bail!("Channel count must be between 1 and 8");
        }
        if self.tick_rate == 0 || self.tick_rate > 1000 {
            bail!("Tick rate must be between 1 and 1000");
        }

        self.smoothing.frequency.validate("frequency")?;
        self.smoothing.amplitude.validate("amplitude")?;
        self.resonance.validate()?;

        let mut names = HashSet::new();
        for voice in &self.voices {
            if !names.insert(voice.name.as_str()) {
                bail!("Duplicate name '{}'", voice.name);
            }
            if !voice.frequency.is_finite() || !voice.amplitude.is_finite() {
                bail!("Voice '{}' must have a finite frequency and amplitude", voice.name);
            }
            if !(0.0..1.0).contains(&voice.offset) {
                bail!("Voice '{}' offset must be in [0, 1)", voice.name);
            }
        }
        for resonator in &self.resonators {
            if !names.insert(resonator.name.as_str()) {
                bail!("Duplicate name '{}'", resonator.name);
            }
            if !resonator.frequency.is_finite() || !resonator.gain.is_finite() {
                bail!("Resonator '{}' must have a finite frequency and gain", resonator.name);
            }
        }

        Ok(())
    }
}

/// Audio output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Sample rate in Hz (default: 44100)
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Samples per block handed to the backend (default: 4096)
    #[serde(default = "default_block_size")]
    pub block_size: usize,

    /// Output channels; mono blocks are copied to each (default: 1)
    #[serde(default = "default_channels")]
    pub channels: u16,

    /// Output device name (None = default device)
    pub device: Option<String>,
}

fn default_sample_rate() -> u32 { DEFAULT_SAMPLE_RATE }
fn default_block_size() -> usize { 4096 }
fn default_channels() -> u16 { 1 }

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            block_size: default_block_size(),
            channels: default_channels(),
            device: None,
        }
    }
}

/// Smoothing for both waveform controls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmoothingConfig {
    /// Frequency smoothing (threshold in Hz)
    #[serde(default = "default_frequency_smoothing")]
    pub frequency: SmoothingSettings,

    /// Amplitude smoothing (threshold in sample units)
    #[serde(default = "default_amplitude_smoothing")]
    pub amplitude: SmoothingSettings,
}

fn default_frequency_smoothing() -> SmoothingSettings {
    SmoothingSettings {
        increment_weight: 0.3,
        decrement_weight: 0.3,
        min_significant_difference: DEFAULT_FREQUENCY_THRESHOLD_HZ,
    }
}

fn default_amplitude_smoothing() -> SmoothingSettings {
    SmoothingSettings {
        increment_weight: 0.1,
        decrement_weight: 0.25,
        min_significant_difference: 1.0,
    }
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            frequency: default_frequency_smoothing(),
            amplitude: default_amplitude_smoothing(),
        }
    }
}

/// Weights and threshold for one control
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SmoothingSettings {
    /// Fraction of the gap closed per tick when rising, in (0, 1]
    pub increment_weight: f64,

    /// Fraction of the gap closed per tick when falling, in (0, 1]
    pub decrement_weight: f64,

    /// Smallest gap still worth moving for
    pub min_significant_difference: f64,
}

impl SmoothingSettings {
    fn validate(&self, control: &str) -> Result<()> {
        for weight in [self.increment_weight, self.decrement_weight] {
            if !(weight > 0.0 && weight <= 1.0) {
                bail!("{} smoothing weights must be in (0, 1]", control);
            }
        }
        // A zero threshold never reports settled
        if !(self.min_significant_difference > 0.0) || !self.min_significant_difference.is_finite() {
            bail!("{} smoothing threshold must be a positive number", control);
        }
        Ok(())
    }

    /// Smoothing parameters with the threshold divided by `scale`
    ///
    /// Frequency thresholds are written in Hz and applied in cycles per sample.
    pub fn to_params(&self, scale: f64) -> SmoothingParams {
        SmoothingParams {
            increment_weight: self.increment_weight,
            decrement_weight: self.decrement_weight,
            min_significant_difference: self.min_significant_difference / scale,
        }
    }
}

/// Resonance search settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResonanceConfig {
    /// Ratio distance that counts as a match (default: 0.01)
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    /// Factor kept per step along integer ratios (default: 0.8)
    #[serde(default = "default_adjacent_step_decay")]
    pub adjacent_step_decay: f64,

    /// Factor kept per refinement step (default: 0.5)
    #[serde(default = "default_new_peak_decay")]
    pub new_peak_decay: f64,

    /// Search step limit (default: 4096)
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

fn default_tolerance() -> f64 { 0.01 }
fn default_adjacent_step_decay() -> f64 { 0.8 }
fn default_new_peak_decay() -> f64 { 0.5 }
fn default_max_iterations() -> u32 { 4096 }

impl Default for ResonanceConfig {
    fn default() -> Self {
        Self {
            tolerance: default_tolerance(),
            adjacent_step_decay: default_adjacent_step_decay(),
            new_peak_decay: default_new_peak_decay(),
            max_iterations: default_max_iterations(),
        }
    }
}

impl ResonanceConfig {
    fn validate(&self) -> Result<()> {
        if !(self.tolerance > 0.0) || !self.tolerance.is_finite() {
            bail!("Resonance tolerance must be positive");
        }
        for decay in [self.adjacent_step_decay, self.new_peak_decay] {
            if !(decay > 0.0 && decay <= 1.0) {
                bail!("Resonance decays must be in (0, 1]");
            }
        }
        if self.max_iterations == 0 {
            bail!("Resonance max_iterations must be at least 1");
        }
        Ok(())
    }
}

/// A directly driven oscillator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceConfig {
    /// Unique name for this voice
    pub name: String,

    /// Waveform shape (default: sine)
    #[serde(default)]
    pub shape: Shape,

    /// Frequency in Hz
    pub frequency: f64,

    /// Peak amplitude in sample units
    pub amplitude: f64,

    /// Initial phase in cycles, [0, 1) (default: 0)
    #[serde(default)]
    pub offset: f64,

    /// Whether the voice sounds at start (default: true)
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool { true }

/// An oscillator whose level follows the resonance of the voices
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResonatorConfig {
    /// Unique name for this resonator
    pub name: String,

    /// Waveform shape (default: sine)
    #[serde(default)]
    pub shape: Shape,

    /// Frequency in Hz
    pub frequency: f64,

    /// Scale applied to the summed excitation (default: 1.0)
    #[serde(default = "default_gain")]
    pub gain: f64,
}

fn default_gain() -> f64 { 1.0 }

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ChamberConfig {
        ChamberConfig {
            voices: vec![VoiceConfig {
                name: "root".to_string(),
                shape: Shape::Sine,
                frequency: 220.0,
                amplitude: 8000.0,
                offset: 0.0,
                active: true,
            }],
            resonators: vec![ResonatorConfig {
                name: "body".to_string(),
                shape: Shape::Saw,
                frequency: 440.0,
                gain: 0.5,
            }],
            ..ChamberConfig::default()
        }
    }

    #[test]
    fn test_default_audio_config() {
        let yaml = "sample_rate: 48000";
        let config: AudioConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.sample_rate, 48000);
        assert_eq!(config.block_size, 4096); // default
        assert_eq!(config.channels, 1);
    }

    #[test]
    fn test_voice_config() {
        let yaml = r#"
name: lead
shape: saw
frequency: 330.0
amplitude: 12000
"#;
        let config: VoiceConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.name, "lead");
        assert_eq!(config.shape, Shape::Saw);
        assert_eq!(config.offset, 0.0);
        assert!(config.active);
    }

    #[test]
    fn test_resonator_config() {
        let yaml = r#"
name: body
frequency: 110
"#;
        let config: ResonatorConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.shape, Shape::Sine);
        assert_eq!(config.gain, 1.0);
    }

    #[test]
    fn test_config_validation() {
        assert!(test_config().validate().is_ok());
        assert!(ChamberConfig::default().validate().is_ok());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut config = test_config();
        config.resonators[0].name = "root".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_weights_rejected() {
        let mut config = test_config();
        config.smoothing.amplitude.decrement_weight = 0.0;
        assert!(config.validate().is_err());

        let mut config = test_config();
        config.smoothing.frequency.increment_weight = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let mut config = test_config();
        config.smoothing.amplitude.min_significant_difference = 0.0;
        assert!(config.validate().is_err());

        let mut config = test_config();
        config.smoothing.frequency.min_significant_difference = -0.01;
        assert!(config.validate().is_err());

        let mut config = test_config();
        config.smoothing.frequency.min_significant_difference = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_smoothing_matches_waveform_defaults() {
        use crate::synth::{DEFAULT_AMPLITUDE_SMOOTHING, DEFAULT_FREQUENCY_SMOOTHING};

        let smoothing = SmoothingConfig::default();
        let frequency = smoothing.frequency.to_params(DEFAULT_SAMPLE_RATE as f64);
        assert_eq!(frequency, DEFAULT_FREQUENCY_SMOOTHING);
        assert_eq!(smoothing.amplitude.to_params(1.0), DEFAULT_AMPLITUDE_SMOOTHING);
        assert_eq!(AudioConfig::default().sample_rate, DEFAULT_SAMPLE_RATE);
    }

    #[test]
    fn test_invalid_offset_rejected() {
        let mut config = test_config();
        config.voices[0].offset = 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_resonance_rejected() {
        let mut config = test_config();
        config.resonance.tolerance = 0.0;
        assert!(config.validate().is_err());

        let mut config = test_config();
        config.resonance.max_iterations = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_to_params_scales_threshold() {
        let settings = default_frequency_smoothing();
        let params = settings.to_params(100.0);
        assert!((params.min_significant_difference - 0.0001).abs() < 1e-15);
        assert_eq!(params.increment_weight, 0.3);
    }
}
