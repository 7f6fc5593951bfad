//! Block waveform generator
//!
//! Produces fixed-size blocks of 16-bit PCM from a smoothed frequency and
//! amplitude. The phase offset is carried from one block to the next so that
//! concatenated blocks form one continuous signal.

use super::shape::wrap_phase;
use super::{Shape, SmoothedValue, SmoothingParams};

/// PCM sample type handed to audio backends
pub type Sample = i16;

/// Bit depth of [`Sample`]
pub const SAMPLE_BITS: u16 = Sample::BITS as u16;

/// Sample rate the default frequency threshold is converted at
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Smallest frequency change worth smoothing toward, in Hz
pub const DEFAULT_FREQUENCY_THRESHOLD_HZ: f64 = 0.01;

/// Frequency smoothing used when none is configured (frequency in cycles/sample).
///
/// Equal to the configuration default at [`DEFAULT_SAMPLE_RATE`].
pub const DEFAULT_FREQUENCY_SMOOTHING: SmoothingParams = SmoothingParams {
    increment_weight: 0.3,
    decrement_weight: 0.3,
    min_significant_difference: DEFAULT_FREQUENCY_THRESHOLD_HZ / DEFAULT_SAMPLE_RATE as f64,
};

/// Amplitude smoothing used when none is configured.
///
/// Levels fall faster than they rise so releases stay tight while attacks
/// stay soft.
pub const DEFAULT_AMPLITUDE_SMOOTHING: SmoothingParams = SmoothingParams {
    increment_weight: 0.1,
    decrement_weight: 0.25,
    min_significant_difference: 1.0,
};

/// Round and clamp a synthesized value into the sample range (never wraps)
#[inline]
pub fn to_sample(value: f64) -> Sample {
    if value.is_nan() {
        return 0;
    }
    value
        .round()
        .clamp(Sample::MIN as f64, Sample::MAX as f64) as Sample
}

/// A phase-continuous block generator
#[derive(Debug, Clone)]
pub struct Waveform {
    shape: Shape,
    /// Cycles per sample
    frequency: SmoothedValue<f64>,
    /// Peak level in sample units
    amplitude: SmoothedValue<f64>,
    /// Phase at the start of the next block, in [0, 1)
    offset: f64,
    samples: Box<[Sample]>,
    /// Whether `samples` holds a generated block yet
    primed: bool,
}

impl Waveform {
    /// Create a generator.
    ///
    /// `frequency` is in cycles per sample, `amplitude` in sample units and
    /// `offset` in cycles.
    pub fn new(shape: Shape, frequency: f64, amplitude: f64, offset: f64, block_size: usize) -> Self {
        Self {
            shape,
            frequency: smoothed(frequency, DEFAULT_FREQUENCY_SMOOTHING),
            amplitude: smoothed(amplitude, DEFAULT_AMPLITUDE_SMOOTHING),
            offset: wrap_phase(offset),
            samples: vec![0; block_size].into_boxed_slice(),
            primed: false,
        }
    }

    /// Replace the smoothing of both controls (builder pattern)
    pub fn with_smoothing(mut self, frequency: SmoothingParams, amplitude: SmoothingParams) -> Self {
        self.frequency = smoothed(self.frequency.target(), frequency);
        self.amplitude = smoothed(self.amplitude.target(), amplitude);
        self
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    /// Number of samples per block
    pub fn block_size(&self) -> usize {
        self.samples.len()
    }

    /// The most recently generated block
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn frequency(&self) -> &SmoothedValue<f64> {
        &self.frequency
    }

    pub fn amplitude(&self) -> &SmoothedValue<f64> {
        &self.amplitude
    }

    /// Phase the next block starts at
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Steer the frequency (cycles per sample)
    pub fn set_frequency(&mut self, frequency: f64) {
        self.frequency.set_target(frequency);
    }

    /// Steer the amplitude (sample units)
    pub fn set_amplitude(&mut self, amplitude: f64) {
        self.amplitude.set_target(amplitude);
    }

    /// Settle the controls once so the first block is built from committed values
    pub fn start(&mut self) {
        self.process();
    }

    /// Advance both controls by one tick
    pub fn process(&mut self) {
        self.frequency.commit();
        self.amplitude.commit();
    }

    /// Regenerate the sample block. Returns false when the previous block was reused.
    ///
    /// Frequency and amplitude are interpolated per sample across the block
    /// (sample `i` uses `advance(i / block_size)`), so a control change ramps
    /// in rather than stepping at the block boundary. The block is reused
    /// unchanged when neither control is moving and the phase offset would
    /// come out bit-identical.
    pub fn fill_sample_block(&mut self) -> bool {
        let block_size = self.samples.len();
        let end_frequency = self.frequency.advance(1.0);
        let next_offset = wrap_phase(block_size as f64 * end_frequency + self.offset);

        if self.primed
            && !self.frequency.has_significant_gap()
            && !self.amplitude.has_significant_gap()
            && next_offset.to_bits() == self.offset.to_bits()
        {
            return false;
        }

        for (i, sample) in self.samples.iter_mut().enumerate() {
            let proportion = i as f64 / block_size as f64;
            let frequency = self.frequency.advance(proportion);
            let amplitude = self.amplitude.advance(proportion);
            let phase = i as f64 * frequency + self.offset;
            *sample = to_sample(amplitude * self.shape.value_at(phase));
        }

        self.offset = next_offset;
        self.primed = true;
        tracing::trace!(shape = self.shape.name(), offset = self.offset, "sample block filled");
        true
    }
}

fn smoothed(value: f64, params: SmoothingParams) -> SmoothedValue<f64> {
    SmoothedValue::new(value, params.min_significant_difference)
        .with_weights(params.increment_weight, params.decrement_weight)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_block_sine() {
        let mut wave = Waveform::new(Shape::Sine, 0.01, 10000.0, 0.0, 8);
        wave.start();

        assert!(wave.fill_sample_block());
        assert_eq!(wave.samples()[0], 0);
        for (i, &sample) in wave.samples().iter().enumerate() {
            let expected = (10000.0 * Shape::Sine.value_at(i as f64 * 0.01)).round() as i16;
            assert_eq!(sample, expected, "sample {}", i);
        }
        assert!((wave.offset() - 0.08).abs() < 1e-12);
    }

    #[test]
    fn test_saw_block() {
        let mut wave = Waveform::new(Shape::Saw, 0.25, 1000.0, 0.0, 8);
        wave.start();
        wave.fill_sample_block();

        assert_eq!(wave.samples(), &[0, 250, 500, 750, 0, 250, 500, 750]);
    }

    #[test]
    fn test_phase_continuity_across_blocks() {
        let frequency = 0.013;
        let block_size = 64;
        let mut wave = Waveform::new(Shape::Sine, frequency, 12000.0, 0.0, block_size);
        wave.start();

        let mut stream = Vec::new();
        for _ in 0..10 {
            let offset_before = wave.offset();
            wave.fill_sample_block();
            stream.extend_from_slice(wave.samples());

            let virtual_end = wrap_phase(block_size as f64 * frequency + offset_before);
            let gap = (virtual_end - wave.offset()).abs();
            assert!(gap < 1e-9 || (1.0 - gap) < 1e-9, "phase jump of {}", gap);
        }

        for (j, &sample) in stream.iter().enumerate() {
            let expected = to_sample(12000.0 * Shape::Sine.value_at(j as f64 * frequency));
            assert!(
                (sample as i32 - expected as i32).abs() <= 1,
                "discontinuity at {}: {} vs {}",
                j,
                sample,
                expected
            );
        }
    }

    #[test]
    fn test_offset_stays_in_unit_range() {
        let mut wave = Waveform::new(Shape::Saw, -0.037, 1000.0, 0.9, 100);
        wave.start();
        for _ in 0..50 {
            wave.fill_sample_block();
            assert!((0.0..1.0).contains(&wave.offset()));
        }
    }

    #[test]
    fn test_clamps_instead_of_wrapping() {
        let mut wave = Waveform::new(Shape::Sine, 0.5, 1e9, 0.25, 16);
        wave.start();
        wave.fill_sample_block();
        for (i, &sample) in wave.samples().iter().enumerate() {
            let expected = if i % 2 == 0 { i16::MAX } else { i16::MIN };
            assert_eq!(sample, expected, "sample {}", i);
        }

        let mut saw = Waveform::new(Shape::Saw, 0.01, 1e9, 0.1, 16);
        saw.start();
        saw.fill_sample_block();
        assert!(saw.samples().iter().all(|&s| s == i16::MAX));
    }

    #[test]
    fn test_to_sample() {
        assert_eq!(to_sample(0.4), 0);
        assert_eq!(to_sample(0.6), 1);
        assert_eq!(to_sample(-70000.0), i16::MIN);
        assert_eq!(to_sample(70000.0), i16::MAX);
        assert_eq!(to_sample(f64::NAN), 0);
        assert_eq!(SAMPLE_BITS, 16);
    }

    #[test]
    fn test_reuses_block_when_nothing_changes() {
        // Eight samples per cycle: a full block leaves the offset where it was
        let mut wave = Waveform::new(Shape::Sine, 0.125, 5000.0, 0.0, 8);
        wave.start();

        assert!(wave.fill_sample_block());
        let first = wave.samples().to_vec();
        assert!(!wave.fill_sample_block());
        assert_eq!(wave.samples(), first.as_slice());

        wave.set_amplitude(8000.0);
        assert!(wave.fill_sample_block());
        assert_ne!(wave.samples(), first.as_slice());
    }

    #[test]
    fn test_interpolates_within_block() {
        let mut wave = Waveform::new(Shape::Saw, 0.0, 0.0, 0.5, 4).with_smoothing(
            DEFAULT_FREQUENCY_SMOOTHING,
            SmoothingParams {
                increment_weight: 1.0,
                decrement_weight: 1.0,
                min_significant_difference: 0.5,
            },
        );
        wave.start();
        wave.set_amplitude(1000.0);
        wave.fill_sample_block();

        // Amplitude ramps 0, 250, 500, 750 across the block at phase 0.5
        assert_eq!(wave.samples(), &[0, 125, 250, 375]);
        assert_eq!(wave.amplitude().current(), 0.0);

        wave.process();
        assert_eq!(wave.amplitude().current(), 1000.0);
    }

    #[test]
    fn test_start_commits_pending_targets() {
        let mut wave = Waveform::new(Shape::Sine, 0.01, 100.0, 0.0, 8);
        wave.set_amplitude(200.0);
        wave.start();
        assert!(wave.amplitude().current() > 100.0);
    }
}
