//! Synthesis primitives
//!
//! Smoothed controls, waveform shapes, and the block generator built on them.

mod shape;
mod smoothed;
mod waveform;

pub use shape::{wrap_phase, Shape};
pub use smoothed::{Smoothable, SmoothedValue, SmoothingParams, DEFAULT_WEIGHT};
pub use waveform::{
    to_sample, Sample, Waveform, DEFAULT_AMPLITUDE_SMOOTHING, DEFAULT_FREQUENCY_SMOOTHING,
    DEFAULT_FREQUENCY_THRESHOLD_HZ, DEFAULT_SAMPLE_RATE, SAMPLE_BITS,
};
