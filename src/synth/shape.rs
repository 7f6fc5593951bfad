//! Waveform shapes

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// The curve a [`Waveform`](super::Waveform) traces over one cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    /// `sin(2π·phase)`
    #[default]
    Sine,
    /// Rising ramp over `[0, 1)` that resets each cycle
    Saw,
}

impl Shape {
    /// Unit-amplitude value at `phase` (in cycles, any real)
    #[inline]
    pub fn value_at(self, phase: f64) -> f64 {
        match self {
            Shape::Sine => (2.0 * PI * phase).sin(),
            Shape::Saw => wrap_phase(phase),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Shape::Sine => "sine",
            Shape::Saw => "saw",
        }
    }
}

/// Fractional part of `phase`, always in `[0, 1)` (negative phases included)
#[inline]
pub fn wrap_phase(phase: f64) -> f64 {
    let wrapped = phase.rem_euclid(1.0);
    // rem_euclid rounds tiny negative inputs up to exactly 1.0
    if wrapped >= 1.0 { 0.0 } else { wrapped }
}
