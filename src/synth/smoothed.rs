//! Smoothed control values
//!
//! A control parameter that moves a fixed fraction of the way toward its
//! target on every tick instead of jumping, so that pitch and level changes
//! never produce an audible step.

use std::fmt::Debug;
use std::ops::{Add, Sub};

/// Default weight for both directions when none is given
pub const DEFAULT_WEIGHT: f64 = 0.8;

/// Numeric types a [`SmoothedValue`] can carry
pub trait Smoothable: Copy + Debug + PartialOrd + Add<Output = Self> + Sub<Output = Self> {
    /// Absolute value
    fn magnitude(self) -> Self;

    /// Multiply by a floating-point weight
    fn scale(self, factor: f64) -> Self;

    /// The additive identity
    fn zero() -> Self;
}

macro_rules! impl_smoothable {
    ($($t:ty),*) => {
        $(
            impl Smoothable for $t {
                #[inline]
                fn magnitude(self) -> Self {
                    self.abs()
                }

                #[inline]
                fn scale(self, factor: f64) -> Self {
                    (self as f64 * factor) as $t
                }

                #[inline]
                fn zero() -> Self {
                    0.0
                }
            }
        )*
    };
}

impl_smoothable!(f32, f64);

/// Weights and threshold for one smoothed control
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothingParams {
    /// Fraction of the gap closed per tick when rising, in (0, 1]
    pub increment_weight: f64,
    /// Fraction of the gap closed per tick when falling, in (0, 1]
    pub decrement_weight: f64,
    /// Gaps smaller than this are treated as already settled
    pub min_significant_difference: f64,
}

/// A value that approaches its target a fraction of the remaining gap per tick.
///
/// `current` is only ever changed by [`commit`](Self::commit); callers steer
/// the value through [`set_target`](Self::set_target).
#[derive(Debug, Clone)]
pub struct SmoothedValue<T: Smoothable> {
    current: T,
    target: T,
    min_significant_difference: T,
    increment_weight: f64,
    decrement_weight: f64,
}

impl<T: Smoothable> SmoothedValue<T> {
    /// Create a settled value (current == target) with the default weights.
    ///
    /// Panics unless `min_significant_difference` is positive: with a zero
    /// threshold the value would never report itself settled.
    pub fn new(value: T, min_significant_difference: T) -> Self {
        assert!(
            min_significant_difference > T::zero(),
            "smoothing threshold must be positive, got {:?}",
            min_significant_difference
        );
        Self {
            current: value,
            target: value,
            min_significant_difference,
            increment_weight: DEFAULT_WEIGHT,
            decrement_weight: DEFAULT_WEIGHT,
        }
    }

    /// Set the rising and falling weights (builder pattern)
    pub fn with_weights(mut self, increment_weight: f64, decrement_weight: f64) -> Self {
        self.increment_weight = increment_weight;
        self.decrement_weight = decrement_weight;
        self
    }

    /// The value as of the last commit
    pub fn current(&self) -> T {
        self.current
    }

    /// The value being approached
    pub fn target(&self) -> T {
        self.target
    }

    /// Steer toward a new value
    pub fn set_target(&mut self, target: T) {
        self.target = target;
    }

    /// Signed remaining gap (`target - current`)
    pub fn difference(&self) -> T {
        self.target - self.current
    }

    pub fn min_significant_difference(&self) -> T {
        self.min_significant_difference
    }

    pub fn increment_weight(&self) -> f64 {
        self.increment_weight
    }

    pub fn decrement_weight(&self) -> f64 {
        self.decrement_weight
    }

    /// The value one tick ahead, scaled by `step_factor`, without changing state.
    ///
    /// A `step_factor` of 1.0 is a full tick; fractions in between blend
    /// linearly, which lets a block generator interpolate within a block.
    /// Gaps below the significance threshold return `current` unchanged.
    pub fn advance(&self, step_factor: f64) -> T {
        let difference = self.difference();
        if difference.magnitude() < self.min_significant_difference {
            return self.current;
        }
        let weight = if difference < T::zero() {
            self.decrement_weight
        } else {
            self.increment_weight
        };
        self.current + difference.scale(weight * step_factor)
    }

    /// Move `current` one full tick toward the target
    pub fn commit(&mut self) {
        self.current = self.advance(1.0);
    }

    /// Whether the remaining gap is at or above the significance threshold.
    ///
    /// An older revision of this check returned true for gaps *below* the
    /// threshold, the opposite of how every caller reads it.
    pub fn has_significant_gap(&self) -> bool {
        self.difference().magnitude() >= self.min_significant_difference
    }
}
