//! Harmonic resonance coupling
//!
//! Estimates how strongly an oscillator excites a resonator from the ratio of
//! their frequencies. Ratios near simple integer multiples (1:1, 2:1, 3:1, ...)
//! and simple fractions (3:2, 5:4, ...) couple strongly; arbitrary ratios
//! barely couple at all.
//!
//! The search walks outward along integer ratios, then refines by halving the
//! step once it overshoots, shrinking the factor at every move. Results are
//! memoized per ratio for the lifetime of the engine.

use crate::config::ResonanceConfig;
use std::collections::HashMap;

/// Search tuning
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResonanceParams {
    /// Distance from a candidate ratio that counts as a match
    pub tolerance: f64,
    /// Factor kept per step along the current direction
    pub adjacent_step_decay: f64,
    /// Factor kept per overshoot (each halves the step)
    pub new_peak_decay: f64,
    /// Upper bound on search steps
    pub max_iterations: u32,
}

impl Default for ResonanceParams {
    fn default() -> Self {
        Self {
            tolerance: 0.01,
            adjacent_step_decay: 0.8,
            new_peak_decay: 0.5,
            max_iterations: 4096,
        }
    }
}

impl From<&ResonanceConfig> for ResonanceParams {
    fn from(config: &ResonanceConfig) -> Self {
        Self {
            tolerance: config.tolerance,
            adjacent_step_decay: config.adjacent_step_decay,
            new_peak_decay: config.new_peak_decay,
            max_iterations: config.max_iterations,
        }
    }
}

/// Coupling factor for a ratio `>= 1`, without caching.
///
/// Returns the factor accumulated so far if `max_iterations` runs out.
pub fn compute_resonance_factor(ratio: f64, params: &ResonanceParams) -> f64 {
    let mut candidate = 1.0;
    let mut step = 1.0f64;
    let mut factor = 1.0;

    for _ in 0..params.max_iterations {
        let remaining = ratio - candidate;
        let distance = remaining.abs();

        if distance < params.tolerance {
            return lerp(factor, 0.0, distance / params.tolerance);
        }

        if (step > 0.0) == (remaining > 0.0) {
            factor *= params.adjacent_step_decay;
            candidate += step;
        } else {
            factor *= params.new_peak_decay;
            step /= 2.0;
            candidate -= step;
            step = step.abs().copysign(ratio - candidate);
        }
    }

    tracing::debug!(ratio, factor, "resonance search hit iteration limit");
    factor
}

#[inline]
fn lerp(from: f64, to: f64, t: f64) -> f64 {
    from + (to - from) * t
}

/// Append-only map from frequency ratio to coupling factor
#[derive(Debug, Default, Clone)]
pub struct ResonanceCache {
    entries: HashMap<u64, f64>,
}

impl ResonanceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, ratio: f64) -> Option<f64> {
        self.entries.get(&ratio.to_bits()).copied()
    }

    /// Record a factor. Existing entries are never replaced.
    pub fn insert(&mut self, ratio: f64, factor: f64) -> f64 {
        *self.entries.entry(ratio.to_bits()).or_insert(factor)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Memoizing front end for [`compute_resonance_factor`]
#[derive(Debug, Clone)]
pub struct ResonanceEngine {
    params: ResonanceParams,
    cache: ResonanceCache,
    searches: u64,
}

impl ResonanceEngine {
    pub fn new(params: ResonanceParams) -> Self {
        Self {
            params,
            cache: ResonanceCache::new(),
            searches: 0,
        }
    }

    pub fn params(&self) -> &ResonanceParams {
        &self.params
    }

    /// Normalized ratio of two frequencies (`max / min`, so always `>= 1`)
    pub fn ratio(a: f64, b: f64) -> f64 {
        let (low, high) = if a.abs() <= b.abs() { (a.abs(), b.abs()) } else { (b.abs(), a.abs()) };
        high / low
    }

    /// Coupling factor between two frequencies, in [0, 1].
    ///
    /// A silent (zero) or non-finite frequency gives 0 and is not cached.
    pub fn factor(&mut self, a: f64, b: f64) -> f64 {
        let ratio = Self::ratio(a, b);
        if !ratio.is_finite() {
            return 0.0;
        }
        self.factor_for_ratio(ratio)
    }

    /// Coupling factor for an already normalized ratio
    pub fn factor_for_ratio(&mut self, ratio: f64) -> f64 {
        if let Some(factor) = self.cache.get(ratio) {
            return factor;
        }

        self.searches += 1;
        let factor = compute_resonance_factor(ratio, &self.params);
        tracing::trace!(ratio, factor, "resonance factor cached");
        self.cache.insert(ratio, factor)
    }

    /// Number of searches actually run (cache misses)
    pub fn search_count(&self) -> u64 {
        self.searches
    }

    pub fn cache(&self) -> &ResonanceCache {
        &self.cache
    }
}

impl Default for ResonanceEngine {
    fn default() -> Self {
        Self::new(ResonanceParams::default())
    }
}
