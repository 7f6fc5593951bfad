//! Chamber - resonant oscillator chamber
//!
//! Smoothly controlled oscillators stream fixed-size sample blocks to an
//! audio backend, and resonators pick up energy from every voice tuned near
//! a simple ratio of their own frequency.

pub mod config;
pub mod engine;
pub mod resonance;
pub mod synth;

pub use config::ChamberConfig;
pub use engine::Engine;
