//! Scalar per-element arithmetic shared by the sequential layers and the
//! batch engine.
//!
//! The layer implementations and [`crate::batch`] both call these functions
//! for every element they touch, in the same order, so the batched path
//! reproduces the sequential path bit for bit.

use crate::core::ShuntingParameters;
use crate::params::Layer6Parameters;
use std::ops::Range;

/// Weight of the persistent modulation state in the Layer6 modulation signal.
pub const PERSISTENCE_WEIGHT: f64 = 0.5;

/// Clamp `x` into `[floor, ceiling]`.
#[inline]
pub fn saturate(x: f64, floor: f64, ceiling: f64) -> f64 {
    x.max(floor).min(ceiling)
}

/// One explicit-Euler step of the shunting equation for a single unit.
#[inline]
pub fn shunting_update(x: f64, excitatory: f64, inhibitory: f64, p: &ShuntingParameters) -> f64 {
    let e = excitatory + p.self_excitation * x;
    let i = p.inhibitory_strength * inhibitory;
    let dx = -p.decay * x + (p.ceiling - x) * e - (x + p.floor_gain) * i;
    saturate(x + p.time_step * dx, p.floor, p.ceiling)
}

/// Indices within `radius` of `center`, clipped to `0..len`.
#[inline]
pub fn surround_window(center: usize, len: usize, radius: usize) -> Range<usize> {
    center.saturating_sub(radius)..center.saturating_add(radius).saturating_add(1).min(len)
}

/// Sum of `value(j)` over the surround of `center`, excluding `center`.
///
/// Indices are visited in ascending order.
#[inline]
pub fn surround_sum(center: usize, len: usize, radius: usize, value: impl Fn(usize) -> f64) -> f64 {
    let mut sum = 0.0;
    for j in surround_window(center, len, radius) {
        if j != center {
            sum += value(j);
        }
    }
    sum
}

/// Rectified on-center/off-surround modulation for one Layer6 unit.
#[inline]
pub fn modulation_signal(
    center: f64,
    surround: f64,
    persistent: f64,
    p: &Layer6Parameters,
) -> f64 {
    (p.on_center_gain * center - p.off_surround_strength * surround
        + PERSISTENCE_WEIGHT * persistent)
        .max(0.0)
}

/// ART matching rule for one Layer6 unit.
///
/// Without bottom-up support the output is zero whatever the modulation.
/// A NaN input never counts as support.
#[inline]
pub fn art_match(bottom_up: f64, modulation: f64, p: &Layer6Parameters) -> f64 {
    if !has_support(bottom_up, p) {
        return 0.0;
    }
    if modulation > p.modulation_threshold {
        (bottom_up * (1.0 + modulation * p.attentional_gain)).min(p.ceiling)
    } else {
        bottom_up.min(p.ceiling)
    }
}

/// Whether `bottom_up` strictly exceeds the Layer6 floor.
#[inline]
pub fn has_support(bottom_up: f64, p: &Layer6Parameters) -> bool {
    bottom_up > p.floor
}

/// Leaky integration `(1 − rate)·state + rate·signal`.
#[inline]
pub fn leaky_integrate(state: f64, signal: f64, rate: f64) -> f64 {
    (1.0 - rate) * state + rate * signal
}
