//! Value/range pairs handed to presentation layers, plus display step helpers.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumericRange<T> {
    pub min: T,
    pub max: T,
    pub step: T,
}

impl<T: Copy + PartialOrd> NumericRange<T> {
    pub fn new(min: T, max: T, step: T) -> Self {
        Self { min, max, step }
    }

    pub fn contains(&self, value: T) -> bool {
        value >= self.min && value <= self.max
    }
}

/// A bridged scalar as shown to the user: current value and its display range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bridged<T> {
    pub value: T,
    pub range: NumericRange<T>,
}

/// Largest power of ten that splits `[min, max]` into at least `target_steps` increments.
///
/// The result keeps the increment count between `target_steps` and
/// `10 * target_steps`. Degenerate ranges fall back to a unit step.
pub fn power_of_ten_step(min: f64, max: f64, target_steps: u32) -> f64 {
    let span = max - min;
    if !(span.is_finite() && span > 0.0) || target_steps == 0 {
        return 1.0;
    }
    let exponent = (span / f64::from(target_steps)).log10().floor();
    10f64.powf(exponent)
}

/// Largest "nice" step (1, 2 or 5 times a power of ten) not exceeding `limit`.
pub fn nice_step_at_most(limit: f64) -> f64 {
    if !(limit.is_finite() && limit > 0.0) {
        return 1.0;
    }
    let exponent = limit.log10().floor() as i32;
    // Decades below 1 are formed as a ratio so 0.1, 0.01 stay exact.
    let base = if exponent >= 0 {
        10f64.powi(exponent)
    } else {
        1.0 / 10f64.powi(-exponent)
    };
    if base * 5.0 <= limit {
        base * 5.0
    } else if base * 2.0 <= limit {
        base * 2.0
    } else {
        base
    }
}
