//! Linear mapping between the pipeline's internal encoding and native units.

use serde::{Deserialize, Serialize};

/// `native = internal * scale + shift`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntensityMapping {
    pub scale: f64,
    pub shift: f64,
}

impl Default for IntensityMapping {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl IntensityMapping {
    pub const IDENTITY: Self = Self {
        scale: 1.0,
        shift: 0.0,
    };

    pub fn new(scale: f64, shift: f64) -> Self {
        debug_assert!(scale != 0.0, "intensity mapping scale must be non-zero");
        Self { scale, shift }
    }

    pub fn to_native(&self, internal: f64) -> f64 {
        internal * self.scale + self.shift
    }

    pub fn to_internal(&self, native: f64) -> f64 {
        (native - self.shift) / self.scale
    }

    /// Maps an internal interval to native units, keeping `min <= max` for negative scales.
    pub fn native_interval(&self, internal_min: f64, internal_max: f64) -> (f64, f64) {
        let a = self.to_native(internal_min);
        let b = self.to_native(internal_max);
        (a.min(b), a.max(b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_internal_round_trip() {
        let mapping = IntensityMapping::new(0.25, -1024.0);
        for native in [-1024.0, -3.5, 0.0, 17.0, 3071.0] {
            let back = mapping.to_native(mapping.to_internal(native));
            assert!((back - native).abs() < 1e-9, "{native} -> {back}");
        }
    }

    #[test]
    fn negative_scale_interval_is_ordered() {
        let mapping = IntensityMapping::new(-2.0, 10.0);
        let (lo, hi) = mapping.native_interval(0.0, 5.0);
        assert_eq!((lo, hi), (0.0, 10.0));
    }
}
