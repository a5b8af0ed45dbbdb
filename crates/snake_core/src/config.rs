//! Shared configuration types for the segmentation wizard.

use serde::{Deserialize, Serialize};

use crate::range::NumericRange;

/// Which contour model the session is running, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionMode {
    #[default]
    Inactive,
    ThresholdSnake,
    EdgeSnake,
}

impl SessionMode {
    pub fn is_active(self) -> bool {
        self != Self::Inactive
    }
}

/// Preprocessing stage currently feeding the speed preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PreprocessingStage {
    #[default]
    None,
    Threshold,
    Edge,
    Gmm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ThresholdMode {
    LowerOnly,
    UpperOnly,
    #[default]
    TwoSided,
}

/// Intensity thresholds, stored in the selected layer's internal encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdSettings {
    lower: f64,
    upper: f64,
    pub smoothness: f64,
    pub mode: ThresholdMode,
}

impl Default for ThresholdSettings {
    fn default() -> Self {
        Self {
            lower: 0.0,
            upper: 0.0,
            smoothness: 3.0,
            mode: ThresholdMode::TwoSided,
        }
    }
}

impl ThresholdSettings {
    /// Defaults for an image whose internal intensities span `[min, max]`.
    pub fn for_intensity_range(min: f64, max: f64) -> Self {
        let span = max - min;
        Self {
            lower: min + span / 3.0,
            upper: min + 2.0 * span / 3.0,
            ..Self::default()
        }
    }

    pub fn lower(&self) -> f64 {
        self.lower
    }

    pub fn upper(&self) -> f64 {
        self.upper
    }

    /// Sets the lower bound, raising the upper bound if it would fall below.
    pub fn set_lower(&mut self, value: f64) {
        if value > self.upper {
            self.upper = value;
        }
        self.lower = value;
    }

    /// Sets the upper bound, pulling the lower bound down if it would exceed it.
    pub fn set_upper(&mut self, value: f64) {
        if value < self.lower {
            self.lower = value;
        }
        self.upper = value;
    }

    pub fn is_lower_enabled(&self) -> bool {
        self.mode != ThresholdMode::UpperOnly
    }

    pub fn is_upper_enabled(&self) -> bool {
        self.mode != ThresholdMode::LowerOnly
    }
}

/// Parameters of the gradient-magnitude remapping used by edge snakes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgePreprocessingSettings {
    /// Gaussian blur scale.
    pub sigma: f64,
    /// Remapping steepness.
    pub kappa: f64,
    /// Remapping exponent.
    pub exponent: f64,
}

impl Default for EdgePreprocessingSettings {
    fn default() -> Self {
        Self {
            sigma: 1.0,
            kappa: 0.05,
            exponent: 2.0,
        }
    }
}

impl EdgePreprocessingSettings {
    pub const SIGMA_RANGE: NumericRange<f64> = NumericRange {
        min: 0.1,
        max: 3.0,
        step: 0.1,
    };
    pub const KAPPA_RANGE: NumericRange<f64> = NumericRange {
        min: 0.001,
        max: 0.2,
        step: 0.001,
    };
    pub const EXPONENT_RANGE: NumericRange<f64> = NumericRange {
        min: 1.0,
        max: 4.0,
        step: 0.01,
    };
}

pub const SMOOTHNESS_RANGE: NumericRange<f64> = NumericRange {
    min: 0.0,
    max: 10.0,
    step: 0.1,
};

/// Tunables of a wizard session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Increment count targeted by threshold sliders.
    pub threshold_step_target: u32,
    pub min_clusters: usize,
    pub max_clusters: usize,
    /// Lower sample-count bound, capped by the voxel count.
    pub sample_floor: usize,
    pub sample_step: usize,
    pub min_step_size: usize,
    pub max_step_size: usize,
    pub default_step_size: usize,
    /// Label attached to the undo checkpoint written on commit.
    pub undo_label: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            threshold_step_target: 100,
            min_clusters: 2,
            max_clusters: 20,
            sample_floor: 5000,
            sample_step: 5000,
            min_step_size: 1,
            max_step_size: 100,
            default_step_size: 1,
            undo_label: "Automatic Segmentation".to_owned(),
        }
    }
}

impl SessionConfig {
    pub fn cluster_range(&self) -> NumericRange<usize> {
        NumericRange::new(self.min_clusters, self.max_clusters, 1)
    }

    pub fn sample_range(&self, voxel_count: usize) -> NumericRange<usize> {
        NumericRange::new(
            voxel_count.min(self.sample_floor),
            voxel_count,
            self.sample_step,
        )
    }

    pub fn step_size_range(&self) -> NumericRange<usize> {
        NumericRange::new(self.min_step_size, self.max_step_size, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raising_lower_past_upper_pulls_upper_along() {
        let mut ts = ThresholdSettings::for_intensity_range(0.0, 900.0);
        ts.set_upper(500.0);
        ts.set_lower(600.0);
        assert_eq!(ts.lower(), 600.0);
        assert_eq!(ts.upper(), 600.0);
    }

    #[test]
    fn dropping_upper_below_lower_pulls_lower_down() {
        let mut ts = ThresholdSettings::for_intensity_range(0.0, 900.0);
        ts.set_upper(100.0);
        assert_eq!(ts.lower(), 100.0);
        assert_eq!(ts.upper(), 100.0);
    }

    #[test]
    fn threshold_mode_controls_enabled_bounds() {
        let mut ts = ThresholdSettings::default();
        assert!(ts.is_lower_enabled() && ts.is_upper_enabled());
        ts.mode = ThresholdMode::LowerOnly;
        assert!(ts.is_lower_enabled() && !ts.is_upper_enabled());
        ts.mode = ThresholdMode::UpperOnly;
        assert!(!ts.is_lower_enabled() && ts.is_upper_enabled());
    }

    #[test]
    fn sample_range_is_capped_by_voxel_count() {
        let cfg = SessionConfig::default();
        let small = cfg.sample_range(1200);
        assert_eq!((small.min, small.max), (1200, 1200));
        let large = cfg.sample_range(1_000_000);
        assert_eq!((large.min, large.max), (5000, 1_000_000));
    }
}
