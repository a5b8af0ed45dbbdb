//! Speed functors shared by the preprocessing pipeline and the UI curve plots.

use crate::collab::ChannelStats;
use crate::config::{EdgePreprocessingSettings, ThresholdSettings};
use crate::mapping::IntensityMapping;

/// Internal encoding of a unit speed value.
pub const SPEED_INTERNAL_SCALE: f64 = 32767.0;

/// Mapping used by speed fields encoded with [`SPEED_INTERNAL_SCALE`].
pub fn default_speed_mapping() -> IntensityMapping {
    IntensityMapping::new(1.0 / SPEED_INTERNAL_SCALE, 0.0)
}

/// Smoothed two-sided threshold producing internal speed values in `[-S, S]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothThresholdFunctor {
    lower: f64,
    upper: f64,
    lower_factor: f64,
    upper_factor: f64,
    shift: f64,
    inv_width: f64,
}

impl SmoothThresholdFunctor {
    /// `imin`/`imax` are the internal intensity bounds of the input layer.
    pub fn new(settings: &ThresholdSettings, imin: f64, imax: f64) -> Self {
        let lower_factor = if settings.is_lower_enabled() { 1.0 } else { 0.0 };
        let upper_factor = if settings.is_upper_enabled() { 1.0 } else { 0.0 };
        let span = (imax - imin).abs().max(f64::EPSILON);
        // Smoothness 10 spreads the transition over a tenth of the range.
        let width = (settings.smoothness.max(0.0) / 100.0 * span).max(span * 1e-6);
        Self {
            lower: settings.lower(),
            upper: settings.upper(),
            lower_factor,
            upper_factor,
            shift: 1.0 - (lower_factor + upper_factor),
            inv_width: 1.0 / width,
        }
    }

    pub fn apply(&self, x: f64) -> f64 {
        let y_lower = self.lower_factor * ((x - self.lower) * self.inv_width).tanh();
        let y_upper = self.upper_factor * ((self.upper - x) * self.inv_width).tanh();
        (y_lower + y_upper + self.shift) * SPEED_INTERNAL_SCALE
    }
}

/// Maps gradient magnitude to an internal speed in `[0, S]`; edges slow the contour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeRemappingFunctor {
    min: f64,
    inv_span: f64,
    exponent: f64,
    kappa: f64,
}

impl EdgeRemappingFunctor {
    pub fn new(settings: &EdgePreprocessingSettings, min: f64, max: f64) -> Self {
        Self {
            min,
            inv_span: 1.0 / (max - min).abs().max(f64::EPSILON),
            exponent: settings.exponent,
            kappa: settings.kappa.max(f64::EPSILON),
        }
    }

    pub fn apply(&self, x: f64) -> f64 {
        let normalized = ((x - self.min) * self.inv_span).max(0.0);
        SPEED_INTERNAL_SCALE / (1.0 + (normalized / self.kappa).powf(self.exponent))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum CurveKind {
    Threshold {
        functor: SmoothThresholdFunctor,
        input: IntensityMapping,
        imin: f64,
        imax: f64,
    },
    Edge {
        functor: EdgeRemappingFunctor,
        xlim: f64,
    },
}

/// `n` evenly spaced `(x_native, speed_native)` samples of a speed functor.
///
/// Lazy and finite; clone it or call [`SpeedCurve::restart`] to iterate again.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedCurve {
    kind: CurveKind,
    speed: IntensityMapping,
    n: usize,
    next: usize,
}

impl SpeedCurve {
    pub fn threshold(
        settings: &ThresholdSettings,
        stats: &ChannelStats,
        speed: IntensityMapping,
        n: usize,
    ) -> Self {
        let functor = SmoothThresholdFunctor::new(settings, stats.min_internal, stats.max_internal);
        Self {
            kind: CurveKind::Threshold {
                functor,
                input: stats.mapping,
                imin: stats.min_internal,
                imax: stats.max_internal,
            },
            speed,
            n,
            next: 0,
        }
    }

    pub fn edge(
        settings: &EdgePreprocessingSettings,
        stats: &ChannelStats,
        speed: IntensityMapping,
        n: usize,
    ) -> Self {
        let xlim = stats.gradient_magnitude_limit;
        Self {
            kind: CurveKind::Edge {
                functor: EdgeRemappingFunctor::new(settings, 0.0, xlim),
                xlim,
            },
            speed,
            n,
            next: 0,
        }
    }

    pub fn restart(&mut self) {
        self.next = 0;
    }

    fn sample(&self, i: usize) -> (f64, f64) {
        let t = if self.n > 1 {
            i as f64 / (self.n - 1) as f64
        } else {
            0.0
        };
        match self.kind {
            CurveKind::Threshold {
                functor,
                input,
                imin,
                imax,
            } => {
                let x_internal = imin + t * (imax - imin);
                (
                    input.to_native(x_internal),
                    self.speed.to_native(functor.apply(x_internal)),
                )
            }
            CurveKind::Edge { functor, xlim } => {
                let x = t * xlim;
                (x, self.speed.to_native(functor.apply(x)))
            }
        }
    }
}

impl Iterator for SpeedCurve {
    type Item = (f64, f64);

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.n {
            return None;
        }
        let item = self.sample(self.next);
        self.next += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.n - self.next;
        (left, Some(left))
    }
}

impl ExactSizeIterator for SpeedCurve {}
