//! Bridges between internally stored scalars and the values/ranges shown to users.

use serde::{Deserialize, Serialize};

use crate::collab::ChannelStats;
use crate::config::{EdgePreprocessingSettings, ThresholdSettings, SMOOTHNESS_RANGE};
use crate::range::{power_of_ten_step, Bridged, NumericRange};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ThresholdBound {
    Lower,
    Upper,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeParameter {
    Sigma,
    Kappa,
    Exponent,
}

impl EdgeParameter {
    pub fn range(self) -> NumericRange<f64> {
        match self {
            Self::Sigma => EdgePreprocessingSettings::SIGMA_RANGE,
            Self::Kappa => EdgePreprocessingSettings::KAPPA_RANGE,
            Self::Exponent => EdgePreprocessingSettings::EXPONENT_RANGE,
        }
    }

    pub fn get(self, settings: &EdgePreprocessingSettings) -> f64 {
        match self {
            Self::Sigma => settings.sigma,
            Self::Kappa => settings.kappa,
            Self::Exponent => settings.exponent,
        }
    }

    pub fn set(self, settings: &mut EdgePreprocessingSettings, value: f64) {
        match self {
            Self::Sigma => settings.sigma = value,
            Self::Kappa => settings.kappa = value,
            Self::Exponent => settings.exponent = value,
        }
    }
}

/// Native display range of a threshold slider for the given channel.
pub fn threshold_range(stats: &ChannelStats, target_steps: u32) -> NumericRange<f64> {
    let (min, max) = stats.native_range();
    NumericRange::new(min, max, power_of_ten_step(min, max, target_steps))
}

pub fn read_threshold(
    settings: &ThresholdSettings,
    bound: ThresholdBound,
    stats: &ChannelStats,
    target_steps: u32,
) -> Bridged<f64> {
    let internal = match bound {
        ThresholdBound::Lower => settings.lower(),
        ThresholdBound::Upper => settings.upper(),
    };
    Bridged {
        value: stats.mapping.to_native(internal),
        range: threshold_range(stats, target_steps),
    }
}

/// Stores a native threshold; the opposite bound follows so `lower <= upper` holds.
pub fn write_threshold(
    settings: &mut ThresholdSettings,
    bound: ThresholdBound,
    native: f64,
    stats: &ChannelStats,
) {
    let internal = stats.mapping.to_internal(native);
    match bound {
        ThresholdBound::Lower => settings.set_lower(internal),
        ThresholdBound::Upper => settings.set_upper(internal),
    }
}

pub fn read_smoothness(settings: &ThresholdSettings) -> Bridged<f64> {
    Bridged {
        value: settings.smoothness,
        range: SMOOTHNESS_RANGE,
    }
}

pub fn read_edge(settings: &EdgePreprocessingSettings, param: EdgeParameter) -> Bridged<f64> {
    Bridged {
        value: param.get(settings),
        range: param.range(),
    }
}
