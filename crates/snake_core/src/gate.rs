//! Which wizard pages and controls are currently usable.

use crate::config::{PreprocessingStage, SessionMode, ThresholdSettings};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    ThresholdingEnabled,
    LowerThresholdEnabled,
    UpperThresholdEnabled,
    EdgePreprocessingEnabled,
    SpeedAvailable,
    PreprocessingActive,
    BubbleSelected,
    InitializationValid,
}

/// Snapshot of the state the predicates read. Built fresh for every query.
#[derive(Debug, Clone, Copy)]
pub struct GateInputs<'a> {
    pub mode: SessionMode,
    pub threshold: &'a ThresholdSettings,
    pub preprocessing: PreprocessingStage,
    pub active_bubble: Option<usize>,
    pub bubble_count: usize,
    /// Host flag: a speed field has been computed.
    pub speed_valid: bool,
    /// Host flag: the contour is seeded from the manual segmentation.
    pub manual_seed: bool,
}

pub fn is_enabled(capability: Capability, state: &GateInputs<'_>) -> bool {
    match capability {
        Capability::ThresholdingEnabled => state.mode == SessionMode::ThresholdSnake,
        Capability::LowerThresholdEnabled => state.threshold.is_lower_enabled(),
        Capability::UpperThresholdEnabled => state.threshold.is_upper_enabled(),
        Capability::EdgePreprocessingEnabled => state.mode == SessionMode::EdgeSnake,
        Capability::SpeedAvailable => state.speed_valid,
        Capability::PreprocessingActive => state.preprocessing != PreprocessingStage::None,
        Capability::BubbleSelected => state.active_bubble.is_some(),
        Capability::InitializationValid => state.manual_seed || state.bubble_count > 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ThresholdMode;

    fn inputs(threshold: &ThresholdSettings) -> GateInputs<'_> {
        GateInputs {
            mode: SessionMode::Inactive,
            threshold,
            preprocessing: PreprocessingStage::None,
            active_bubble: None,
            bubble_count: 0,
            speed_valid: false,
            manual_seed: false,
        }
    }

    #[test]
    fn mode_selects_threshold_or_edge_controls() {
        let ts = ThresholdSettings::default();
        let mut state = inputs(&ts);
        assert!(!is_enabled(Capability::ThresholdingEnabled, &state));
        state.mode = SessionMode::ThresholdSnake;
        assert!(is_enabled(Capability::ThresholdingEnabled, &state));
        assert!(!is_enabled(Capability::EdgePreprocessingEnabled, &state));
        state.mode = SessionMode::EdgeSnake;
        assert!(is_enabled(Capability::EdgePreprocessingEnabled, &state));
    }

    #[test]
    fn initialization_needs_bubbles_or_manual_seed() {
        let ts = ThresholdSettings::default();
        let mut state = inputs(&ts);
        assert!(!is_enabled(Capability::InitializationValid, &state));
        state.manual_seed = true;
        assert!(is_enabled(Capability::InitializationValid, &state));
        state.manual_seed = false;
        state.bubble_count = 2;
        assert!(is_enabled(Capability::InitializationValid, &state));
    }

    #[test]
    fn threshold_flags_follow_mode() {
        let mut ts = ThresholdSettings::default();
        ts.mode = ThresholdMode::UpperOnly;
        let state = inputs(&ts);
        assert!(!is_enabled(Capability::LowerThresholdEnabled, &state));
        assert!(is_enabled(Capability::UpperThresholdEnabled, &state));
    }

    #[test]
    fn selection_and_stage_flags() {
        let ts = ThresholdSettings::default();
        let mut state = inputs(&ts);
        state.active_bubble = Some(0);
        state.preprocessing = PreprocessingStage::Gmm;
        state.speed_valid = true;
        assert!(is_enabled(Capability::BubbleSelected, &state));
        assert!(is_enabled(Capability::PreprocessingActive, &state));
        assert!(is_enabled(Capability::SpeedAvailable, &state));
    }
}
