//! JSON-described wizard walkthroughs replayed against a [`LabSession`].

use std::{cell::Cell, fs, path::Path, rc::Rc};

use anyhow::{ensure, Context, Result};
use glam::DVec3;
use serde::{Deserialize, Serialize};
use snake_core::{
    EdgeParameter, PreprocessingStage, ScalarChannel, SessionConfig, SessionMode, ThresholdBound,
    ThresholdMode, UpdateEvent,
};
use tracing::{debug, info};

use crate::cpu::VolumeSpec;
use crate::rig::LabSession;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub volume: VolumeSpec,
    #[serde(default)]
    pub config: SessionConfig,
    pub steps: Vec<Step>,
}

/// One user action on the wizard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    EnterSnakeMode { mode: SessionMode },
    SetMode { mode: SessionMode },
    Cancel,
    SelectChannel { channel: ScalarChannel },
    SetThreshold { bound: ThresholdBound, value: f64 },
    SetSmoothness { value: f64 },
    SetThresholdMode { mode: ThresholdMode },
    SetEdge { param: EdgeParameter, value: f64 },
    EnterPreprocessing { stage: PreprocessingStage },
    SetPreview { enabled: bool },
    SetClusterCount { value: usize },
    SetSampleCount { value: usize },
    IterateClustering {
        #[serde(default = "one")]
        times: usize,
    },
    SetForeground { cluster: usize, state: bool },
    SetClusterWeight { cluster: usize, weight: f64 },
    ApplyPreprocessing,
    ClosePreprocessing,
    AddBubble { at: [f64; 3] },
    SetActiveBubble { index: Option<usize> },
    RemoveActiveBubble,
    SetBubbleRadius { value: f64 },
    EnterEvolution,
    SetStepSize { value: usize },
    /// Steps by `count`, or by the configured step size when absent.
    Evolve {
        #[serde(default)]
        count: Option<usize>,
    },
    Rewind,
    LeaveEvolution { commit: bool },
    /// Checks the current iteration count.
    ExpectIterations { value: usize },
}

fn one() -> usize {
    1
}

/// Outcome of a replayed scenario.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioReport {
    pub label: String,
    pub steps: usize,
    pub iterations: usize,
    pub segmented_voxels: usize,
    pub dice: f64,
    pub updates: usize,
}

impl Scenario {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("failed to parse scenario JSON")
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(&path)
            .with_context(|| format!("failed to read scenario {}", path.as_ref().display()))?;
        Self::from_json(&text)
    }

    pub fn session(&self) -> LabSession {
        LabSession::new(&self.volume, self.config.clone())
    }

    /// Replays every step on a fresh session.
    pub fn run(&self) -> Result<(LabSession, ScenarioReport)> {
        let mut lab = self.session();
        let report = self.replay(&mut lab)?;
        Ok((lab, report))
    }

    pub fn replay(&self, lab: &mut LabSession) -> Result<ScenarioReport> {
        let updates = Rc::new(Cell::new(0usize));
        let counter = Rc::clone(&updates);
        let observer = lab
            .wizard
            .subscribe(Box::new(move |_: UpdateEvent| counter.set(counter.get() + 1)));

        let mut iterations = 0;
        for (index, step) in self.steps.iter().enumerate() {
            debug!(index, ?step, "scenario step");
            apply(lab, step, &mut iterations)
                .with_context(|| format!("step {index} ({step:?}) failed"))?;
        }
        lab.wizard.unsubscribe(observer);

        let report = ScenarioReport {
            label: self.label.clone(),
            steps: self.steps.len(),
            iterations,
            segmented_voxels: lab.segmented_voxels(),
            dice: lab.dice(),
            updates: updates.get(),
        };
        info!(
            label = %report.label,
            iterations = report.iterations,
            segmented = report.segmented_voxels,
            dice = report.dice,
            "scenario finished"
        );
        Ok(report)
    }
}

fn apply(lab: &mut LabSession, step: &Step, iterations: &mut usize) -> Result<()> {
    let wizard = &mut lab.wizard;
    match *step {
        Step::EnterSnakeMode { mode } => wizard.enter_snake_mode(mode)?,
        Step::SetMode { mode } => wizard.set_mode(mode)?,
        Step::Cancel => wizard.cancel_snake_mode(),
        Step::SelectChannel { channel } => wizard.select_scalar_channel(channel)?,
        Step::SetThreshold { bound, value } => wizard.set_threshold(bound, value)?,
        Step::SetSmoothness { value } => wizard.set_threshold_smoothness(value),
        Step::SetThresholdMode { mode } => wizard.set_threshold_mode(mode),
        Step::SetEdge { param, value } => wizard.set_edge_parameter(param, value),
        Step::EnterPreprocessing { stage } => wizard.enter_preprocessing(stage)?,
        Step::SetPreview { enabled } => wizard.set_preview_enabled(enabled),
        Step::SetClusterCount { value } => wizard.set_cluster_count(value)?,
        Step::SetSampleCount { value } => wizard.set_sample_count(value)?,
        Step::IterateClustering { times } => {
            for _ in 0..times {
                wizard.iterate_clustering()?;
            }
        }
        Step::SetForeground { cluster, state } => {
            wizard.set_cluster_foreground(cluster, state)?;
        }
        Step::SetClusterWeight { cluster, weight } => {
            wizard.set_cluster_weight(cluster, weight)?;
        }
        Step::ApplyPreprocessing => wizard.apply_preprocessing()?,
        Step::ClosePreprocessing => wizard.close_preprocessing(),
        Step::AddBubble { at } => {
            wizard.add_bubble_at_cursor(DVec3::from_array(at));
        }
        Step::SetActiveBubble { index } => wizard.set_active_bubble(index)?,
        Step::RemoveActiveBubble => {
            wizard.remove_active_bubble()?;
        }
        Step::SetBubbleRadius { value } => wizard.set_bubble_radius(value),
        Step::EnterEvolution => wizard.enter_evolution()?,
        Step::SetStepSize { value } => wizard.set_step_size(value)?,
        Step::Evolve { count } => {
            match count {
                Some(n) => wizard.step_evolution(n)?,
                None => wizard.perform_evolution_step()?,
            };
            *iterations = wizard.iteration_count();
        }
        Step::Rewind => wizard.rewind_evolution(),
        Step::LeaveEvolution { commit } => wizard.leave_evolution(commit)?,
        Step::ExpectIterations { value } => {
            let actual = wizard.iteration_count();
            ensure!(actual == value, "expected {value} iterations, found {actual}");
        }
    }
    Ok(())
}
