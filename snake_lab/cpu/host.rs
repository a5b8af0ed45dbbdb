//! In-memory segmentation host: speed computation, working and persistent label volumes.

use std::cell::RefCell;
use std::rc::Rc;

use snake_core::collab::{ImageSource, SegmentationHost, SpeedRequest};
use snake_core::config::PreprocessingStage;
use snake_core::functors::{EdgeRemappingFunctor, SmoothThresholdFunctor, SPEED_INTERNAL_SCALE};
use snake_core::EngineFailure;
use tracing::{debug, info};

use super::volume::SyntheticVolume;

/// Label and speed buffers shared by the host and the evolution engine.
#[derive(Debug, Default)]
pub struct Workspace {
    /// Speed in `[-1, 1]`, one value per voxel.
    pub speed: Option<Vec<f32>>,
    /// Segmentation being evolved; `None` outside a session.
    pub working: Option<Vec<bool>>,
    pub persistent: Vec<bool>,
    /// Seed taken from a manual segmentation, if the user drew one.
    pub manual_seed: Option<Vec<bool>>,
    pub undo_labels: Vec<String>,
    pub showing_persistent: bool,
}

impl Workspace {
    pub fn new(voxels: usize) -> Self {
        Self {
            persistent: vec![false; voxels],
            showing_persistent: true,
            ..Self::default()
        }
    }
}

pub type SharedWorkspace = Rc<RefCell<Workspace>>;

pub struct LabHost {
    volume: SyntheticVolume,
    workspace: SharedWorkspace,
}

impl LabHost {
    pub fn new(volume: SyntheticVolume, workspace: SharedWorkspace) -> Self {
        Self { volume, workspace }
    }

    fn speed_field(&self, request: &SpeedRequest<'_>) -> Result<Vec<f32>, EngineFailure> {
        let stats = self
            .volume
            .channel_stats(request.channel)
            .ok_or_else(|| EngineFailure::new(format!("channel {:?} has no data", request.channel)))?;
        let scale = SPEED_INTERNAL_SCALE;
        let speed = match request.stage {
            PreprocessingStage::None => {
                return Err(EngineFailure::new("no preprocessing stage selected"));
            }
            PreprocessingStage::Threshold => {
                let f = SmoothThresholdFunctor::new(
                    request.threshold,
                    stats.min_internal,
                    stats.max_internal,
                );
                self.volume
                    .voxels()
                    .iter()
                    .map(|&x| (f.apply(f64::from(x)) / scale) as f32)
                    .collect()
            }
            PreprocessingStage::Edge => {
                let f = EdgeRemappingFunctor::new(request.edge, 0.0, stats.gradient_magnitude_limit);
                self.volume
                    .gradient()
                    .iter()
                    .map(|&g| (f.apply(f64::from(g)) / scale) as f32)
                    .collect()
            }
            PreprocessingStage::Gmm => {
                let model = request
                    .mixture
                    .ok_or_else(|| EngineFailure::new("no mixture model is attached"))?;
                if model.foreground_count() == 0 {
                    return Err(EngineFailure::new("no cluster is marked as foreground"));
                }
                self.volume
                    .voxels()
                    .iter()
                    .map(|&x| (2.0 * model.foreground_posterior(f64::from(x)) - 1.0) as f32)
                    .collect()
            }
        };
        Ok(speed)
    }
}

impl SegmentationHost for LabHost {
    fn initialize_working_data(&mut self) -> Result<(), EngineFailure> {
        let voxels = self.volume.voxels().len();
        let mut ws = self.workspace.borrow_mut();
        ws.working = Some(vec![false; voxels]);
        ws.speed = None;
        ws.showing_persistent = false;
        debug!(voxels, "working data allocated");
        Ok(())
    }

    fn compute_speed(&mut self, request: SpeedRequest<'_>) -> Result<(), EngineFailure> {
        let speed = self.speed_field(&request)?;
        let positive = speed.iter().filter(|&&s| s > 0.0).count();
        info!(stage = ?request.stage, positive, "speed image computed");
        self.workspace.borrow_mut().speed = Some(speed);
        Ok(())
    }

    fn speed_valid(&self) -> bool {
        self.workspace.borrow().speed.is_some()
    }

    fn initialized_with_manual_segmentation(&self) -> bool {
        self.workspace.borrow().manual_seed.is_some()
    }

    fn merge_working_volume_into_persistent(&mut self) -> Result<(), EngineFailure> {
        let mut ws = self.workspace.borrow_mut();
        let Workspace {
            working,
            persistent,
            ..
        } = &mut *ws;
        let working = working
            .as_ref()
            .ok_or_else(|| EngineFailure::new("no working segmentation to merge"))?;
        for (p, &w) in persistent.iter_mut().zip(working) {
            *p |= w;
        }
        Ok(())
    }

    fn record_undo_checkpoint(&mut self, label: &str) {
        self.workspace.borrow_mut().undo_labels.push(label.to_owned());
    }

    fn switch_to_persistent_image_data(&mut self) {
        self.workspace.borrow_mut().showing_persistent = true;
    }

    fn release_working_data(&mut self) {
        let mut ws = self.workspace.borrow_mut();
        ws.working = None;
        ws.speed = None;
    }
}
