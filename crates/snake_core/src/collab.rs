//! Contracts of the collaborators the coordinator drives but does not own the numerics of.
//!
//! Everything here is injected at construction through [`Collaborators`]; the
//! coordinator never reaches for ambient global state.

use glam::{DVec3, UVec3};

use crate::bubbles::Bubble;
use crate::channels::{LayerInfo, ScalarChannel};
use crate::config::{EdgePreprocessingSettings, PreprocessingStage, ThresholdSettings};
use crate::error::EngineFailure;
use crate::gmm::MixtureModel;
use crate::mapping::IntensityMapping;

/// Voxel grid and physical spacing of the working volume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeGeometry {
    pub dims: UVec3,
    pub spacing: DVec3,
}

impl VolumeGeometry {
    pub fn voxel_count(&self) -> usize {
        self.dims.x as usize * self.dims.y as usize * self.dims.z as usize
    }

    /// Physical extent along each axis.
    pub fn extents(&self) -> DVec3 {
        self.dims.as_dvec3() * self.spacing
    }

    pub fn contains_index(&self, index: glam::IVec3) -> bool {
        index.cmpge(glam::IVec3::ZERO).all() && index.as_uvec3().cmplt(self.dims).all()
    }
}

/// Intensity statistics of one scalar channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelStats {
    pub mapping: IntensityMapping,
    pub min_internal: f64,
    pub max_internal: f64,
    /// Upper limit of the gradient magnitude, native units.
    pub gradient_magnitude_limit: f64,
}

impl ChannelStats {
    pub fn native_range(&self) -> (f64, f64) {
        self.mapping
            .native_interval(self.min_internal, self.max_internal)
    }
}

/// Read-only access to the image layers of the session.
pub trait ImageSource {
    fn layers(&self) -> Vec<LayerInfo>;
    fn channel_stats(&self, channel: ScalarChannel) -> Option<ChannelStats>;
    fn geometry(&self) -> VolumeGeometry;
    /// Mapping of the speed field's internal encoding to native speed values.
    fn speed_mapping(&self) -> IntensityMapping;

    fn voxel_count(&self) -> usize {
        self.geometry().voxel_count()
    }
}

/// Seeds handed to the evolution engine on initialization.
#[derive(Debug, Clone, Copy)]
pub struct Seeds<'a> {
    pub bubbles: &'a [Bubble],
    /// Start from the host's manual segmentation instead of (or besides) bubbles.
    pub manual_segmentation: bool,
}

/// The numerical contour-evolution solver.
pub trait EvolutionEngine {
    /// Returns `Ok(false)` when the seeds do not produce a usable initial contour.
    fn initialize(&mut self, seeds: Seeds<'_>) -> Result<bool, EngineFailure>;
    /// Runs up to `steps` iterations and reports how many were taken.
    fn step(&mut self, steps: usize) -> Result<usize, EngineFailure>;
    fn rewind(&mut self);
    fn terminate(&mut self);
    fn elapsed_iterations(&self) -> usize;
    fn is_active(&self) -> bool;
}

/// The mixture fitting engine backing the clustering stage.
pub trait ClusteringEngine {
    fn number_of_clusters(&self) -> usize;
    fn set_number_of_clusters(&mut self, clusters: usize);
    fn number_of_samples(&self) -> usize;
    fn set_number_of_samples(&mut self, samples: usize);
    /// Re-derives cluster parameters from scratch.
    fn initialize_clusters(&mut self) -> Result<(), EngineFailure>;
    /// One fitting step.
    fn iterate(&mut self) -> Result<(), EngineFailure>;
    fn mixture_model(&self) -> &MixtureModel;
    fn mixture_model_mut(&mut self) -> &mut MixtureModel;
}

/// Creates clustering engines when the clustering stage is entered.
pub trait ClusteringEngineFactory {
    fn create(
        &mut self,
        image: &dyn ImageSource,
        channel: ScalarChannel,
    ) -> Result<Box<dyn ClusteringEngine>, EngineFailure>;
}

#[derive(Debug, Clone, Copy)]
pub enum PreviewParameters<'a> {
    Threshold(&'a ThresholdSettings),
    Edge(&'a EdgePreprocessingSettings),
    Mixture(&'a MixtureModel),
}

/// Slice preview of one preprocessing stage.
pub trait PreviewFilter {
    fn set_preview_mode(&mut self, enabled: bool);
    fn is_preview_mode(&self) -> bool;
    /// Must be applied before any further preview rendering is requested.
    fn set_parameters(&mut self, params: PreviewParameters<'_>);
}

/// Everything the host needs to compute a speed field.
#[derive(Debug, Clone, Copy)]
pub struct SpeedRequest<'a> {
    pub stage: PreprocessingStage,
    pub channel: ScalarChannel,
    pub threshold: &'a ThresholdSettings,
    pub edge: &'a EdgePreprocessingSettings,
    pub mixture: Option<&'a MixtureModel>,
}

/// The application hosting the wizard: working data, speed field, undo history.
pub trait SegmentationHost {
    /// Allocates the transient working volume and makes it the current image set.
    fn initialize_working_data(&mut self) -> Result<(), EngineFailure>;
    fn compute_speed(&mut self, request: SpeedRequest<'_>) -> Result<(), EngineFailure>;
    fn speed_valid(&self) -> bool;
    /// Whether the contour should be seeded from the manual segmentation.
    fn initialized_with_manual_segmentation(&self) -> bool;
    fn merge_working_volume_into_persistent(&mut self) -> Result<(), EngineFailure>;
    fn record_undo_checkpoint(&mut self, label: &str);
    fn switch_to_persistent_image_data(&mut self);
    fn release_working_data(&mut self);
}

/// The three previewers, one per preprocessing stage.
pub struct Previewers {
    pub threshold: Box<dyn PreviewFilter>,
    pub edge: Box<dyn PreviewFilter>,
    pub gmm: Box<dyn PreviewFilter>,
}

impl Previewers {
    pub fn get_mut(&mut self, stage: PreprocessingStage) -> Option<&mut dyn PreviewFilter> {
        match stage {
            PreprocessingStage::None => None,
            PreprocessingStage::Threshold => Some(self.threshold.as_mut()),
            PreprocessingStage::Edge => Some(self.edge.as_mut()),
            PreprocessingStage::Gmm => Some(self.gmm.as_mut()),
        }
    }

    pub fn get(&self, stage: PreprocessingStage) -> Option<&dyn PreviewFilter> {
        match stage {
            PreprocessingStage::None => None,
            PreprocessingStage::Threshold => Some(self.threshold.as_ref()),
            PreprocessingStage::Edge => Some(self.edge.as_ref()),
            PreprocessingStage::Gmm => Some(self.gmm.as_ref()),
        }
    }
}

/// Handles passed to [`crate::SnakeWizard::new`].
pub struct Collaborators {
    pub image: Box<dyn ImageSource>,
    pub evolution: Box<dyn EvolutionEngine>,
    pub clustering: Box<dyn ClusteringEngineFactory>,
    pub previews: Previewers,
    pub host: Box<dyn SegmentationHost>,
}
