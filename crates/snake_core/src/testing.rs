//! In-crate fakes for the collaborator traits.

use std::cell::RefCell;
use std::rc::Rc;

use glam::{DVec3, UVec3};

use crate::channels::{LayerId, LayerInfo, LayerRole, ScalarChannel};
use crate::collab::{
    ChannelStats, ClusteringEngine, ClusteringEngineFactory, Collaborators, EvolutionEngine,
    ImageSource, PreviewFilter, PreviewParameters, Previewers, SegmentationHost, Seeds,
    SpeedRequest, VolumeGeometry,
};
use crate::config::{EdgePreprocessingSettings, PreprocessingStage, ThresholdSettings};
use crate::error::EngineFailure;
use crate::functors::default_speed_mapping;
use crate::gmm::{GaussianComponent, MixtureModel};
use crate::mapping::IntensityMapping;

/// Shared handle so tests can inspect a fake after handing it to the session.
pub struct Shared<T>(pub Rc<RefCell<T>>);

impl<T> Shared<T> {
    pub fn new(value: T) -> (Self, Rc<RefCell<T>>) {
        let rc = Rc::new(RefCell::new(value));
        (Self(Rc::clone(&rc)), rc)
    }
}

pub struct FakeClustering {
    clusters: usize,
    samples: usize,
    model: MixtureModel,
    pub fail_iterate: bool,
}

impl FakeClustering {
    pub fn new(clusters: usize, samples: usize) -> Self {
        Self {
            clusters,
            samples,
            model: evenly_spaced(clusters),
            fail_iterate: false,
        }
    }
}

fn evenly_spaced(clusters: usize) -> MixtureModel {
    MixtureModel::new(
        (0..clusters)
            .map(|i| GaussianComponent::new(100.0 * i as f64, 25.0, 1.0))
            .collect(),
    )
}

impl ClusteringEngine for FakeClustering {
    fn number_of_clusters(&self) -> usize {
        self.clusters
    }

    fn set_number_of_clusters(&mut self, clusters: usize) {
        self.clusters = clusters;
    }

    fn number_of_samples(&self) -> usize {
        self.samples
    }

    fn set_number_of_samples(&mut self, samples: usize) {
        self.samples = samples;
    }

    fn initialize_clusters(&mut self) -> Result<(), EngineFailure> {
        self.model = evenly_spaced(self.clusters);
        Ok(())
    }

    fn iterate(&mut self) -> Result<(), EngineFailure> {
        if self.fail_iterate {
            return Err(EngineFailure::new("singular covariance"));
        }
        for component in self.model.components_mut() {
            component.mean += 1.0;
        }
        Ok(())
    }

    fn mixture_model(&self) -> &MixtureModel {
        &self.model
    }

    fn mixture_model_mut(&mut self) -> &mut MixtureModel {
        &mut self.model
    }
}

#[derive(Default)]
pub struct FakeClusteringFactory {
    pub created: usize,
}

impl ClusteringEngineFactory for FakeClusteringFactory {
    fn create(
        &mut self,
        image: &dyn ImageSource,
        _channel: ScalarChannel,
    ) -> Result<Box<dyn ClusteringEngine>, EngineFailure> {
        self.created += 1;
        Ok(Box::new(FakeClustering::new(3, image.voxel_count().min(5000))))
    }
}

#[derive(Debug, Default)]
pub struct FakePreview {
    pub preview: bool,
    pub updates: usize,
    pub last_threshold: Option<ThresholdSettings>,
    pub last_edge: Option<EdgePreprocessingSettings>,
    pub last_mixture: Option<MixtureModel>,
}

impl PreviewFilter for FakePreview {
    fn set_preview_mode(&mut self, enabled: bool) {
        self.preview = enabled;
    }

    fn is_preview_mode(&self) -> bool {
        self.preview
    }

    fn set_parameters(&mut self, params: PreviewParameters<'_>) {
        self.updates += 1;
        match params {
            PreviewParameters::Threshold(ts) => self.last_threshold = Some(ts.clone()),
            PreviewParameters::Edge(eps) => self.last_edge = Some(eps.clone()),
            PreviewParameters::Mixture(model) => self.last_mixture = Some(model.clone()),
        }
    }
}

impl<T: PreviewFilter> PreviewFilter for Shared<T> {
    fn set_preview_mode(&mut self, enabled: bool) {
        self.0.borrow_mut().set_preview_mode(enabled)
    }

    fn is_preview_mode(&self) -> bool {
        self.0.borrow().is_preview_mode()
    }

    fn set_parameters(&mut self, params: PreviewParameters<'_>) {
        self.0.borrow_mut().set_parameters(params)
    }
}

#[derive(Debug, Default)]
pub struct FakeEvolution {
    pub reject_init: bool,
    pub active: bool,
    pub elapsed: usize,
}

impl EvolutionEngine for FakeEvolution {
    fn initialize(&mut self, seeds: Seeds<'_>) -> Result<bool, EngineFailure> {
        if self.reject_init || (seeds.bubbles.is_empty() && !seeds.manual_segmentation) {
            return Ok(false);
        }
        self.active = true;
        self.elapsed = 0;
        Ok(true)
    }

    fn step(&mut self, steps: usize) -> Result<usize, EngineFailure> {
        self.elapsed += steps;
        Ok(steps)
    }

    fn rewind(&mut self) {
        self.elapsed = 0;
    }

    fn terminate(&mut self) {
        self.active = false;
    }

    fn elapsed_iterations(&self) -> usize {
        self.elapsed
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

#[derive(Debug, Default)]
pub struct FakeHost {
    pub working: bool,
    pub speed_valid: bool,
    pub manual_seed: bool,
    pub merges: usize,
    pub undo_labels: Vec<String>,
    pub speed_requests: Vec<PreprocessingStage>,
}

impl SegmentationHost for FakeHost {
    fn initialize_working_data(&mut self) -> Result<(), EngineFailure> {
        self.working = true;
        Ok(())
    }

    fn compute_speed(&mut self, request: SpeedRequest<'_>) -> Result<(), EngineFailure> {
        self.speed_requests.push(request.stage);
        self.speed_valid = true;
        Ok(())
    }

    fn speed_valid(&self) -> bool {
        self.speed_valid
    }

    fn initialized_with_manual_segmentation(&self) -> bool {
        self.manual_seed
    }

    fn merge_working_volume_into_persistent(&mut self) -> Result<(), EngineFailure> {
        self.merges += 1;
        Ok(())
    }

    fn record_undo_checkpoint(&mut self, label: &str) {
        self.undo_labels.push(label.to_owned());
    }

    fn switch_to_persistent_image_data(&mut self) {}

    fn release_working_data(&mut self) {
        self.working = false;
        self.speed_valid = false;
    }
}

impl<T: SegmentationHost> SegmentationHost for Shared<T> {
    fn initialize_working_data(&mut self) -> Result<(), EngineFailure> {
        self.0.borrow_mut().initialize_working_data()
    }

    fn compute_speed(&mut self, request: SpeedRequest<'_>) -> Result<(), EngineFailure> {
        self.0.borrow_mut().compute_speed(request)
    }

    fn speed_valid(&self) -> bool {
        self.0.borrow().speed_valid()
    }

    fn initialized_with_manual_segmentation(&self) -> bool {
        self.0.borrow().initialized_with_manual_segmentation()
    }

    fn merge_working_volume_into_persistent(&mut self) -> Result<(), EngineFailure> {
        self.0.borrow_mut().merge_working_volume_into_persistent()
    }

    fn record_undo_checkpoint(&mut self, label: &str) {
        self.0.borrow_mut().record_undo_checkpoint(label)
    }

    fn switch_to_persistent_image_data(&mut self) {
        self.0.borrow_mut().switch_to_persistent_image_data()
    }

    fn release_working_data(&mut self) {
        self.0.borrow_mut().release_working_data()
    }
}

/// A 32^3 unit-spacing volume: one scalar main layer and a 3-component overlay.
#[derive(Debug, Clone)]
pub struct FakeImage {
    pub layers: Vec<LayerInfo>,
    pub geometry: VolumeGeometry,
}

impl Default for FakeImage {
    fn default() -> Self {
        Self {
            layers: vec![
                LayerInfo {
                    id: LayerId(1),
                    name: "main".into(),
                    role: LayerRole::Main,
                    components: 1,
                },
                LayerInfo {
                    id: LayerId(2),
                    name: "rgb".into(),
                    role: LayerRole::Overlay,
                    components: 3,
                },
            ],
            geometry: VolumeGeometry {
                dims: UVec3::splat(32),
                spacing: DVec3::ONE,
            },
        }
    }
}

impl ImageSource for FakeImage {
    fn layers(&self) -> Vec<LayerInfo> {
        self.layers.clone()
    }

    fn channel_stats(&self, channel: ScalarChannel) -> Option<ChannelStats> {
        let layer = self.layers.iter().find(|l| l.id == channel.layer)?;
        if channel.component >= layer.components.max(1) {
            return None;
        }
        Some(ChannelStats {
            mapping: IntensityMapping::IDENTITY,
            min_internal: 0.0,
            max_internal: 1000.0,
            gradient_magnitude_limit: 50.0,
        })
    }

    fn geometry(&self) -> VolumeGeometry {
        self.geometry
    }

    fn speed_mapping(&self) -> IntensityMapping {
        default_speed_mapping()
    }
}

impl<T: ImageSource> ImageSource for Shared<T> {
    fn layers(&self) -> Vec<LayerInfo> {
        self.0.borrow().layers()
    }

    fn channel_stats(&self, channel: ScalarChannel) -> Option<ChannelStats> {
        self.0.borrow().channel_stats(channel)
    }

    fn geometry(&self) -> VolumeGeometry {
        self.0.borrow().geometry()
    }

    fn speed_mapping(&self) -> IntensityMapping {
        self.0.borrow().speed_mapping()
    }
}

/// Handles kept by a test after building a session from fakes.
pub struct Probes {
    pub image: Rc<RefCell<FakeImage>>,
    pub host: Rc<RefCell<FakeHost>>,
    pub threshold_preview: Rc<RefCell<FakePreview>>,
    pub edge_preview: Rc<RefCell<FakePreview>>,
    pub gmm_preview: Rc<RefCell<FakePreview>>,
}

pub fn fake_collaborators() -> (Collaborators, Probes) {
    let (image, image_probe) = Shared::new(FakeImage::default());
    let (host, host_probe) = Shared::new(FakeHost::default());
    let (threshold, threshold_probe) = Shared::new(FakePreview::default());
    let (edge, edge_probe) = Shared::new(FakePreview::default());
    let (gmm, gmm_probe) = Shared::new(FakePreview::default());
    let collaborators = Collaborators {
        image: Box::new(image),
        evolution: Box::new(FakeEvolution::default()),
        clustering: Box::new(FakeClusteringFactory::default()),
        previews: Previewers {
            threshold: Box::new(threshold),
            edge: Box::new(edge),
            gmm: Box::new(gmm),
        },
        host: Box::new(host),
    };
    let probes = Probes {
        image: image_probe,
        host: host_probe,
        threshold_preview: threshold_probe,
        edge_preview: edge_probe,
        gmm_preview: gmm_probe,
    };
    (collaborators, probes)
}
