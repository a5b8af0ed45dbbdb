//! The wizard coordinator: one session's state plus handles to its collaborators.
//!
//! Every public mutating method runs to completion, then flushes the update
//! events it raised as a single batch.

use glam::DVec3;
use tracing::{debug, info, warn};

use crate::bubbles::{Bubble, BubbleStore, RadiusDomain};
use crate::channels::{ChannelCache, ScalarChannel};
use crate::clustering::ClusteringCoordinator;
use crate::collab::{
    ChannelStats, ClusteringEngineFactory, Collaborators, ImageSource, PreviewParameters,
    Previewers, SegmentationHost, Seeds, SpeedRequest,
};
use crate::config::{
    EdgePreprocessingSettings, PreprocessingStage, SessionConfig, SessionMode, ThresholdMode,
    ThresholdSettings,
};
use crate::error::{Result, SnakeError};
use crate::events::{Broadcaster, ObserverId, PropagationGraph, UpdateEvent, UpdateObserver};
use crate::evolution::{EvolutionController, EvolutionPhase};
use crate::functors::SpeedCurve;
use crate::gate::{self, Capability, GateInputs};
use crate::gmm::MixtureModel;
use crate::params::{self, EdgeParameter, ThresholdBound};
use crate::range::{Bridged, NumericRange};

pub struct SnakeWizard {
    config: SessionConfig,
    mode: SessionMode,
    preprocessing: PreprocessingStage,
    threshold: ThresholdSettings,
    edge: EdgePreprocessingSettings,
    step_size: usize,
    selected_channel: Option<ScalarChannel>,
    channels: ChannelCache,
    bubbles: BubbleStore,
    clustering: ClusteringCoordinator,
    evolution: EvolutionController,
    image: Box<dyn ImageSource>,
    clustering_factory: Box<dyn ClusteringEngineFactory>,
    previews: Previewers,
    host: Box<dyn SegmentationHost>,
    events: Broadcaster,
}

impl SnakeWizard {
    pub fn new(config: SessionConfig, collaborators: Collaborators) -> Self {
        let Collaborators {
            image,
            evolution,
            clustering,
            previews,
            host,
        } = collaborators;
        Self {
            step_size: config.default_step_size,
            config,
            mode: SessionMode::Inactive,
            preprocessing: PreprocessingStage::None,
            threshold: ThresholdSettings::default(),
            edge: EdgePreprocessingSettings::default(),
            selected_channel: None,
            channels: ChannelCache::default(),
            bubbles: BubbleStore::default(),
            clustering: ClusteringCoordinator::default(),
            evolution: EvolutionController::new(evolution),
            image,
            clustering_factory: clustering,
            previews,
            host,
            events: Broadcaster::new(PropagationGraph::wizard()),
        }
    }

    pub fn subscribe(&mut self, observer: Box<dyn UpdateObserver>) -> ObserverId {
        self.events.subscribe(observer)
    }

    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Events delivered by the most recent operation.
    pub fn last_updates(&self) -> &[UpdateEvent] {
        self.events.last_batch()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn preprocessing_stage(&self) -> PreprocessingStage {
        self.preprocessing
    }

    pub fn threshold_settings(&self) -> &ThresholdSettings {
        &self.threshold
    }

    pub fn edge_settings(&self) -> &EdgePreprocessingSettings {
        &self.edge
    }

    pub fn is_enabled(&self, capability: Capability) -> bool {
        gate::is_enabled(capability, &self.gate_inputs())
    }

    fn gate_inputs(&self) -> GateInputs<'_> {
        GateInputs {
            mode: self.mode,
            threshold: &self.threshold,
            preprocessing: self.preprocessing,
            active_bubble: self.bubbles.active(),
            bubble_count: self.bubbles.len(),
            speed_valid: self.host.speed_valid(),
            manual_seed: self.host.initialized_with_manual_segmentation(),
        }
    }

    fn finish<T>(&mut self, result: Result<T>) -> Result<T> {
        self.events.flush();
        result
    }

    // --- session mode --------------------------------------------------------

    /// Enters the wizard: allocates working data, resets thresholds and bubble radius.
    pub fn enter_snake_mode(&mut self, mode: SessionMode) -> Result<()> {
        let result = self.enter_snake_mode_inner(mode);
        self.finish(result)
    }

    fn enter_snake_mode_inner(&mut self, mode: SessionMode) -> Result<()> {
        if !mode.is_active() {
            return Err(SnakeError::WrongStage {
                operation: "enter_snake_mode",
                reason: "an active snake type is required",
            });
        }
        let (_, stats) = self.channel_stats().ok_or(SnakeError::NoScalarChannel)?;
        self.host
            .initialize_working_data()
            .map_err(SnakeError::engine("working data initialization"))?;

        self.threshold = ThresholdSettings::for_intensity_range(stats.min_internal, stats.max_internal);
        self.edge = EdgePreprocessingSettings::default();
        self.previews
            .threshold
            .set_parameters(PreviewParameters::Threshold(&self.threshold));
        self.previews
            .edge
            .set_parameters(PreviewParameters::Edge(&self.edge));
        self.evolution.reset();
        if self.clustering.detach() {
            debug!("clustering engine released on re-entry");
        }
        self.bubbles.clear(&mut self.events);
        self.recompute_radius_domain();
        self.mode = mode;
        self.preprocessing = PreprocessingStage::None;
        info!(?mode, "snake mode entered");
        self.events.emit(UpdateEvent::SnakeTypeChanged);
        self.events.emit(UpdateEvent::ThresholdSettingsModified);
        self.events.emit(UpdateEvent::EdgeSettingsModified);
        Ok(())
    }

    /// Switches the snake type of a running session; the mixture model is discarded.
    pub fn set_mode(&mut self, mode: SessionMode) -> Result<()> {
        let result = self.set_mode_inner(mode);
        self.finish(result)
    }

    fn set_mode_inner(&mut self, mode: SessionMode) -> Result<()> {
        if !self.mode.is_active() || !mode.is_active() {
            return Err(SnakeError::WrongStage {
                operation: "set_mode",
                reason: "use enter_snake_mode / cancel_snake_mode to start or stop a session",
            });
        }
        if mode == self.mode {
            return Ok(());
        }
        if self.clustering.detach() {
            debug!("clustering engine released on mode change");
        }
        self.mode = mode;
        self.preprocessing = PreprocessingStage::None;
        info!(?mode, "snake type changed");
        self.events.emit(UpdateEvent::SnakeTypeChanged);
        self.emit_settings_modified();
        Ok(())
    }

    /// Leaves the wizard without touching the persistent segmentation.
    pub fn cancel_snake_mode(&mut self) {
        if !self.mode.is_active() {
            return;
        }
        self.evolution.reset();
        self.host.switch_to_persistent_image_data();
        self.host.release_working_data();
        self.reset_to_inactive();
        info!("snake mode cancelled");
        self.events.flush();
    }

    /// Threshold and edge getters change availability with the mode and channel.
    fn emit_settings_modified(&mut self) {
        self.events.emit(UpdateEvent::ThresholdSettingsModified);
        self.events.emit(UpdateEvent::EdgeSettingsModified);
    }

    fn reset_to_inactive(&mut self) {
        self.bubbles.clear(&mut self.events);
        self.clustering.detach();
        self.preprocessing = PreprocessingStage::None;
        self.mode = SessionMode::Inactive;
        self.events.emit(UpdateEvent::SnakeTypeChanged);
    }

    // --- scalar channels -----------------------------------------------------

    pub fn available_scalar_channels(&mut self) -> &[ScalarChannel] {
        let image = &self.image;
        self.channels.get_or_rebuild(|| image.layers())
    }

    /// The explicitly selected channel, else the first available one.
    pub fn selected_channel(&self) -> Option<ScalarChannel> {
        let image = &self.image;
        self.selected_channel
            .or_else(|| self.channels.first(|| image.layers()))
    }

    /// Selects the segmentation input. A different channel drops the mixture model
    /// and re-derives the thresholds from the new intensity range.
    pub fn select_scalar_channel(&mut self, channel: ScalarChannel) -> Result<()> {
        if !self.available_scalar_channels().contains(&channel) {
            return Err(SnakeError::UnknownChannel(channel));
        }
        let previous = self.selected_channel();
        self.selected_channel = Some(channel);
        if previous != Some(channel) {
            self.on_channel_changed();
        }
        self.events.emit(UpdateEvent::ThresholdSettingsModified);
        self.events.flush();
        Ok(())
    }

    fn on_channel_changed(&mut self) {
        if self.clustering.detach() {
            debug!("clustering engine released on channel change");
            if self.preprocessing == PreprocessingStage::Gmm {
                self.preprocessing = PreprocessingStage::None;
            }
            self.events.emit(UpdateEvent::GmmPreviewModified);
        }
        if !self.mode.is_active() {
            return;
        }
        if let Some((channel, stats)) = self.channel_stats() {
            self.threshold =
                ThresholdSettings::for_intensity_range(stats.min_internal, stats.max_internal);
            self.previews
                .threshold
                .set_parameters(PreviewParameters::Threshold(&self.threshold));
            info!(?channel, "thresholds re-derived for the new channel");
        }
    }

    /// Host notification that layers were added, removed or resampled.
    pub fn notify_layers_changed(&mut self) {
        self.channels.invalidate();
        if let Some(selected) = self.selected_channel {
            if !self.available_scalar_channels().contains(&selected) {
                warn!(?selected, "selected channel disappeared; falling back to the first");
                self.selected_channel = None;
                self.on_channel_changed();
            }
        }
        if self.mode.is_active() {
            self.recompute_radius_domain();
        }
        self.events.emit(UpdateEvent::LayerChanged);
        self.emit_settings_modified();
        self.events.flush();
    }

    fn channel_stats(&self) -> Option<(ScalarChannel, ChannelStats)> {
        let channel = self.selected_channel()?;
        let stats = self.image.channel_stats(channel)?;
        Some((channel, stats))
    }

    // --- threshold and edge parameters ---------------------------------------

    pub fn threshold(&self, bound: ThresholdBound) -> Option<Bridged<f64>> {
        if !self.is_enabled(Capability::ThresholdingEnabled) {
            return None;
        }
        let (_, stats) = self.channel_stats()?;
        Some(params::read_threshold(
            &self.threshold,
            bound,
            &stats,
            self.config.threshold_step_target,
        ))
    }

    pub fn set_threshold(&mut self, bound: ThresholdBound, native: f64) -> Result<()> {
        let (_, stats) = self.channel_stats().ok_or(SnakeError::NoScalarChannel)?;
        params::write_threshold(&mut self.threshold, bound, native, &stats);
        self.threshold_modified();
        Ok(())
    }

    pub fn threshold_smoothness(&self) -> Option<Bridged<f64>> {
        self.is_enabled(Capability::ThresholdingEnabled)
            .then(|| params::read_smoothness(&self.threshold))
    }

    pub fn set_threshold_smoothness(&mut self, value: f64) {
        self.threshold.smoothness = value;
        self.threshold_modified();
    }

    pub fn threshold_mode(&self) -> Option<ThresholdMode> {
        self.is_enabled(Capability::ThresholdingEnabled)
            .then_some(self.threshold.mode)
    }

    pub fn set_threshold_mode(&mut self, mode: ThresholdMode) {
        self.threshold.mode = mode;
        self.threshold_modified();
    }

    fn threshold_modified(&mut self) {
        self.previews
            .threshold
            .set_parameters(PreviewParameters::Threshold(&self.threshold));
        self.events.emit(UpdateEvent::ThresholdSettingsModified);
        self.events.flush();
    }

    pub fn edge_parameter(&self, param: EdgeParameter) -> Option<Bridged<f64>> {
        self.is_enabled(Capability::EdgePreprocessingEnabled)
            .then(|| params::read_edge(&self.edge, param))
    }

    pub fn set_edge_parameter(&mut self, param: EdgeParameter, value: f64) {
        param.set(&mut self.edge, value);
        self.previews
            .edge
            .set_parameters(PreviewParameters::Edge(&self.edge));
        self.events.emit(UpdateEvent::EdgeSettingsModified);
        self.events.flush();
    }

    /// Samples of the threshold speed function for plotting.
    pub fn evaluate_threshold_function(&self, n: usize) -> Result<SpeedCurve> {
        self.require_snake_mode("evaluate_threshold_function")?;
        let (_, stats) = self.channel_stats().ok_or(SnakeError::NoScalarChannel)?;
        Ok(SpeedCurve::threshold(
            &self.threshold,
            &stats,
            self.image.speed_mapping(),
            n,
        ))
    }

    /// Samples of the edge remapping function over the gradient-magnitude range.
    pub fn evaluate_edge_function(&self, n: usize) -> Result<SpeedCurve> {
        self.require_snake_mode("evaluate_edge_function")?;
        let (_, stats) = self.channel_stats().ok_or(SnakeError::NoScalarChannel)?;
        Ok(SpeedCurve::edge(
            &self.edge,
            &stats,
            self.image.speed_mapping(),
            n,
        ))
    }

    /// The curve matching the current snake type.
    pub fn evaluate_speed_function(&self, n: usize) -> Result<SpeedCurve> {
        match self.mode {
            SessionMode::EdgeSnake => self.evaluate_edge_function(n),
            _ => self.evaluate_threshold_function(n),
        }
    }

    fn require_snake_mode(&self, operation: &'static str) -> Result<()> {
        if self.mode.is_active() {
            Ok(())
        } else {
            Err(SnakeError::WrongStage {
                operation,
                reason: "snake mode is not active",
            })
        }
    }

    // --- preprocessing stages ------------------------------------------------

    pub fn enter_preprocessing(&mut self, stage: PreprocessingStage) -> Result<()> {
        let result = self.enter_preprocessing_inner(stage);
        self.finish(result)
    }

    fn enter_preprocessing_inner(&mut self, stage: PreprocessingStage) -> Result<()> {
        self.require_snake_mode("enter_preprocessing")?;
        match stage {
            PreprocessingStage::None => {}
            PreprocessingStage::Threshold => self
                .previews
                .threshold
                .set_parameters(PreviewParameters::Threshold(&self.threshold)),
            PreprocessingStage::Edge => self
                .previews
                .edge
                .set_parameters(PreviewParameters::Edge(&self.edge)),
            PreprocessingStage::Gmm => {
                if !self.clustering.is_attached() {
                    let channel = self.selected_channel().ok_or(SnakeError::NoScalarChannel)?;
                    let mut engine = self
                        .clustering_factory
                        .create(self.image.as_ref(), channel)
                        .map_err(SnakeError::engine("clustering engine creation"))?;
                    engine
                        .initialize_clusters()
                        .map_err(SnakeError::engine("clustering engine"))?;
                    self.clustering.attach(engine);
                    info!(?channel, "clustering engine attached");
                    self.emit_settings_modified();
                }
                if let Some(model) = self.clustering.mixture_model() {
                    self.previews
                        .gmm
                        .set_parameters(PreviewParameters::Mixture(model));
                }
            }
        }
        self.preprocessing = stage;
        debug!(?stage, "preprocessing stage entered");
        if let Some(event) = preview_event(stage) {
            self.events.emit(event);
        }
        self.events.emit(UpdateEvent::ModelUpdate);
        Ok(())
    }

    /// Disconnects the preview pipeline.
    pub fn close_preprocessing(&mut self) {
        self.preprocessing = PreprocessingStage::None;
        self.events.emit(UpdateEvent::ModelUpdate);
        self.events.flush();
    }

    /// Computes the speed field for the current stage.
    pub fn apply_preprocessing(&mut self) -> Result<()> {
        let result = self.apply_preprocessing_inner();
        self.finish(result)
    }

    fn apply_preprocessing_inner(&mut self) -> Result<()> {
        if self.preprocessing == PreprocessingStage::None {
            return Err(SnakeError::WrongStage {
                operation: "apply_preprocessing",
                reason: "no preprocessing stage is active",
            });
        }
        let channel = self.selected_channel().ok_or(SnakeError::NoScalarChannel)?;
        let request = SpeedRequest {
            stage: self.preprocessing,
            channel,
            threshold: &self.threshold,
            edge: &self.edge,
            mixture: self.clustering.mixture_model(),
        };
        self.host
            .compute_speed(request)
            .map_err(SnakeError::engine("speed computation"))?;
        info!(stage = ?self.preprocessing, "speed field computed");
        self.events.emit(UpdateEvent::ModelUpdate);
        Ok(())
    }

    /// `None` when no preprocessing stage is active.
    pub fn preview_enabled(&self) -> Option<bool> {
        self.previews
            .get(self.preprocessing)
            .map(|p| p.is_preview_mode())
    }

    pub fn set_preview_enabled(&mut self, enabled: bool) {
        let Some(preview) = self.previews.get_mut(self.preprocessing) else {
            return;
        };
        preview.set_preview_mode(enabled);
        if let Some(event) = preview_event(self.preprocessing) {
            self.events.emit(event);
        }
        self.events.flush();
    }

    // --- bubbles -------------------------------------------------------------

    pub fn bubbles(&self) -> &[Bubble] {
        self.bubbles.bubbles()
    }

    pub fn active_bubble(&self) -> Option<usize> {
        if self.mode.is_active() {
            self.bubbles.active()
        } else {
            None
        }
    }

    pub fn set_active_bubble(&mut self, index: Option<usize>) -> Result<()> {
        let result = self.bubbles.set_active(index, &mut self.events);
        self.finish(result)
    }

    pub fn add_bubble_at_cursor(&mut self, cursor: DVec3) -> usize {
        let index = self.bubbles.add_at_cursor(cursor, &mut self.events);
        self.events.flush();
        index
    }

    pub fn remove_active_bubble(&mut self) -> Result<Bubble> {
        let result = self.bubbles.remove_active(&mut self.events);
        self.finish(result)
    }

    /// `false` when the new center lies outside the image.
    pub fn update_bubble(&mut self, index: usize, bubble: Bubble) -> bool {
        let geometry = self.image.geometry();
        let accepted = self
            .bubbles
            .update(index, bubble, &geometry, &mut self.events);
        self.events.flush();
        accepted
    }

    pub fn bubble_radius(&self) -> Option<Bridged<f64>> {
        self.mode.is_active().then(|| Bridged {
            value: self.bubbles.radius(),
            range: self.bubbles.radius_range(),
        })
    }

    pub fn set_bubble_radius(&mut self, value: f64) {
        self.bubbles.set_radius(value, &mut self.events);
        self.events.flush();
    }

    /// Re-derives the default radius and slider range from the image geometry.
    pub fn compute_bubble_radius_domain(&mut self) {
        self.recompute_radius_domain();
        self.events.flush();
    }

    fn recompute_radius_domain(&mut self) {
        let domain = RadiusDomain::for_geometry(&self.image.geometry());
        debug!(
            default = domain.default,
            step = domain.range.step,
            max = domain.range.max,
            "bubble radius domain"
        );
        self.bubbles.apply_domain(domain, &mut self.events);
    }

    // --- clustering ----------------------------------------------------------

    pub fn mixture_model(&self) -> Option<&MixtureModel> {
        self.clustering.mixture_model()
    }

    pub fn cluster_count(&self) -> Option<Bridged<usize>> {
        self.clustering.cluster_count(&self.config)
    }

    pub fn sample_count(&self) -> Option<Bridged<usize>> {
        self.clustering
            .sample_count(&self.config, self.image.voxel_count())
    }

    pub fn set_cluster_count(&mut self, clusters: usize) -> Result<()> {
        let result = self.clustering.set_cluster_count(
            clusters,
            &self.config,
            self.previews.gmm.as_mut(),
            &mut self.events,
        );
        self.finish(result)
    }

    pub fn set_sample_count(&mut self, samples: usize) -> Result<()> {
        let voxels = self.image.voxel_count();
        let result = self.clustering.set_sample_count(
            samples,
            &self.config,
            voxels,
            self.previews.gmm.as_mut(),
            &mut self.events,
        );
        self.finish(result)
    }

    pub fn iterate_clustering(&mut self) -> Result<()> {
        let result = self
            .clustering
            .iterate(self.previews.gmm.as_mut(), &mut self.events);
        self.finish(result)
    }

    pub fn reinitialize_clustering(&mut self) -> Result<()> {
        let result = self
            .clustering
            .reinitialize(self.previews.gmm.as_mut(), &mut self.events);
        self.finish(result)
    }

    pub fn set_cluster_foreground(&mut self, cluster: usize, state: bool) -> Result<bool> {
        let result = self.clustering.set_foreground(
            cluster,
            state,
            self.previews.gmm.as_mut(),
            &mut self.events,
        );
        self.finish(result)
    }

    pub fn set_cluster_weight(&mut self, cluster: usize, weight: f64) -> Result<bool> {
        let result = self.clustering.set_weight(
            cluster,
            weight,
            self.previews.gmm.as_mut(),
            &mut self.events,
        );
        self.finish(result)
    }

    // --- evolution -----------------------------------------------------------

    pub fn step_size(&self) -> Bridged<usize> {
        Bridged {
            value: self.step_size,
            range: self.config.step_size_range(),
        }
    }

    pub fn set_step_size(&mut self, step_size: usize) -> Result<()> {
        let range: NumericRange<usize> = self.config.step_size_range();
        if !range.contains(step_size) {
            return Err(SnakeError::OutOfRange {
                what: "step size",
                value: step_size as f64,
                min: range.min as f64,
                max: range.max as f64,
            });
        }
        self.step_size = step_size;
        Ok(())
    }

    pub fn evolution_phase(&self) -> EvolutionPhase {
        self.evolution.phase()
    }

    pub fn iteration_count(&self) -> usize {
        if self.mode.is_active() {
            self.evolution.iteration_count()
        } else {
            0
        }
    }

    /// Initializes the contour from the bubbles or the manual segmentation.
    pub fn enter_evolution(&mut self) -> Result<()> {
        let result = self.enter_evolution_inner();
        self.finish(result)
    }

    fn enter_evolution_inner(&mut self) -> Result<()> {
        self.require_snake_mode("enter_evolution")?;
        let valid = self.is_enabled(Capability::InitializationValid);
        let seeds = Seeds {
            bubbles: self.bubbles.bubbles(),
            manual_segmentation: self.host.initialized_with_manual_segmentation(),
        };
        self.evolution.enter_stage(seeds, valid, &mut self.events)
    }

    pub fn step_evolution(&mut self, step_size: usize) -> Result<usize> {
        let result = self.evolution.step(step_size, &mut self.events);
        self.finish(result)
    }

    /// Steps by the configured step size.
    pub fn perform_evolution_step(&mut self) -> Result<usize> {
        self.step_evolution(self.step_size)
    }

    pub fn rewind_evolution(&mut self) {
        self.evolution.rewind(&mut self.events);
        self.events.flush();
    }

    /// Back navigation (`commit == false`) or finishing the wizard (`commit == true`).
    pub fn leave_evolution(&mut self, commit: bool) -> Result<()> {
        let result = self.leave_evolution_inner(commit);
        self.finish(result)
    }

    fn leave_evolution_inner(&mut self, commit: bool) -> Result<()> {
        self.evolution.leave_stage(
            commit,
            &self.config.undo_label,
            self.host.as_mut(),
            &mut self.events,
        )?;
        if commit {
            self.reset_to_inactive();
        }
        Ok(())
    }
}

fn preview_event(stage: PreprocessingStage) -> Option<UpdateEvent> {
    match stage {
        PreprocessingStage::None => None,
        PreprocessingStage::Threshold => Some(UpdateEvent::ThresholdPreviewModified),
        PreprocessingStage::Edge => Some(UpdateEvent::EdgePreviewModified),
        PreprocessingStage::Gmm => Some(UpdateEvent::GmmPreviewModified),
    }
}
