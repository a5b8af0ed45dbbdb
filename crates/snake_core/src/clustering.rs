//! Drives the mixture fitting engine and keeps the GMM preview in sync with it.
//!
//! Every mutating operation pushes the current mixture model to the GMM
//! previewer before returning, so a preview render requested right after the
//! call never sees stale parameters.

use tracing::{debug, info};

use crate::collab::{ClusteringEngine, PreviewFilter, PreviewParameters};
use crate::config::SessionConfig;
use crate::error::{Result, SnakeError};
use crate::events::{Broadcaster, UpdateEvent};
use crate::gmm::MixtureModel;
use crate::range::{Bridged, NumericRange};

const STAGE: &str = "clustering engine";

#[derive(Default)]
pub struct ClusteringCoordinator {
    engine: Option<Box<dyn ClusteringEngine>>,
}

impl ClusteringCoordinator {
    pub fn is_attached(&self) -> bool {
        self.engine.is_some()
    }

    pub fn attach(&mut self, engine: Box<dyn ClusteringEngine>) {
        self.engine = Some(engine);
    }

    /// Drops the engine and its mixture model.
    pub fn detach(&mut self) -> bool {
        self.engine.take().is_some()
    }

    pub fn mixture_model(&self) -> Option<&MixtureModel> {
        self.engine.as_deref().map(|e| e.mixture_model())
    }

    pub fn cluster_count(&self, config: &SessionConfig) -> Option<Bridged<usize>> {
        let engine = self.engine.as_deref()?;
        Some(Bridged {
            value: engine.number_of_clusters(),
            range: config.cluster_range(),
        })
    }

    pub fn sample_count(&self, config: &SessionConfig, voxels: usize) -> Option<Bridged<usize>> {
        let engine = self.engine.as_deref()?;
        Some(Bridged {
            value: engine.number_of_samples(),
            range: config.sample_range(voxels),
        })
    }

    pub fn set_cluster_count(
        &mut self,
        clusters: usize,
        config: &SessionConfig,
        preview: &mut dyn PreviewFilter,
        events: &mut Broadcaster,
    ) -> Result<()> {
        let engine = self.engine.as_deref_mut().ok_or(SnakeError::ClusteringNotAttached)?;
        check_domain("cluster count", clusters, config.cluster_range())?;
        engine.set_number_of_clusters(clusters);
        info!(clusters, "cluster count changed");
        reinitialize(engine, preview, events)
    }

    pub fn set_sample_count(
        &mut self,
        samples: usize,
        config: &SessionConfig,
        voxels: usize,
        preview: &mut dyn PreviewFilter,
        events: &mut Broadcaster,
    ) -> Result<()> {
        let engine = self.engine.as_deref_mut().ok_or(SnakeError::ClusteringNotAttached)?;
        check_domain("sample count", samples, config.sample_range(voxels))?;
        engine.set_number_of_samples(samples);
        info!(samples, "sample count changed");
        reinitialize(engine, preview, events)
    }

    pub fn iterate(
        &mut self,
        preview: &mut dyn PreviewFilter,
        events: &mut Broadcaster,
    ) -> Result<()> {
        let engine = self.engine.as_deref_mut().ok_or(SnakeError::ClusteringNotAttached)?;
        engine.iterate().map_err(SnakeError::engine(STAGE))?;
        debug!("clustering iteration done");
        sync_preview(engine, preview, events);
        Ok(())
    }

    pub fn reinitialize(
        &mut self,
        preview: &mut dyn PreviewFilter,
        events: &mut Broadcaster,
    ) -> Result<()> {
        let engine = self.engine.as_deref_mut().ok_or(SnakeError::ClusteringNotAttached)?;
        reinitialize(engine, preview, events)
    }

    /// Only one cluster may be foreground; `Ok(false)` when nothing changed.
    pub fn set_foreground(
        &mut self,
        cluster: usize,
        state: bool,
        preview: &mut dyn PreviewFilter,
        events: &mut Broadcaster,
    ) -> Result<bool> {
        let engine = self.engine.as_deref_mut().ok_or(SnakeError::ClusteringNotAttached)?;
        let model = engine.mixture_model_mut();
        check_cluster(cluster, model)?;
        if model.is_foreground(cluster) == state {
            return Ok(false);
        }
        if state {
            model.set_exclusive_foreground(cluster);
        } else {
            model.set_background(cluster);
        }
        debug!(cluster, state, "cluster foreground changed");
        sync_preview(engine, preview, events);
        Ok(true)
    }

    /// `Ok(false)` when `weight` equals the current weight.
    pub fn set_weight(
        &mut self,
        cluster: usize,
        weight: f64,
        preview: &mut dyn PreviewFilter,
        events: &mut Broadcaster,
    ) -> Result<bool> {
        let engine = self.engine.as_deref_mut().ok_or(SnakeError::ClusteringNotAttached)?;
        let model = engine.mixture_model_mut();
        check_cluster(cluster, model)?;
        if model.weight(cluster) == Some(weight) {
            debug!(cluster, weight, "cluster weight unchanged");
            return Ok(false);
        }
        // Every component must keep a weight in (0, 1].
        if !(weight > 0.0 && weight < 1.0) {
            return Err(SnakeError::OutOfRange {
                what: "cluster weight",
                value: weight,
                min: 0.0,
                max: 1.0,
            });
        }
        model.set_weight_and_renormalize(cluster, weight);
        sync_preview(engine, preview, events);
        Ok(true)
    }
}

fn reinitialize(
    engine: &mut dyn ClusteringEngine,
    preview: &mut dyn PreviewFilter,
    events: &mut Broadcaster,
) -> Result<()> {
    engine
        .initialize_clusters()
        .map_err(SnakeError::engine(STAGE))?;
    sync_preview(engine, preview, events);
    Ok(())
}

fn sync_preview(
    engine: &dyn ClusteringEngine,
    preview: &mut dyn PreviewFilter,
    events: &mut Broadcaster,
) {
    preview.set_parameters(PreviewParameters::Mixture(engine.mixture_model()));
    events.emit(UpdateEvent::GmmModified);
}

fn check_cluster(cluster: usize, model: &MixtureModel) -> Result<()> {
    if cluster < model.len() {
        Ok(())
    } else {
        Err(SnakeError::OutOfRange {
            what: "cluster index",
            value: cluster as f64,
            min: 0.0,
            max: model.len().saturating_sub(1) as f64,
        })
    }
}

fn check_domain(what: &'static str, value: usize, range: NumericRange<usize>) -> Result<()> {
    if range.contains(value) {
        Ok(())
    } else {
        Err(SnakeError::OutOfRange {
            what,
            value: value as f64,
            min: range.min as f64,
            max: range.max as f64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::events::PropagationGraph;
    use crate::testing::{FakeClustering, FakePreview};

    struct Rig {
        coordinator: ClusteringCoordinator,
        preview: FakePreview,
        events: Broadcaster,
        config: SessionConfig,
    }

    fn rig() -> Rig {
        let mut coordinator = ClusteringCoordinator::default();
        coordinator.attach(Box::new(FakeClustering::new(3, 5000)));
        Rig {
            coordinator,
            preview: FakePreview::default(),
            events: Broadcaster::new(PropagationGraph::wizard()),
            config: SessionConfig::default(),
        }
    }

    #[test]
    fn operations_without_engine_are_precondition_violations() {
        let mut coordinator = ClusteringCoordinator::default();
        let mut preview = FakePreview::default();
        let mut events = Broadcaster::new(PropagationGraph::wizard());
        let err = coordinator
            .set_cluster_count(4, &SessionConfig::default(), &mut preview, &mut events)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Precondition);
        assert!(coordinator.iterate(&mut preview, &mut events).is_err());
        assert!(coordinator.cluster_count(&SessionConfig::default()).is_none());
        assert_eq!(preview.updates, 0);
    }

    #[test]
    fn cluster_count_reinitializes_and_refreshes_preview() {
        let mut r = rig();
        r.coordinator
            .set_cluster_count(5, &r.config, &mut r.preview, &mut r.events)
            .unwrap();
        let model = r.coordinator.mixture_model().unwrap();
        assert_eq!(model.len(), 5);
        assert_eq!(r.preview.last_mixture.as_ref(), Some(model));
        assert!(r.events.flush().contains(&UpdateEvent::GmmModified));
    }

    #[test]
    fn cluster_count_outside_domain_is_rejected() {
        let mut r = rig();
        for bad in [1, 21] {
            let err = r
                .coordinator
                .set_cluster_count(bad, &r.config, &mut r.preview, &mut r.events)
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Domain);
        }
        assert_eq!(r.coordinator.mixture_model().unwrap().len(), 3);
    }

    #[test]
    fn sample_count_domain_tracks_voxel_count() {
        let mut r = rig();
        assert!(r
            .coordinator
            .set_sample_count(4000, &r.config, 100_000, &mut r.preview, &mut r.events)
            .is_err());
        r.coordinator
            .set_sample_count(4000, &r.config, 4000, &mut r.preview, &mut r.events)
            .unwrap();
        let bridged = r.coordinator.sample_count(&r.config, 4000).unwrap();
        assert_eq!(bridged.value, 4000);
        assert_eq!(bridged.range.min, 4000);
    }

    #[test]
    fn foreground_is_mutually_exclusive() {
        let mut r = rig();
        assert!(r
            .coordinator
            .set_foreground(0, true, &mut r.preview, &mut r.events)
            .unwrap());
        assert!(r
            .coordinator
            .set_foreground(2, true, &mut r.preview, &mut r.events)
            .unwrap());
        let model = r.coordinator.mixture_model().unwrap();
        assert_eq!(model.foreground_count(), 1);
        assert!(model.is_foreground(2));
        assert_eq!(r.preview.last_mixture.as_ref(), Some(model));
    }

    #[test]
    fn repeating_foreground_state_is_a_no_op() {
        let mut r = rig();
        r.coordinator
            .set_foreground(1, true, &mut r.preview, &mut r.events)
            .unwrap();
        r.events.flush();
        let updates = r.preview.updates;
        assert!(!r
            .coordinator
            .set_foreground(1, true, &mut r.preview, &mut r.events)
            .unwrap());
        assert_eq!(r.preview.updates, updates);
        assert!(r.events.flush().is_empty());
    }

    #[test]
    fn weight_edits_renormalize_or_do_nothing() {
        let mut r = rig();
        let before = r.coordinator.mixture_model().unwrap().clone();
        let current = before.weight(0).unwrap();
        assert!(!r
            .coordinator
            .set_weight(0, current, &mut r.preview, &mut r.events)
            .unwrap());
        assert_eq!(r.coordinator.mixture_model().unwrap(), &before);

        assert!(r
            .coordinator
            .set_weight(0, 0.6, &mut r.preview, &mut r.events)
            .unwrap());
        let model = r.coordinator.mixture_model().unwrap();
        assert!((model.total_weight() - 1.0).abs() < 1e-9);
        assert_eq!(model.weight(0), Some(0.6));
    }

    #[test]
    fn weights_at_either_end_are_rejected() {
        let mut r = rig();
        let before = r.coordinator.mixture_model().unwrap().clone();
        for weight in [0.0, 1.0, -0.2, 1.5] {
            let err = r
                .coordinator
                .set_weight(1, weight, &mut r.preview, &mut r.events)
                .unwrap_err();
            assert!(matches!(err, SnakeError::OutOfRange { .. }), "{weight}: {err}");
        }
        assert_eq!(r.coordinator.mixture_model().unwrap(), &before);
        assert!(r.events.flush().is_empty());
    }

    #[test]
    fn iterate_propagates_engine_failures() {
        let mut coordinator = ClusteringCoordinator::default();
        let mut engine = FakeClustering::new(2, 100);
        engine.fail_iterate = true;
        coordinator.attach(Box::new(engine));
        let mut preview = FakePreview::default();
        let mut events = Broadcaster::new(PropagationGraph::wizard());
        let err = coordinator.iterate(&mut preview, &mut events).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Domain);
        assert_eq!(preview.updates, 0);
    }
}
