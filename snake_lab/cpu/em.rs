//! Expectation-maximization fitting of a 1-D intensity mixture on a voxel sample.

use rand::{seq::index, SeedableRng};
use rand_chacha::ChaCha8Rng;
use snake_core::channels::ScalarChannel;
use snake_core::collab::{ClusteringEngine, ClusteringEngineFactory, ImageSource};
use snake_core::gmm::{GaussianComponent, MixtureModel};
use snake_core::EngineFailure;
use tracing::debug;

use super::volume::SyntheticVolume;

const VARIANCE_FLOOR: f64 = 1e-3;
const DEFAULT_CLUSTERS: usize = 3;
const DEFAULT_SAMPLES: usize = 5000;

pub struct EmClustering {
    volume: SyntheticVolume,
    clusters: usize,
    samples: usize,
    drawn: Vec<f64>,
    model: MixtureModel,
    rng: ChaCha8Rng,
}

impl EmClustering {
    pub fn new(volume: SyntheticVolume, clusters: usize, samples: usize, seed: u64) -> Self {
        Self {
            volume,
            clusters,
            samples,
            drawn: Vec::new(),
            model: MixtureModel::default(),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    fn draw_samples(&mut self) {
        let voxels = self.volume.voxels();
        let amount = self.samples.min(voxels.len());
        self.drawn = index::sample(&mut self.rng, voxels.len(), amount)
            .into_iter()
            .map(|i| f64::from(voxels[i]))
            .collect();
    }

    /// Log-likelihood of the current sample under the model.
    pub fn log_likelihood(&self) -> f64 {
        self.drawn
            .iter()
            .map(|&x| {
                let p: f64 = self
                    .model
                    .components()
                    .iter()
                    .map(|c| c.weight * c.density(x))
                    .sum();
                p.max(f64::MIN_POSITIVE).ln()
            })
            .sum()
    }
}

impl ClusteringEngine for EmClustering {
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

    /// Means spread evenly over the sampled intensity span, equal weights, pooled variance.
    fn initialize_clusters(&mut self) -> Result<(), EngineFailure> {
        self.draw_samples();
        if self.clusters == 0 || self.drawn.len() < self.clusters {
            return Err(EngineFailure::new(format!(
                "cannot fit {} clusters to {} samples",
                self.clusters,
                self.drawn.len()
            )));
        }
        let n = self.drawn.len() as f64;
        let mean = self.drawn.iter().sum::<f64>() / n;
        let variance = self.drawn.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        let (lo, hi) = self
            .drawn
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| (lo.min(x), hi.max(x)));
        let k = self.clusters;
        let pooled = (variance / (k * k) as f64).max(VARIANCE_FLOOR);
        let components = (0..k)
            .map(|i| {
                let t = (i as f64 + 0.5) / k as f64;
                GaussianComponent::new(lo + t * (hi - lo), pooled, 1.0)
            })
            .collect();
        self.model = MixtureModel::new(components);
        debug!(k, samples = self.drawn.len(), "mixture initialized");
        Ok(())
    }

    fn iterate(&mut self) -> Result<(), EngineFailure> {
        let k = self.model.len();
        if k == 0 || self.drawn.is_empty() {
            return Err(EngineFailure::new("mixture is not initialized"));
        }
        let mut mass = vec![0.0; k];
        let mut first = vec![0.0; k];
        let mut second = vec![0.0; k];
        let mut resp = vec![0.0; k];
        for &x in &self.drawn {
            let mut total = 0.0;
            for (r, c) in resp.iter_mut().zip(self.model.components()) {
                *r = c.weight * c.density(x);
                total += *r;
            }
            if total <= 0.0 {
                continue;
            }
            for j in 0..k {
                let r = resp[j] / total;
                mass[j] += r;
                first[j] += r * x;
                second[j] += r * x * x;
            }
        }
        let n = self.drawn.len() as f64;
        let components = self.model.components_mut();
        for j in 0..k {
            if mass[j] <= f64::EPSILON {
                continue;
            }
            let mean = first[j] / mass[j];
            components[j].mean = mean;
            components[j].variance = (second[j] / mass[j] - mean * mean).max(VARIANCE_FLOOR);
            components[j].weight = mass[j] / n;
        }
        let total = self.model.total_weight();
        if !(total.is_finite() && total > 0.0) {
            return Err(EngineFailure::new("mixture weights collapsed"));
        }
        for c in self.model.components_mut() {
            c.weight /= total;
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

/// Creates [`EmClustering`] engines over a fixed volume.
pub struct EmClusteringFactory {
    volume: SyntheticVolume,
    seed: u64,
    created: usize,
}

impl EmClusteringFactory {
    pub fn new(volume: SyntheticVolume, seed: u64) -> Self {
        Self {
            volume,
            seed,
            created: 0,
        }
    }
}

impl ClusteringEngineFactory for EmClusteringFactory {
    fn create(
        &mut self,
        image: &dyn ImageSource,
        channel: ScalarChannel,
    ) -> Result<Box<dyn ClusteringEngine>, EngineFailure> {
        if image.channel_stats(channel).is_none() {
            return Err(EngineFailure::new(format!("channel {channel:?} has no data")));
        }
        let samples = DEFAULT_SAMPLES.min(image.voxel_count());
        let seed = self.seed.wrapping_add(self.created as u64);
        self.created += 1;
        Ok(Box::new(EmClustering::new(
            self.volume.clone(),
            DEFAULT_CLUSTERS,
            samples,
            seed,
        )))
    }
}
