//! Intensity mixture model shared between the clustering engine and the GMM preview.

use serde::{Deserialize, Serialize};

use crate::Scalar;

const MIN_VARIANCE: Scalar = 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaussianComponent {
    pub mean: Scalar,
    pub variance: Scalar,
    pub weight: Scalar,
    pub foreground: bool,
}

impl GaussianComponent {
    pub fn new(mean: Scalar, variance: Scalar, weight: Scalar) -> Self {
        Self {
            mean,
            variance: variance.max(MIN_VARIANCE),
            weight,
            foreground: false,
        }
    }

    pub fn density(&self, x: Scalar) -> Scalar {
        let var = self.variance.max(MIN_VARIANCE);
        let d = x - self.mean;
        (-0.5 * d * d / var).exp() / (2.0 * std::f64::consts::PI * var).sqrt()
    }
}

/// Ordered Gaussian components whose weights sum to one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MixtureModel {
    components: Vec<GaussianComponent>,
}

impl MixtureModel {
    /// Builds a model, normalizing the supplied weights.
    pub fn new(components: Vec<GaussianComponent>) -> Self {
        let mut model = Self { components };
        model.normalize_weights();
        model
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn components(&self) -> &[GaussianComponent] {
        &self.components
    }

    pub fn component(&self, index: usize) -> Option<&GaussianComponent> {
        self.components.get(index)
    }

    /// Mutable access for engines updating means and variances in place.
    pub fn components_mut(&mut self) -> &mut [GaussianComponent] {
        &mut self.components
    }

    pub fn weight(&self, index: usize) -> Option<Scalar> {
        self.components.get(index).map(|c| c.weight)
    }

    pub fn total_weight(&self) -> Scalar {
        self.components.iter().map(|c| c.weight).sum()
    }

    pub fn is_foreground(&self, index: usize) -> bool {
        self.components.get(index).is_some_and(|c| c.foreground)
    }

    pub fn foreground_count(&self) -> usize {
        self.components.iter().filter(|c| c.foreground).count()
    }

    /// Marks `index` as the only foreground component.
    pub fn set_exclusive_foreground(&mut self, index: usize) {
        for (i, component) in self.components.iter_mut().enumerate() {
            component.foreground = i == index;
        }
    }

    pub fn set_background(&mut self, index: usize) {
        if let Some(component) = self.components.get_mut(index) {
            component.foreground = false;
        }
    }

    /// Assigns `weight` to one component and rescales the others so the total stays one.
    ///
    /// `weight` is expected in `(0, 1)`. When every other component has zero weight
    /// the remainder is shared evenly.
    pub fn set_weight_and_renormalize(&mut self, index: usize, weight: Scalar) {
        let others: Scalar = self
            .components
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .map(|(_, c)| c.weight)
            .sum();
        let remainder = 1.0 - weight;
        let n_others = self.components.len().saturating_sub(1);
        for (i, component) in self.components.iter_mut().enumerate() {
            if i == index {
                component.weight = weight;
            } else if others > 0.0 {
                component.weight *= remainder / others;
            } else if n_others > 0 {
                component.weight = remainder / n_others as Scalar;
            }
        }
    }

    /// Posterior probability that `x` was drawn from a foreground component.
    pub fn foreground_posterior(&self, x: Scalar) -> Scalar {
        let mut total = 0.0;
        let mut fg = 0.0;
        for component in &self.components {
            let p = component.weight * component.density(x);
            total += p;
            if component.foreground {
                fg += p;
            }
        }
        if total > 0.0 {
            fg / total
        } else {
            0.0
        }
    }

    fn normalize_weights(&mut self) {
        if self.components.is_empty() {
            return;
        }
        let total = self.total_weight();
        if total > 0.0 {
            let inv = 1.0 / total;
            for component in &mut self.components {
                component.weight *= inv;
            }
        } else {
            let uniform = 1.0 / self.components.len() as Scalar;
            for component in &mut self.components {
                component.weight = uniform;
            }
        }
    }
}
