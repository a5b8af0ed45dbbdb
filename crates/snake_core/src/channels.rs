//! Scalar channels selectable as the segmentation input.

use serde::{Deserialize, Serialize};

/// Host-assigned identifier of an image layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LayerId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayerRole {
    Main,
    Overlay,
    /// Layers that never feed segmentation (labels, speed, ...).
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerInfo {
    pub id: LayerId,
    pub name: String,
    pub role: LayerRole,
    /// Number of components; scalar layers report 1.
    pub components: u32,
}

/// One (layer, component) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScalarChannel {
    pub layer: LayerId,
    pub component: u32,
}

/// Lazily rebuilt list of channels; dropped whenever the layer set changes.
#[derive(Debug, Default)]
pub(crate) struct ChannelCache {
    entries: Option<Vec<ScalarChannel>>,
}

impl ChannelCache {
    pub fn invalidate(&mut self) {
        self.entries = None;
    }

    /// First channel of the cached list; a stale cache reads `layers` without storing them.
    pub fn first(&self, layers: impl FnOnce() -> Vec<LayerInfo>) -> Option<ScalarChannel> {
        match &self.entries {
            Some(entries) => entries.first().copied(),
            None => channels_for(&layers()).first().copied(),
        }
    }

    pub fn get_or_rebuild(&mut self, layers: impl FnOnce() -> Vec<LayerInfo>) -> &[ScalarChannel] {
        self.entries.get_or_insert_with(|| channels_for(&layers()))
    }
}

pub(crate) fn channels_for(layers: &[LayerInfo]) -> Vec<ScalarChannel> {
    layers
        .iter()
        .filter(|layer| matches!(layer.role, LayerRole::Main | LayerRole::Overlay))
        .flat_map(|layer| {
            (0..layer.components.max(1)).map(move |component| ScalarChannel {
                layer: layer.id,
                component,
            })
        })
        .collect()
}
