//! Spherical seed regions and the radius domain derived from volume geometry.

use glam::{DVec3, IVec3};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::collab::VolumeGeometry;
use crate::error::{Result, SnakeError};
use crate::events::{Broadcaster, UpdateEvent};
use crate::range::{nice_step_at_most, NumericRange};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bubble {
    /// Center in voxel index space.
    pub center: IVec3,
    /// Radius in physical units.
    pub radius: f64,
}

/// Default radius and slider domain for a volume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadiusDomain {
    pub default: f64,
    pub range: NumericRange<f64>,
}

impl RadiusDomain {
    pub fn for_geometry(geometry: &VolumeGeometry) -> Self {
        let min_extent = geometry.extents().min_element();
        let max_radius = 0.5 * min_extent;
        let step = nice_step_at_most(0.5 * geometry.spacing.min_element());
        let default = (0.25 * max_radius / step).floor() * step;
        Self {
            default,
            range: NumericRange::new(step, max_radius, step),
        }
    }
}

impl Default for RadiusDomain {
    fn default() -> Self {
        Self {
            default: 1.0,
            range: NumericRange::new(1.0, 1.0, 1.0),
        }
    }
}

/// Ordered bubbles plus the active selection and the radius used for new ones.
#[derive(Debug, Clone)]
pub struct BubbleStore {
    bubbles: Vec<Bubble>,
    active: Option<usize>,
    default_radius: f64,
    range: NumericRange<f64>,
}

impl Default for BubbleStore {
    fn default() -> Self {
        let domain = RadiusDomain::default();
        Self {
            bubbles: Vec::new(),
            active: None,
            default_radius: domain.default,
            range: domain.range,
        }
    }
}

impl BubbleStore {
    pub fn bubbles(&self) -> &[Bubble] {
        &self.bubbles
    }

    pub fn len(&self) -> usize {
        self.bubbles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bubbles.is_empty()
    }

    pub fn active(&self) -> Option<usize> {
        self.active
    }

    pub fn default_radius(&self) -> f64 {
        self.default_radius
    }

    pub fn radius_range(&self) -> NumericRange<f64> {
        self.range
    }

    pub fn set_active(&mut self, index: Option<usize>, events: &mut Broadcaster) -> Result<()> {
        if let Some(i) = index {
            if i >= self.bubbles.len() {
                return Err(SnakeError::BubbleIndexOutOfRange {
                    index: i,
                    len: self.bubbles.len(),
                });
            }
        }
        self.active = index;
        events.emit(UpdateEvent::ActiveBubbleUpdate);
        Ok(())
    }

    /// Appends a bubble at the voxel nearest to `cursor` and selects it.
    pub fn add_at_cursor(&mut self, cursor: DVec3, events: &mut Broadcaster) -> usize {
        let bubble = Bubble {
            center: cursor.round().as_ivec3(),
            radius: self.default_radius,
        };
        self.bubbles.push(bubble);
        let index = self.bubbles.len() - 1;
        self.active = Some(index);
        debug!(index, center = ?bubble.center, radius = bubble.radius, "bubble added");
        events.emit(UpdateEvent::ActiveBubbleUpdate);
        events.emit(UpdateEvent::BubbleListUpdate);
        events.emit(UpdateEvent::BubbleDefaultRadiusUpdate);
        index
    }

    pub fn remove_active(&mut self, events: &mut Broadcaster) -> Result<Bubble> {
        let index = match self.active {
            Some(i) if i < self.bubbles.len() => i,
            other => return Err(SnakeError::InvalidBubbleIndex { index: other }),
        };
        let removed = self.bubbles.remove(index);
        if index == self.bubbles.len() {
            self.active = index.checked_sub(1);
        }
        debug!(index, "bubble removed");
        events.emit(UpdateEvent::ActiveBubbleUpdate);
        events.emit(UpdateEvent::BubbleListUpdate);
        events.emit(UpdateEvent::BubbleDefaultRadiusUpdate);
        Ok(removed)
    }

    /// Replaces bubble `index`; returns `false` when the new center lies outside the volume.
    ///
    /// # Panics
    /// If `index` is not a valid position in the collection.
    pub fn update(
        &mut self,
        index: usize,
        bubble: Bubble,
        geometry: &VolumeGeometry,
        events: &mut Broadcaster,
    ) -> bool {
        if !geometry.contains_index(bubble.center) {
            debug!(index, center = ?bubble.center, "rejected bubble outside the volume");
            return false;
        }
        self.bubbles[index] = bubble;
        events.emit(UpdateEvent::BubbleDefaultRadiusUpdate);
        true
    }

    /// Radius of the active bubble, or the default for new bubbles.
    pub fn radius(&self) -> f64 {
        match self.active.and_then(|i| self.bubbles.get(i)) {
            Some(bubble) => bubble.radius,
            None => self.default_radius,
        }
    }

    pub fn set_radius(&mut self, value: f64, events: &mut Broadcaster) {
        if let Some(bubble) = self.active.and_then(|i| self.bubbles.get_mut(i)) {
            bubble.radius = value;
            events.emit(UpdateEvent::BubbleListUpdate);
        }
        self.default_radius = value;
        events.emit(UpdateEvent::BubbleDefaultRadiusUpdate);
    }

    pub fn apply_domain(&mut self, domain: RadiusDomain, events: &mut Broadcaster) {
        self.default_radius = domain.default;
        self.range = domain.range;
        events.emit(UpdateEvent::BubbleDefaultRadiusUpdate);
    }

    pub fn clear(&mut self, events: &mut Broadcaster) {
        if self.bubbles.is_empty() && self.active.is_none() {
            return;
        }
        self.bubbles.clear();
        self.active = None;
        events.emit(UpdateEvent::ActiveBubbleUpdate);
        events.emit(UpdateEvent::BubbleListUpdate);
    }
}
