//! Discrete front propagation over the shared speed field.
//!
//! Each iteration grows the region into 6-neighbours whose speed exceeds
//! [`GROW_CUTOFF`] and retreats from boundary voxels with negative speed.
//! Positive speeds below the cutoff hold the front in place, which is what
//! stops an edge-driven front at strong gradients.

use glam::{DVec3, IVec3};
use snake_core::collab::{EvolutionEngine, Seeds, VolumeGeometry};
use snake_core::EngineFailure;
use tracing::debug;

use super::host::SharedWorkspace;
use super::volume::{physical_center, voxel_coords, voxel_index};

pub const GROW_CUTOFF: f32 = 0.1;

const NEIGHBOURS: [IVec3; 6] = [
    IVec3::X,
    IVec3::NEG_X,
    IVec3::Y,
    IVec3::NEG_Y,
    IVec3::Z,
    IVec3::NEG_Z,
];

pub struct FrontPropagation {
    workspace: SharedWorkspace,
    geometry: VolumeGeometry,
    speed: Vec<f32>,
    initial: Vec<bool>,
    region: Vec<bool>,
    elapsed: usize,
    active: bool,
}

impl FrontPropagation {
    pub fn new(workspace: SharedWorkspace, geometry: VolumeGeometry) -> Self {
        Self {
            workspace,
            geometry,
            speed: Vec::new(),
            initial: Vec::new(),
            region: Vec::new(),
            elapsed: 0,
            active: false,
        }
    }

    fn neighbours(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        let c = voxel_coords(&self.geometry, index).as_ivec3();
        NEIGHBOURS.iter().filter_map(move |&d| {
            let n = c + d;
            self.geometry
                .contains_index(n)
                .then(|| voxel_index(&self.geometry, n.as_uvec3()))
        })
    }

    /// The volume border counts as outside.
    fn touches_outside(&self, index: usize) -> bool {
        let mut inside = 0;
        for n in self.neighbours(index) {
            if !self.region[n] {
                return true;
            }
            inside += 1;
        }
        inside < NEIGHBOURS.len()
    }

    /// One front update; `false` once the region stopped changing.
    fn advance(&mut self) -> bool {
        let next: Vec<bool> = (0..self.region.len())
            .map(|i| {
                let s = self.speed[i];
                if self.region[i] {
                    !(s < 0.0 && self.touches_outside(i))
                } else {
                    s > GROW_CUTOFF && self.neighbours(i).any(|n| self.region[n])
                }
            })
            .collect();
        let changed = next != self.region;
        self.region = next;
        changed
    }

    fn publish(&self) {
        if let Some(working) = self.workspace.borrow_mut().working.as_mut() {
            working.copy_from_slice(&self.region);
        }
    }

    fn seed_region(&self, seeds: &Seeds<'_>) -> Vec<bool> {
        let spacing = self.geometry.spacing;
        let centers: Vec<(DVec3, f64)> = seeds
            .bubbles
            .iter()
            .map(|b| ((b.center.as_dvec3() + DVec3::splat(0.5)) * spacing, b.radius))
            .collect();
        let manual = seeds
            .manual_segmentation
            .then(|| self.workspace.borrow().manual_seed.clone())
            .flatten();
        (0..self.geometry.voxel_count())
            .map(|i| {
                let p = physical_center(&self.geometry, i);
                let in_bubble = centers.iter().any(|&(c, r)| p.distance(c) <= r);
                in_bubble || manual.as_ref().is_some_and(|m| m[i])
            })
            .collect()
    }
}

impl EvolutionEngine for FrontPropagation {
    fn initialize(&mut self, seeds: Seeds<'_>) -> Result<bool, EngineFailure> {
        let speed = self
            .workspace
            .borrow()
            .speed
            .clone()
            .ok_or_else(|| EngineFailure::new("speed image has not been computed"))?;
        let region = self.seed_region(&seeds);
        let seeded = region.iter().filter(|&&v| v).count();
        if seeded == 0 {
            debug!("seeds cover no voxels");
            return Ok(false);
        }
        self.speed = speed;
        self.initial = region.clone();
        self.region = region;
        self.elapsed = 0;
        self.active = true;
        self.publish();
        debug!(seeded, "front initialized");
        Ok(true)
    }

    fn step(&mut self, steps: usize) -> Result<usize, EngineFailure> {
        if !self.active {
            return Err(EngineFailure::new("front propagation is not initialized"));
        }
        let mut taken = 0;
        while taken < steps {
            taken += 1;
            if !self.advance() {
                break;
            }
        }
        self.elapsed += taken;
        self.publish();
        Ok(taken)
    }

    fn rewind(&mut self) {
        self.region = self.initial.clone();
        self.elapsed = 0;
        self.publish();
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
