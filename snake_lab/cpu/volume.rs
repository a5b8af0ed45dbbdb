//! Deterministic synthetic volumes: a bright ellipsoid in a noisy background.

use std::rc::Rc;

use glam::{DVec3, UVec3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use snake_core::channels::{LayerId, LayerInfo, LayerRole, ScalarChannel};
use snake_core::collab::{ChannelStats, ImageSource, VolumeGeometry};
use snake_core::functors::default_speed_mapping;
use snake_core::mapping::IntensityMapping;

pub const MAIN_LAYER: LayerId = LayerId(1);

/// Parameters of a generated volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeSpec {
    pub dims: [u32; 3],
    pub spacing: [f64; 3],
    pub background: f32,
    pub foreground: f32,
    /// Half-width of the uniform noise added to every voxel.
    pub noise: f32,
    /// Ellipsoid semi-axes as fractions of the volume extent.
    pub radii: [f64; 3],
    pub seed: u64,
}

impl Default for VolumeSpec {
    fn default() -> Self {
        Self {
            dims: [32, 32, 16],
            spacing: [1.0, 1.0, 2.0],
            background: 100.0,
            foreground: 800.0,
            noise: 20.0,
            radii: [0.25, 0.25, 0.25],
            seed: 0x5EED,
        }
    }
}

/// Voxel buffers are shared, so clones are cheap and see the same data.
#[derive(Debug, Clone)]
pub struct SyntheticVolume {
    geometry: VolumeGeometry,
    voxels: Rc<[f32]>,
    gradient: Rc<[f32]>,
    truth: Rc<[bool]>,
    min: f32,
    max: f32,
    gradient_max: f32,
}

impl SyntheticVolume {
    pub fn generate(spec: &VolumeSpec) -> Self {
        let geometry = VolumeGeometry {
            dims: UVec3::from_array(spec.dims),
            spacing: DVec3::from_array(spec.spacing),
        };
        let mut rng = ChaCha8Rng::seed_from_u64(spec.seed);
        let extents = geometry.extents();
        let center = 0.5 * extents;
        let semi_axes = DVec3::from_array(spec.radii) * extents;

        let count = geometry.voxel_count();
        let mut voxels = Vec::with_capacity(count);
        let mut truth = Vec::with_capacity(count);
        for index in 0..count {
            let p = physical_center(&geometry, index);
            let q = (p - center) / semi_axes.max(DVec3::splat(f64::EPSILON));
            let inside = q.length_squared() <= 1.0;
            let base = if inside { spec.foreground } else { spec.background };
            let jitter = if spec.noise > 0.0 {
                rng.gen_range(-spec.noise..=spec.noise)
            } else {
                0.0
            };
            voxels.push(base + jitter);
            truth.push(inside);
        }

        let gradient = gradient_magnitude(&geometry, &voxels);
        let (min, max) = min_max(&voxels);
        let gradient_max = gradient.iter().copied().fold(0.0f32, f32::max);
        Self {
            geometry,
            voxels: voxels.into(),
            gradient: gradient.into(),
            truth: truth.into(),
            min,
            max,
            gradient_max,
        }
    }

    pub fn geometry(&self) -> VolumeGeometry {
        self.geometry
    }

    pub fn voxels(&self) -> &[f32] {
        &self.voxels
    }

    pub fn gradient(&self) -> &[f32] {
        &self.gradient
    }

    /// Voxels inside the generating ellipsoid.
    pub fn truth(&self) -> &[bool] {
        &self.truth
    }

    pub fn intensity_range(&self) -> (f32, f32) {
        (self.min, self.max)
    }
}

impl ImageSource for SyntheticVolume {
    fn layers(&self) -> Vec<LayerInfo> {
        vec![LayerInfo {
            id: MAIN_LAYER,
            name: "synthetic".into(),
            role: LayerRole::Main,
            components: 1,
        }]
    }

    fn channel_stats(&self, channel: ScalarChannel) -> Option<ChannelStats> {
        if channel.layer != MAIN_LAYER || channel.component != 0 {
            return None;
        }
        Some(ChannelStats {
            mapping: IntensityMapping::IDENTITY,
            min_internal: f64::from(self.min),
            max_internal: f64::from(self.max),
            gradient_magnitude_limit: f64::from(self.gradient_max),
        })
    }

    fn geometry(&self) -> VolumeGeometry {
        self.geometry
    }

    fn speed_mapping(&self) -> IntensityMapping {
        default_speed_mapping()
    }
}

pub fn voxel_coords(geometry: &VolumeGeometry, index: usize) -> UVec3 {
    let nx = geometry.dims.x as usize;
    let ny = geometry.dims.y as usize;
    UVec3::new(
        (index % nx) as u32,
        ((index / nx) % ny) as u32,
        (index / (nx * ny)) as u32,
    )
}

pub fn voxel_index(geometry: &VolumeGeometry, c: UVec3) -> usize {
    let nx = geometry.dims.x as usize;
    let ny = geometry.dims.y as usize;
    c.x as usize + nx * (c.y as usize + ny * c.z as usize)
}

/// Physical position of a voxel center.
pub fn physical_center(geometry: &VolumeGeometry, index: usize) -> DVec3 {
    (voxel_coords(geometry, index).as_dvec3() + DVec3::splat(0.5)) * geometry.spacing
}

/// Central differences in physical units, one-sided at the border.
fn gradient_magnitude(geometry: &VolumeGeometry, voxels: &[f32]) -> Vec<f32> {
    let dims = geometry.dims;
    let spacing = geometry.spacing.as_vec3();
    (0..voxels.len())
        .map(|index| {
            let c = voxel_coords(geometry, index);
            let mut g = [0.0f32; 3];
            for axis in 0..3 {
                let lo = if c[axis] > 0 { c[axis] - 1 } else { c[axis] };
                let hi = if c[axis] + 1 < dims[axis] { c[axis] + 1 } else { c[axis] };
                if hi == lo {
                    continue;
                }
                let mut a = c;
                let mut b = c;
                a[axis] = lo;
                b[axis] = hi;
                let delta = voxels[voxel_index(geometry, b)] - voxels[voxel_index(geometry, a)];
                g[axis] = delta / ((hi - lo) as f32 * spacing[axis]);
            }
            (g[0] * g[0] + g[1] * g[1] + g[2] * g[2]).sqrt()
        })
        .collect()
}

fn min_max(values: &[f32]) -> (f32, f32) {
    values
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        })
}
