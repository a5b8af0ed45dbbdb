//! Flat buffer layout of a mixture model, as uploaded by preview renderers.

use crate::gmm::MixtureModel;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PackedComponent {
    pub mean: f32,
    pub variance: f32,
    pub weight: f32,
    /// 1 for the foreground cluster, 0 otherwise.
    pub foreground: u32,
}

const _: () = assert!(core::mem::size_of::<PackedComponent>() == 16);

impl PackedComponent {
    pub fn is_foreground(&self) -> bool {
        self.foreground != 0
    }
}

pub fn pack_mixture(model: &MixtureModel) -> Vec<PackedComponent> {
    model
        .components()
        .iter()
        .map(|c| PackedComponent {
            mean: c.mean as f32,
            variance: c.variance as f32,
            weight: c.weight as f32,
            foreground: u32::from(c.foreground),
        })
        .collect()
}

pub fn as_bytes(packed: &[PackedComponent]) -> &[u8] {
    bytemuck::cast_slice(packed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gmm::GaussianComponent;

    #[test]
    fn packs_one_record_per_component() {
        let mut model = MixtureModel::new(vec![
            GaussianComponent::new(10.0, 4.0, 1.0),
            GaussianComponent::new(90.0, 9.0, 3.0),
        ]);
        model.set_exclusive_foreground(1);
        let packed = pack_mixture(&model);
        assert_eq!(packed.len(), 2);
        assert!(!packed[0].is_foreground());
        assert!(packed[1].is_foreground());
        assert_eq!(packed[1].mean, 90.0);
        assert!((packed[1].weight - 0.75).abs() < 1e-6);
        assert_eq!(as_bytes(&packed).len(), 32);
    }
}
