//! Wires the CPU collaborators into a [`SnakeWizard`].

use std::cell::RefCell;
use std::rc::Rc;

use snake_core::collab::{Collaborators, Previewers};
use snake_core::{SessionConfig, SnakeWizard};

use crate::cpu::{
    EmClusteringFactory, FrontPropagation, LabHost, PreviewLog, RecordingPreview, SharedWorkspace,
    SyntheticVolume, VolumeSpec, Workspace,
};

pub struct LabSession {
    pub wizard: SnakeWizard,
    pub volume: SyntheticVolume,
    pub workspace: SharedWorkspace,
    pub threshold_preview: Rc<RefCell<PreviewLog>>,
    pub edge_preview: Rc<RefCell<PreviewLog>>,
    pub gmm_preview: Rc<RefCell<PreviewLog>>,
}

impl LabSession {
    pub fn new(spec: &VolumeSpec, config: SessionConfig) -> Self {
        let volume = SyntheticVolume::generate(spec);
        let workspace = Rc::new(RefCell::new(Workspace::new(volume.voxels().len())));
        let threshold = RecordingPreview::new("threshold");
        let edge = RecordingPreview::new("edge");
        let gmm = RecordingPreview::new("gmm");
        let (threshold_preview, edge_preview, gmm_preview) = (threshold.log(), edge.log(), gmm.log());

        let collaborators = Collaborators {
            image: Box::new(volume.clone()),
            evolution: Box::new(FrontPropagation::new(
                Rc::clone(&workspace),
                volume.geometry(),
            )),
            clustering: Box::new(EmClusteringFactory::new(volume.clone(), spec.seed)),
            previews: Previewers {
                threshold: Box::new(threshold),
                edge: Box::new(edge),
                gmm: Box::new(gmm),
            },
            host: Box::new(LabHost::new(volume.clone(), Rc::clone(&workspace))),
        };
        Self {
            wizard: SnakeWizard::new(config, collaborators),
            volume,
            workspace,
            threshold_preview,
            edge_preview,
            gmm_preview,
        }
    }

    /// Labelled voxels in the persistent segmentation.
    pub fn segmented_voxels(&self) -> usize {
        self.workspace
            .borrow()
            .persistent
            .iter()
            .filter(|&&v| v)
            .count()
    }

    /// Dice overlap between the persistent segmentation and the generating ellipsoid.
    pub fn dice(&self) -> f64 {
        let ws = self.workspace.borrow();
        let (mut both, mut seg, mut truth) = (0usize, 0usize, 0usize);
        for (&s, &t) in ws.persistent.iter().zip(self.volume.truth()) {
            both += usize::from(s && t);
            seg += usize::from(s);
            truth += usize::from(t);
        }
        if seg + truth == 0 {
            return 1.0;
        }
        2.0 * both as f64 / (seg + truth) as f64
    }

    /// Replaces the manual segmentation used to seed the contour.
    pub fn set_manual_seed(&self, seed: Option<Vec<bool>>) {
        self.workspace.borrow_mut().manual_seed = seed;
    }
}
