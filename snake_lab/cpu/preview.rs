//! Previewer that records what it was asked to render.

use std::cell::RefCell;
use std::rc::Rc;

use snake_core::collab::{PreviewFilter, PreviewParameters};
use snake_core::config::{EdgePreprocessingSettings, ThresholdSettings};
use snake_core::preview::{as_bytes, pack_mixture, PackedComponent};
use tracing::trace;

#[derive(Debug, Default)]
pub struct PreviewLog {
    pub preview: bool,
    pub uploads: usize,
    pub threshold: Option<ThresholdSettings>,
    pub edge: Option<EdgePreprocessingSettings>,
    /// Last mixture upload in buffer layout.
    pub mixture: Vec<PackedComponent>,
}

pub struct RecordingPreview {
    stage: &'static str,
    log: Rc<RefCell<PreviewLog>>,
}

impl RecordingPreview {
    pub fn new(stage: &'static str) -> Self {
        Self {
            stage,
            log: Rc::default(),
        }
    }

    pub fn log(&self) -> Rc<RefCell<PreviewLog>> {
        Rc::clone(&self.log)
    }
}

impl PreviewFilter for RecordingPreview {
    fn set_preview_mode(&mut self, enabled: bool) {
        trace!(stage = self.stage, enabled, "preview mode");
        self.log.borrow_mut().preview = enabled;
    }

    fn is_preview_mode(&self) -> bool {
        self.log.borrow().preview
    }

    fn set_parameters(&mut self, params: PreviewParameters<'_>) {
        let mut log = self.log.borrow_mut();
        log.uploads += 1;
        match params {
            PreviewParameters::Threshold(ts) => log.threshold = Some(ts.clone()),
            PreviewParameters::Edge(eps) => log.edge = Some(eps.clone()),
            PreviewParameters::Mixture(model) => {
                log.mixture = pack_mixture(model);
                trace!(
                    stage = self.stage,
                    bytes = as_bytes(&log.mixture).len(),
                    "mixture uploaded"
                );
            }
        }
    }
}
