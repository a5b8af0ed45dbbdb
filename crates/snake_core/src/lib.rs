//! Session coordinator for interactive active-contour ("snake") segmentation.
//!
//! The crate owns the wizard state: thresholds and edge parameters, seed
//! bubbles, the clustering stage and the evolution lifecycle. Image data,
//! numeric engines, previews and the hosting application are reached only
//! through the traits in [`collab`].

pub mod bubbles;
pub mod channels;
pub mod clustering;
pub mod collab;
pub mod config;
pub mod error;
pub mod events;
pub mod evolution;
pub mod functors;
pub mod gate;
pub mod gmm;
pub mod mapping;
pub mod params;
pub mod preview;
pub mod range;
pub mod session;

#[cfg(test)]
mod testing;

/// Scalar type used for intensities, weights and radii.
pub type Scalar = f64;

pub use bubbles::{Bubble, RadiusDomain};
pub use channels::{LayerId, LayerInfo, LayerRole, ScalarChannel};
pub use collab::Collaborators;
pub use config::{
    EdgePreprocessingSettings, PreprocessingStage, SessionConfig, SessionMode, ThresholdMode,
    ThresholdSettings,
};
pub use error::{EngineFailure, ErrorKind, Result, SnakeError};
pub use events::{UpdateEvent, UpdateObserver};
pub use evolution::EvolutionPhase;
pub use gate::Capability;
pub use gmm::{GaussianComponent, MixtureModel};
pub use params::{EdgeParameter, ThresholdBound};
pub use range::{Bridged, NumericRange};
pub use session::SnakeWizard;
