//! CPU reference collaborators for driving a wizard session without a host application.

pub mod em;
pub mod host;
pub mod levelset;
pub mod preview;
pub mod volume;

pub use em::{EmClustering, EmClusteringFactory};
pub use host::{LabHost, SharedWorkspace, Workspace};
pub use levelset::FrontPropagation;
pub use preview::{PreviewLog, RecordingPreview};
pub use volume::{SyntheticVolume, VolumeSpec, MAIN_LAYER};
