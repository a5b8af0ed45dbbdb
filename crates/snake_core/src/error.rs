//! Error taxonomy for the wizard coordinator.
//!
//! Programming errors (wrong stage, missing engine) and recoverable domain
//! failures share one enum; [`SnakeError::kind`] tells them apart. Getters
//! that are merely not applicable return `None` instead of an error.

use thiserror::Error;

use crate::channels::ScalarChannel;

pub type Result<T> = std::result::Result<T, SnakeError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller bug: the operation was issued in a state where it can never succeed.
    Precondition,
    /// The request was well formed but the session cannot honour it right now.
    Domain,
}

/// Failure reported by one of the external numeric engines or the host.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{message}")]
pub struct EngineFailure {
    pub message: String,
}

impl EngineFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SnakeError {
    #[error("no clustering engine is attached; enter the clustering stage first")]
    ClusteringNotAttached,
    #[error("`{operation}` is not valid here: {reason}")]
    WrongStage {
        operation: &'static str,
        reason: &'static str,
    },
    #[error("no scalar channel is available for the current session")]
    NoScalarChannel,
    #[error("channel {0:?} is not one of the available scalar channels")]
    UnknownChannel(ScalarChannel),
    #[error("invalid bubble index {} selected for removal", .index.map_or(-1, |i| i as i64))]
    InvalidBubbleIndex { index: Option<usize> },
    #[error("bubble index {index} is past the end of a collection of {len}")]
    BubbleIndexOutOfRange { index: usize, len: usize },
    #[error("{what} = {value} is outside the allowed range [{min}, {max}]")]
    OutOfRange {
        what: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error(
        "failed to initialize the active contour; check that the initialization bubbles \
         are present and cover the image region"
    )]
    InitializationFailed,
    #[error("{stage} failed: {source}")]
    Engine {
        stage: &'static str,
        #[source]
        source: EngineFailure,
    },
}

impl SnakeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ClusteringNotAttached | Self::WrongStage { .. } | Self::NoScalarChannel => {
                ErrorKind::Precondition
            }
            Self::UnknownChannel(_)
            | Self::InvalidBubbleIndex { .. }
            | Self::BubbleIndexOutOfRange { .. }
            | Self::OutOfRange { .. }
            | Self::InitializationFailed
            | Self::Engine { .. } => ErrorKind::Domain,
        }
    }

    pub(crate) fn engine(stage: &'static str) -> impl FnOnce(EngineFailure) -> Self {
        move |source| Self::Engine { stage, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removal_message_uses_minus_one_for_missing_selection() {
        let err = SnakeError::InvalidBubbleIndex { index: None };
        assert_eq!(err.to_string(), "invalid bubble index -1 selected for removal");
        assert_eq!(err.kind(), ErrorKind::Domain);
    }

    #[test]
    fn missing_engine_is_a_precondition_violation() {
        assert_eq!(
            SnakeError::ClusteringNotAttached.kind(),
            ErrorKind::Precondition
        );
    }
}
