use thiserror::Error;

use crate::PartialOutput;

/// Every way a pipeline call can end without a [`crate::PipelineResult`].
///
/// `Cancelled` is not a failure from the caller's point of view: it carries
/// whatever output had been accumulated when the token fired.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    Validation(String),
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error("Network failure: {0}")]
    Network(String),
    #[error("Request was cancelled")]
    Cancelled(PartialOutput),
    #[error("{0}")]
    Unknown(String),
}

impl PipelineError {
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::Validation(_) | PipelineError::Cancelled(_) => false,
            PipelineError::Http { status, .. } => is_transient_status(*status),
            PipelineError::Network(_) | PipelineError::Unknown(_) => true,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, PipelineError::Cancelled(_))
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            PipelineError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn partial(&self) -> Option<&PartialOutput> {
        match self {
            PipelineError::Cancelled(partial) => Some(partial),
            _ => None,
        }
    }

    pub fn into_partial(self) -> Option<PartialOutput> {
        match self {
            PipelineError::Cancelled(partial) => Some(partial),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::Unknown(format!("Serialization/deserialization error: {err}"))
    }
}

fn is_transient_status(status: u16) -> bool {
    matches!(status, 408 | 429) || (500..=599).contains(&status)
}
