use thiserror::Error;

use crate::api::BackendError;

/// A precondition checked locally, before any network call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Project not ready: no project id")]
    MissingProject,

    #[error("Prompt must not be empty")]
    EmptyPrompt,

    #[error("Please upload at least {required} input image(s) ({provided} provided)")]
    MissingInputs { required: usize, provided: usize },

    #[error("Insufficient credits. You need {required} credits but have {available}.")]
    InsufficientCredits { required: u64, available: u64 },
}

/// Terminal failure of a single `submit` call. The gate never retries.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Submission failed: {message}")]
    Failed { message: String },

    #[error("Submission failed: {0}")]
    Backend(#[from] BackendError),
}

impl SubmitError {
    /// Message suitable for a one-line error notification.
    pub fn user_message(&self) -> String {
        match self {
            SubmitError::Validation(e) => e.to_string(),
            SubmitError::Failed { message } => message.clone(),
            SubmitError::Backend(e) => e.to_string(),
        }
    }
}
