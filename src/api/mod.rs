//! Collaborators the orchestrator talks to, and their HTTP implementation.
//!
//! The three traits are the only seams between the orchestration core and
//! the outside world. [`HttpBackend`] implements all of them against the
//! render REST API; tests and the demo plug in in-memory implementations.

pub mod client;
pub mod error;
pub mod types;

use async_trait::async_trait;

use crate::jobs::GenerationRequest;

pub use client::HttpBackend;
pub use error::BackendError;
pub use types::{JobStub, LimitPayload, RemoteJob, RemoteStatus, SubmissionData, SubmissionResponse};

/// Creates generation jobs.
#[async_trait]
pub trait SubmissionBackend: Send + Sync {
    async fn submit_generation(
        &self,
        request: &GenerationRequest,
    ) -> Result<SubmissionResponse, BackendError>;
}

/// Reports the current status of every job in a project.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn list_project_jobs(&self, project_id: &str) -> Result<Vec<RemoteJob>, BackendError>;
}

/// Asks the account service to re-read the credit balance.
#[async_trait]
pub trait BalanceSource: Send + Sync {
    async fn refresh_balance(&self) -> Result<(), BackendError>;
}
