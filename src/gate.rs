//! The submission gate: local precondition checks followed by exactly one
//! call to the submission backend.
//!
//! The gate is stateless. It neither tracks jobs nor touches the balance;
//! the caller decides what to do with the [`SubmissionOutcome`].

use std::sync::Arc;

use crate::api::{JobStub, SubmissionBackend, SubmissionData, SubmissionResponse};
use crate::error::{SubmitError, ValidationError};
use crate::jobs::{GenerationRequest, JobRecord, default_label};
use crate::model::LimitReached;

/// What the backend made of an accepted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// One job. `output_url` is set when it finished synchronously.
    Single {
        job_id: String,
        label: String,
        output_url: Option<String>,
    },
    /// Several jobs, in slot order, each labelled before submission.
    Batch { jobs: Vec<JobRecord> },
    /// A plan or quota boundary. Not an error: the caller offers an upgrade.
    LimitReached(LimitReached),
}

impl SubmissionOutcome {
    /// Records to append to the aggregate, in order.
    pub fn records(&self) -> Vec<JobRecord> {
        match self {
            SubmissionOutcome::Single {
                job_id,
                label,
                output_url: Some(url),
            } => vec![JobRecord::completed(job_id.clone(), label.clone(), url.clone())],
            SubmissionOutcome::Single { job_id, label, .. } => {
                vec![JobRecord::pending(job_id.clone(), label.clone())]
            }
            SubmissionOutcome::Batch { jobs } => jobs.clone(),
            SubmissionOutcome::LimitReached(_) => Vec::new(),
        }
    }
}

pub struct SubmissionGate {
    backend: Arc<dyn SubmissionBackend>,
}

impl SubmissionGate {
    pub fn new(backend: Arc<dyn SubmissionBackend>) -> Self {
        Self { backend }
    }

    /// Check the request locally, then submit it once. Never retries.
    ///
    /// `available_credits` is the caller's last known balance; `None` skips
    /// the credit check.
    pub async fn submit(
        &self,
        request: &GenerationRequest,
        available_credits: Option<u64>,
    ) -> Result<SubmissionOutcome, SubmitError> {
        validate(request, available_credits)?;

        // Labels are fixed here, before any response exists.
        let labels = request.labels();
        tracing::info!(
            project = %request.project_id,
            kind = ?request.kind,
            units = labels.len(),
            cost = request.total_cost(),
            "Submitting generation request",
        );

        let response = self.backend.submit_generation(request).await?;
        let outcome = interpret(response, labels)?;

        match &outcome {
            SubmissionOutcome::Single { job_id, .. } => {
                tracing::info!(job_id = %job_id, "Backend accepted single job");
            }
            SubmissionOutcome::Batch { jobs } => {
                tracing::info!(jobs = jobs.len(), "Backend accepted batch");
            }
            SubmissionOutcome::LimitReached(limit) => {
                tracing::warn!(limit_type = %limit.limit_type, "Submission hit a plan limit");
            }
        }
        Ok(outcome)
    }
}

/// Preconditions shared by every generation tool.
pub fn validate(
    request: &GenerationRequest,
    available_credits: Option<u64>,
) -> Result<(), ValidationError> {
    if request.project_id.trim().is_empty() {
        return Err(ValidationError::MissingProject);
    }
    if request.prompt.trim().is_empty() && request.slots.iter().all(|s| s.prompt.is_none()) {
        return Err(ValidationError::EmptyPrompt);
    }
    if request.inputs.len() < request.min_inputs {
        return Err(ValidationError::MissingInputs {
            required: request.min_inputs,
            provided: request.inputs.len(),
        });
    }
    if let Some(available) = available_credits {
        let required = request.total_cost();
        if available < required {
            return Err(ValidationError::InsufficientCredits {
                required,
                available,
            });
        }
    }
    Ok(())
}

fn interpret(
    response: SubmissionResponse,
    labels: Vec<String>,
) -> Result<SubmissionOutcome, SubmitError> {
    if let Some(payload) = response.limit() {
        let message = payload
            .message
            .unwrap_or_else(|| format!("{} limit reached", payload.limit_type));
        return Ok(SubmissionOutcome::LimitReached(LimitReached {
            limit_type: payload.limit_type,
            current: payload.current,
            limit: payload.limit,
            message,
            plan_name: payload.plan_name,
        }));
    }

    if !response.success {
        return Err(SubmitError::Failed {
            message: response
                .error
                .unwrap_or_else(|| "Failed to start generation".to_string()),
        });
    }

    match response.data {
        Some(SubmissionData::Many(stubs)) if !stubs.is_empty() => Ok(SubmissionOutcome::Batch {
            jobs: label_stubs(stubs, &labels),
        }),
        Some(SubmissionData::One(stub)) => Ok(SubmissionOutcome::Single {
            label: labels.into_iter().next().unwrap_or_else(|| default_label(0)),
            job_id: stub.id,
            output_url: stub.output_url.filter(|u| !u.is_empty()),
        }),
        _ => Err(SubmitError::Failed {
            message: "Backend accepted the request but returned no jobs".to_string(),
        }),
    }
}

/// Pair stubs with the pre-assigned labels by position.
fn label_stubs(stubs: Vec<JobStub>, labels: &[String]) -> Vec<JobRecord> {
    if stubs.len() != labels.len() {
        tracing::warn!(
            expected = labels.len(),
            received = stubs.len(),
            "Backend returned a different number of jobs than slots",
        );
    }
    stubs
        .into_iter()
        .enumerate()
        .map(|(i, stub)| {
            let label = labels.get(i).cloned().unwrap_or_else(|| default_label(i));
            match stub.output_url.filter(|u| !u.is_empty()) {
                Some(url) => JobRecord::completed(stub.id, label, url),
                None => JobRecord::pending(stub.id, label),
            }
        })
        .collect()
}
