//! The public entry point: one [`Orchestrator`] per project view.
//!
//! It wires the submission gate to the poll scheduler and fans out
//! notifications. Submission and polling only meet through the aggregate
//! and the tracked set owned by the scheduler.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};

use crate::api::{BackendError, BalanceSource, StatusSource, SubmissionBackend};
use crate::error::SubmitError;
use crate::gate::{SubmissionGate, SubmissionOutcome};
use crate::jobs::{GenerationRequest, JobRecord, default_label};
use crate::model::{AggregateSnapshot, EVENT_CHANNEL_CAPACITY, OrchestratorEvent};
use crate::poller::{PollPolicy, PollScheduler};
use crate::reconciler::CompletionReconciler;
use crate::session::SessionPhase;

pub struct Orchestrator {
    gate: SubmissionGate,
    scheduler: PollScheduler,
    events: broadcast::Sender<OrchestratorEvent>,
}

impl Orchestrator {
    pub fn new(
        project_id: impl Into<String>,
        policy: PollPolicy,
        submission: Arc<dyn SubmissionBackend>,
        status: Arc<dyn StatusSource>,
        balance: Arc<dyn BalanceSource>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let reconciler = CompletionReconciler::new(balance, events.clone());
        Self {
            gate: SubmissionGate::new(submission),
            scheduler: PollScheduler::new(project_id, policy, status, reconciler),
            events,
        }
    }

    /// Build an orchestrator whose three collaborators are one object, such
    /// as [`crate::api::HttpBackend`].
    pub fn with_backend<B>(project_id: impl Into<String>, policy: PollPolicy, backend: Arc<B>) -> Self
    where
        B: SubmissionBackend + StatusSource + BalanceSource + 'static,
    {
        Self::new(
            project_id,
            policy,
            backend.clone(),
            backend.clone(),
            backend,
        )
    }

    pub fn project_id(&self) -> &str {
        self.scheduler.project_id()
    }

    /// Submit a request and start tracking whatever it created.
    ///
    /// Failures are returned and also broadcast as one
    /// [`OrchestratorEvent::SubmissionFailed`]. A limit outcome is returned
    /// and broadcast as [`OrchestratorEvent::LimitReached`]; nothing is
    /// tracked in either case.
    pub async fn submit(
        &self,
        request: &GenerationRequest,
        available_credits: Option<u64>,
    ) -> Result<SubmissionOutcome, SubmitError> {
        let outcome = match self.gate.submit(request, available_credits).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(error = %e, "Submission failed");
                let _ = self.events.send(OrchestratorEvent::SubmissionFailed {
                    message: e.user_message(),
                });
                return Err(e);
            }
        };

        if let SubmissionOutcome::LimitReached(limit) = &outcome {
            let _ = self.events.send(OrchestratorEvent::LimitReached(limit.clone()));
            return Ok(outcome);
        }

        self.scheduler.track_batch(outcome.records()).await;
        Ok(outcome)
    }

    /// Fold already-known pending ids into the running session, or start
    /// one. Returns the tracked count.
    pub fn start_or_extend<S: AsRef<str>>(&self, ids: &[S]) -> usize {
        self.scheduler.start_or_extend(ids)
    }

    /// Watch jobs that were submitted elsewhere. Ids not yet in the
    /// aggregate get a pending placeholder labelled by their position.
    pub fn track<S: AsRef<str>>(&self, ids: &[S]) -> usize {
        let snapshot = self.scheduler.snapshot();
        let mut records: Vec<JobRecord> = Vec::new();
        for id in ids.iter().map(AsRef::as_ref) {
            if snapshot.job(id).is_some() || records.iter().any(|r| r.id() == id) {
                continue;
            }
            let label = default_label(snapshot.jobs.len() + records.len());
            records.push(JobRecord::pending(id, label));
        }
        self.scheduler.seed(records);
        self.scheduler.start_or_extend(ids)
    }

    /// Stop polling without reconciling.
    pub fn cancel(&self) -> bool {
        self.scheduler.cancel()
    }

    /// One status refresh outside of any session.
    pub async fn refresh_now(&self) -> Result<usize, BackendError> {
        self.scheduler.refresh_now().await
    }

    /// Forget all records. Refused while polling.
    pub fn clear(&self) -> bool {
        self.scheduler.clear()
    }

    pub fn subscribe(&self) -> watch::Receiver<AggregateSnapshot> {
        self.scheduler.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> AggregateSnapshot {
        self.scheduler.snapshot()
    }

    pub fn phase(&self) -> SessionPhase {
        self.scheduler.phase()
    }

    pub fn pending_count(&self) -> usize {
        self.scheduler.pending_count()
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        if self.scheduler.cancel() {
            tracing::debug!("Orchestrator dropped with an active session");
        }
    }
}
