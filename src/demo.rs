//! Simulated backend for the `demo` command.
//!
//! Job `i` of a submission reports `completed` on the `i + 1`-th status
//! listing after it was created, so a batch of three finishes across three
//! ticks in slot order.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use indexmap::IndexMap;
use uuid::Uuid;

use crate::api::{
    BackendError, BalanceSource, JobStub, RemoteJob, RemoteStatus, StatusSource,
    SubmissionBackend, SubmissionData, SubmissionResponse,
};
use crate::jobs::{BatchSlot, GenerationKind, GenerationRequest};

#[derive(Debug)]
struct SimJob {
    project_id: String,
    polls_left: usize,
}

#[derive(Debug)]
struct SimState {
    jobs: IndexMap<String, SimJob>,
    balance: u64,
    balance_refreshes: usize,
}

/// In-memory stand-in for the render service.
#[derive(Debug)]
pub struct SimulatedBackend {
    state: Mutex<SimState>,
    latency: Duration,
}

impl SimulatedBackend {
    pub fn new(balance: u64) -> Self {
        Self {
            state: Mutex::new(SimState {
                jobs: IndexMap::new(),
                balance,
                balance_refreshes: 0,
            }),
            latency: Duration::ZERO,
        }
    }

    /// Delay every call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn balance(&self) -> u64 {
        self.lock().balance
    }

    pub fn balance_refreshes(&self) -> usize {
        self.lock().balance_refreshes
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn delay(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl SubmissionBackend for SimulatedBackend {
    async fn submit_generation(
        &self,
        request: &GenerationRequest,
    ) -> Result<SubmissionResponse, BackendError> {
        self.delay().await;
        let mut state = self.lock();

        let cost = request.total_cost();
        if cost > state.balance {
            return Ok(SubmissionResponse {
                success: false,
                error: Some("Not enough credits for this generation".to_string()),
                limit_reached: true,
                limit_type: Some("credits".to_string()),
                current: Some(state.balance),
                limit: Some(cost),
                ..Default::default()
            });
        }
        state.balance -= cost;

        let stubs: Vec<JobStub> = (0..request.unit_count())
            .map(|i| {
                let id = Uuid::new_v4().to_string();
                state.jobs.insert(
                    id.clone(),
                    SimJob {
                        project_id: request.project_id.clone(),
                        polls_left: i + 1,
                    },
                );
                JobStub {
                    id,
                    output_url: None,
                }
            })
            .collect();

        tracing::debug!(jobs = stubs.len(), cost, "Simulated submission accepted");
        let data = if request.is_batch() {
            SubmissionData::Many(stubs)
        } else {
            match stubs.into_iter().next() {
                Some(stub) => SubmissionData::One(stub),
                None => return Ok(SubmissionResponse::rejected("No units requested")),
            }
        };
        Ok(SubmissionResponse::accepted(data))
    }
}

#[async_trait]
impl StatusSource for SimulatedBackend {
    async fn list_project_jobs(&self, project_id: &str) -> Result<Vec<RemoteJob>, BackendError> {
        self.delay().await;
        let mut state = self.lock();
        let jobs = state
            .jobs
            .iter_mut()
            .filter(|(_, job)| job.project_id == project_id)
            .map(|(id, job)| {
                job.polls_left = job.polls_left.saturating_sub(1);
                if job.polls_left == 0 {
                    RemoteJob {
                        id: id.clone(),
                        status: RemoteStatus::Completed,
                        output_url: Some(format!("https://renders.example/{id}.png")),
                    }
                } else {
                    RemoteJob {
                        id: id.clone(),
                        status: RemoteStatus::Processing,
                        output_url: None,
                    }
                }
            })
            .collect();
        Ok(jobs)
    }
}

#[async_trait]
impl BalanceSource for SimulatedBackend {
    async fn refresh_balance(&self) -> Result<(), BackendError> {
        self.delay().await;
        self.lock().balance_refreshes += 1;
        Ok(())
    }
}

/// A batch request with one labelled slot per job.
pub fn demo_request(project_id: &str, jobs: usize) -> GenerationRequest {
    let slots = (0..jobs)
        .map(|i| match i {
            0 => BatchSlot::labelled("Floor Plan"),
            1 => BatchSlot::labelled("Elevation - North"),
            _ => BatchSlot::default(),
        })
        .collect();
    GenerationRequest::new(project_id, "Scandinavian living room, morning light", GenerationKind::Image)
        .with_cost(5)
        .with_slots(slots)
}
