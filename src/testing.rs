//! In-memory collaborators with call counters, shared by the unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::api::{
    BackendError, BalanceSource, JobStub, RemoteJob, RemoteStatus, StatusSource,
    SubmissionBackend, SubmissionData, SubmissionResponse,
};
use crate::jobs::GenerationRequest;

pub fn completed(id: &str) -> RemoteJob {
    RemoteJob {
        id: id.to_string(),
        status: RemoteStatus::Completed,
        output_url: Some(format!("https://cdn.test/{id}.png")),
    }
}

pub fn processing(id: &str) -> RemoteJob {
    RemoteJob {
        id: id.to_string(),
        status: RemoteStatus::Processing,
        output_url: None,
    }
}

pub fn failed(id: &str) -> RemoteJob {
    RemoteJob {
        id: id.to_string(),
        status: RemoteStatus::Failed,
        output_url: None,
    }
}

pub fn batch_response(ids: &[&str]) -> SubmissionResponse {
    SubmissionResponse::accepted(SubmissionData::Many(
        ids.iter()
            .map(|id| JobStub {
                id: id.to_string(),
                output_url: None,
            })
            .collect(),
    ))
}

#[derive(Default)]
pub struct FakeBalance {
    calls: AtomicUsize,
    fail: bool,
}

impl FakeBalance {
    pub fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: true,
        }
    }

    pub fn refreshes(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BalanceSource for FakeBalance {
    async fn refresh_balance(&self) -> Result<(), BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(BackendError::Api {
                status: 503,
                message: "billing unavailable".into(),
            });
        }
        Ok(())
    }
}

/// Replays one scripted response per call, then keeps repeating the last
/// successful listing.
#[derive(Default)]
pub struct ScriptedStatus {
    script: Mutex<VecDeque<Result<Vec<RemoteJob>, String>>>,
    last: Mutex<Vec<RemoteJob>>,
    calls: AtomicUsize,
    latency: Duration,
}

impl ScriptedStatus {
    pub fn new(script: Vec<Result<Vec<RemoteJob>, String>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Default::default()
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatusSource for ScriptedStatus {
    async fn list_project_jobs(&self, _project_id: &str) -> Result<Vec<RemoteJob>, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Ok(jobs)) => {
                *self.last.lock().unwrap() = jobs.clone();
                Ok(jobs)
            }
            Some(Err(message)) => Err(BackendError::Api {
                status: 500,
                message,
            }),
            None => Ok(self.last.lock().unwrap().clone()),
        }
    }
}

/// Returns the same canned response to every submission.
pub struct FakeSubmission {
    response: Result<SubmissionResponse, String>,
    calls: AtomicUsize,
    last_request: Mutex<Option<GenerationRequest>>,
}

impl FakeSubmission {
    pub fn responding(response: SubmissionResponse) -> Self {
        Self {
            response: Ok(response),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn unreachable(message: &str) -> Self {
        Self {
            response: Err(message.to_string()),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<GenerationRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl SubmissionBackend for FakeSubmission {
    async fn submit_generation(
        &self,
        request: &GenerationRequest,
    ) -> Result<SubmissionResponse, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        match &self.response {
            Ok(resp) => Ok(resp.clone()),
            Err(message) => Err(BackendError::Api {
                status: 503,
                message: message.clone(),
            }),
        }
    }
}
