//! State and notifications the orchestrator publishes to its consumers.
//!
//! [`AggregateSnapshot`] is pushed through a `tokio::sync::watch` channel
//! after every change, so a renderer only ever sees the latest view.
//! [`OrchestratorEvent`]s are one-shot notifications on a broadcast channel.

use serde::Serialize;

use crate::jobs::{JobRecord, JobStatus};
use crate::session::{SessionPhase, StopReason};

/// Broadcast channel capacity for orchestrator events.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Everything a progress UI needs: the ordered records plus the size of
/// the pending set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateSnapshot {
    pub jobs: Vec<JobRecord>,
    pub pending: usize,
    pub phase: SessionPhase,
    pub stop_reason: Option<StopReason>,
}

impl Default for AggregateSnapshot {
    fn default() -> Self {
        Self {
            jobs: Vec::new(),
            pending: 0,
            phase: SessionPhase::Idle,
            stop_reason: None,
        }
    }
}

impl AggregateSnapshot {
    pub fn completed_count(&self) -> usize {
        self.jobs
            .iter()
            .filter(|j| j.status() == JobStatus::Completed)
            .count()
    }

    pub fn is_polling(&self) -> bool {
        self.phase != SessionPhase::Idle
    }

    pub fn job(&self, id: &str) -> Option<&JobRecord> {
        self.jobs.iter().find(|j| j.id() == id)
    }
}

/// A plan or quota boundary reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LimitReached {
    pub limit_type: String,
    pub current: Option<u64>,
    pub limit: Option<u64>,
    pub message: String,
    pub plan_name: Option<String>,
}

/// User-facing notifications. At most one per completed session and one
/// per failed submission; timeouts and cancellations emit nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrchestratorEvent {
    BatchCompleted { session: u64, final_count: usize },
    SubmissionFailed { message: String },
    LimitReached(LimitReached),
}
