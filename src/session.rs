//! Lifecycle of a single polling session.
//!
//! A [`PollSession`] is always in exactly one of three phases:
//!
//! - `Idle`: nothing is tracked and no tick is scheduled.
//! - `Active`: ids are tracked and the next tick is waiting on its timer.
//! - `Draining`: a tick is running and its status refresh is in flight.
//!
//! Every session carries a numeric id. A tick only acts on the session it
//! was armed for, so a tick that outlives a cancelled or superseded session
//! sees a mismatch and does nothing.

use std::fmt;
use std::mem;

use serde::Serialize;
use tokio::time::Instant;

use crate::jobs::PendingSet;
use crate::timer::CancelHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Idle,
    Active,
    Draining,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionPhase::Idle => write!(f, "IDLE"),
            SessionPhase::Active => write!(f, "ACTIVE"),
            SessionPhase::Draining => write!(f, "DRAINING"),
        }
    }
}

/// How the most recent session ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "reason", content = "message")]
pub enum StopReason {
    /// Every tracked job completed.
    Completed,
    /// The deadline passed with jobs still outstanding.
    TimedOut,
    /// The owner cancelled the session.
    Cancelled,
    /// The status refresh failed.
    PollFailed(String),
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Completed => write!(f, "completed"),
            StopReason::TimedOut => write!(f, "timed out"),
            StopReason::Cancelled => write!(f, "cancelled"),
            StopReason::PollFailed(msg) => write!(f, "poll failed: {msg}"),
        }
    }
}

/// Bookkeeping for a running session.
#[derive(Debug)]
pub struct SessionState {
    id: u64,
    deadline: Instant,
    tracked: PendingSet,
    completed: usize,
}

impl SessionState {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn tracked(&self) -> &PendingSet {
        &self.tracked
    }

    /// Stop tracking `job_id`. `applied` says whether this session was the
    /// one that moved the record to completed.
    pub fn resolve(&mut self, job_id: &str, applied: bool) -> bool {
        let removed = self.tracked.remove(job_id);
        if removed && applied {
            self.completed += 1;
        }
        removed
    }
}

/// Proof that a session finished by draining its pending set.
///
/// Only [`PollSession::complete`] creates one for a polled batch and the
/// reconciler consumes it by value, so each session is reconciled once.
#[derive(Debug)]
pub struct CompletedSession {
    id: u64,
    final_count: usize,
}

impl CompletedSession {
    /// A batch that resolved at submission time without polling.
    pub(crate) fn synchronous(id: u64, final_count: usize) -> Self {
        Self { id, final_count }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn final_count(&self) -> usize {
        self.final_count
    }
}

/// Result of [`PollSession::begin_tick`].
#[derive(Debug, PartialEq, Eq)]
pub enum TickStart {
    /// The tick belongs to a session that no longer exists.
    Stale,
    /// The session ended before polling. Nothing to reconcile.
    Stopped(StopReason),
    /// The session is now draining; go fetch statuses.
    Poll,
}

#[derive(Debug, Default)]
pub enum PollSession {
    #[default]
    Idle,
    Active {
        state: SessionState,
        tick: CancelHandle,
    },
    Draining {
        state: SessionState,
        tick: CancelHandle,
    },
}

impl PollSession {
    pub fn phase(&self) -> SessionPhase {
        match self {
            PollSession::Idle => SessionPhase::Idle,
            PollSession::Active { .. } => SessionPhase::Active,
            PollSession::Draining { .. } => SessionPhase::Draining,
        }
    }

    pub fn is_running(&self) -> bool {
        !matches!(self, PollSession::Idle)
    }

    pub fn state(&self) -> Option<&SessionState> {
        match self {
            PollSession::Idle => None,
            PollSession::Active { state, .. } | PollSession::Draining { state, .. } => Some(state),
        }
    }

    pub fn id(&self) -> Option<u64> {
        self.state().map(SessionState::id)
    }

    pub fn pending_count(&self) -> usize {
        self.state().map_or(0, |s| s.tracked.len())
    }

    /// Begin a session from `Idle`. Returns `false` (and drops `tick`
    /// after cancelling it) if one is already running.
    pub fn start(
        &mut self,
        id: u64,
        deadline: Instant,
        tracked: PendingSet,
        tick: CancelHandle,
    ) -> bool {
        if self.is_running() {
            tick.cancel();
            return false;
        }
        *self = PollSession::Active {
            state: SessionState {
                id,
                deadline,
                tracked,
                completed: 0,
            },
            tick,
        };
        true
    }

    /// Fold ids into the running session. Returns how many were new.
    pub fn extend<'a>(&mut self, ids: impl IntoIterator<Item = &'a str>) -> usize {
        match self {
            PollSession::Idle => 0,
            PollSession::Active { state, .. } | PollSession::Draining { state, .. } => {
                ids.into_iter().filter(|id| state.tracked.insert(*id)).count()
            }
        }
    }

    /// Called when the timer for session `id` fires.
    pub fn begin_tick(&mut self, id: u64, now: Instant) -> TickStart {
        let (expired, empty) = match self {
            PollSession::Active { state, .. } if state.id == id => {
                (now > state.deadline, state.tracked.is_empty())
            }
            _ => return TickStart::Stale,
        };

        if expired || empty {
            // The tick is the caller; let its handle drop instead of
            // cancelling the task we are running on.
            *self = PollSession::Idle;
            // An empty set at tick time is only reachable if every id was
            // resolved elsewhere; treat it like a drained batch without
            // reconciliation.
            let reason = if expired {
                StopReason::TimedOut
            } else {
                StopReason::Completed
            };
            return TickStart::Stopped(reason);
        }

        match mem::take(self) {
            PollSession::Active { state, tick } => {
                *self = PollSession::Draining { state, tick };
                TickStart::Poll
            }
            other => {
                *self = other;
                TickStart::Stale
            }
        }
    }

    /// The session state, if session `id` is mid-tick.
    pub fn draining_mut(&mut self, id: u64) -> Option<&mut SessionState> {
        match self {
            PollSession::Draining { state, .. } if state.id == id => Some(state),
            _ => None,
        }
    }

    /// Count `n` jobs that resolved outside of polling toward this session's
    /// final count.
    pub fn credit(&mut self, n: usize) -> bool {
        match self {
            PollSession::Idle => false,
            PollSession::Active { state, .. } | PollSession::Draining { state, .. } => {
                state.completed += n;
                true
            }
        }
    }

    /// `Draining` → `Active` with a freshly armed tick.
    pub fn rearm(&mut self, tick: CancelHandle) -> bool {
        match mem::take(self) {
            PollSession::Draining { state, .. } => {
                *self = PollSession::Active { state, tick };
                true
            }
            other => {
                *self = other;
                tick.cancel();
                false
            }
        }
    }

    /// `Draining` with an empty pending set → `Idle`.
    pub fn complete(&mut self) -> Option<CompletedSession> {
        match mem::take(self) {
            PollSession::Draining { state, .. } if state.tracked.is_empty() => {
                Some(CompletedSession {
                    id: state.id,
                    final_count: state.completed,
                })
            }
            other => {
                *self = other;
                None
            }
        }
    }

    /// Drop the running session from inside its own tick.
    pub fn abandon(&mut self) -> Option<SessionState> {
        match mem::take(self) {
            PollSession::Idle => None,
            PollSession::Active { state, .. } | PollSession::Draining { state, .. } => Some(state),
        }
    }

    /// Stop the running session from outside, cancelling its tick.
    pub fn cancel(&mut self) -> Option<SessionState> {
        match mem::take(self) {
            PollSession::Idle => None,
            PollSession::Active { state, tick } | PollSession::Draining { state, tick } => {
                tick.cancel();
                Some(state)
            }
        }
    }
}
