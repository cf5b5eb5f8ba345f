//! The poll scheduler.
//!
//! One [`PollScheduler`] drives at most one polling session at a time. Each
//! tick is a one-shot task that schedules the next one, so a tick always
//! sees the live tracked set (which `start_or_extend` may have grown) and a
//! session can disarm without racing a repeating timer.
//!
//! The aggregate and the session live behind one lock and are updated in
//! the same critical section, so a record is never `completed` while its id
//! is still tracked. The lock is never held across an await.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::aggregator::{Completion, ResultAggregator};
use crate::api::{BackendError, RemoteJob, StatusSource};
use crate::jobs::{JobRecord, PendingSet};
use crate::model::AggregateSnapshot;
use crate::reconciler::CompletionReconciler;
use crate::session::{
    CompletedSession, PollSession, SessionPhase, SessionState, StopReason, TickStart,
};
use crate::timer::{CancelHandle, schedule_after};

/// Timing policy for polling sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between the end of one tick and the start of the next.
    pub interval: Duration,
    /// Hard ceiling on a session's lifetime, measured from its start.
    pub max_window: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_window: Duration::from_secs(5 * 60),
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    aggregate: ResultAggregator,
    session: PollSession,
    next_session: u64,
    last_stop: Option<StopReason>,
}

impl Shared {
    fn allocate_session(&mut self) -> u64 {
        self.next_session += 1;
        self.next_session
    }

    fn snapshot(&self) -> AggregateSnapshot {
        AggregateSnapshot {
            jobs: self.aggregate.to_vec(),
            pending: self.session.pending_count(),
            phase: self.session.phase(),
            stop_reason: self.last_stop.clone(),
        }
    }
}

struct Inner {
    project_id: String,
    policy: PollPolicy,
    state: Mutex<Shared>,
    status: Arc<dyn StatusSource>,
    reconciler: CompletionReconciler,
    snapshots: watch::Sender<AggregateSnapshot>,
}

/// Drives pending jobs of one project to completion by periodic status
/// refreshes. Must be used from within a tokio runtime.
pub struct PollScheduler {
    inner: Arc<Inner>,
}

impl PollScheduler {
    pub fn new(
        project_id: impl Into<String>,
        policy: PollPolicy,
        status: Arc<dyn StatusSource>,
        reconciler: CompletionReconciler,
    ) -> Self {
        let (snapshots, _) = watch::channel(AggregateSnapshot::default());
        Self {
            inner: Arc::new(Inner {
                project_id: project_id.into(),
                policy,
                state: Mutex::new(Shared::default()),
                status,
                reconciler,
                snapshots,
            }),
        }
    }

    pub fn project_id(&self) -> &str {
        &self.inner.project_id
    }

    pub fn subscribe(&self) -> watch::Receiver<AggregateSnapshot> {
        self.inner.snapshots.subscribe()
    }

    pub fn snapshot(&self) -> AggregateSnapshot {
        self.inner.lock().snapshot()
    }

    pub fn phase(&self) -> SessionPhase {
        self.inner.lock().session.phase()
    }

    pub fn pending_count(&self) -> usize {
        self.inner.lock().session.pending_count()
    }

    /// Add placeholder records to the aggregate, in order.
    pub fn seed(&self, records: Vec<JobRecord>) -> usize {
        let mut state = self.inner.lock();
        let added = state.aggregate.append(records);
        self.inner.publish(&state);
        added
    }

    /// Track `ids` until they complete.
    ///
    /// Folds the ids into the running session if there is one; otherwise
    /// starts a session whose first tick fires after one interval. Ids that
    /// are not pending records in the aggregate are ignored. Returns the
    /// size of the tracked set afterwards.
    pub fn start_or_extend<S: AsRef<str>>(&self, ids: &[S]) -> usize {
        let mut state = self.inner.lock();
        let ids: Vec<&str> = ids.iter().map(AsRef::as_ref).collect();
        let count = self.inner.start_or_extend_locked(&mut state, &ids);
        self.inner.publish(&state);
        count
    }

    /// Append the records of one submission and drive them to completion.
    ///
    /// Pending records are tracked like [`start_or_extend`](Self::start_or_extend).
    /// Records that already carry an output count toward the session that
    /// tracks their siblings, so a mixed batch is reconciled once with its
    /// full size. When nothing needs polling, the resolved records are
    /// reconciled at once as their own session. Returns the size of the
    /// tracked set afterwards.
    pub async fn track_batch(&self, records: Vec<JobRecord>) -> usize {
        let (tracked, done) = {
            let mut state = self.inner.lock();
            let resolved = records
                .iter()
                .filter(|r| !r.is_pending() && state.aggregate.get(r.id()).is_none())
                .count();
            let pending: Vec<String> = records
                .iter()
                .filter(|r| r.is_pending())
                .map(|r| r.id().to_string())
                .collect();
            state.aggregate.append(records);

            let ids: Vec<&str> = pending.iter().map(String::as_str).collect();
            let tracked = self.inner.start_or_extend_locked(&mut state, &ids);
            let done = if tracked > 0 {
                state.session.credit(resolved);
                None
            } else if resolved > 0 {
                let session_id = state.allocate_session();
                Some(CompletedSession::synchronous(session_id, resolved))
            } else {
                None
            };
            self.inner.publish(&state);
            (tracked, done)
        };

        if let Some(done) = done {
            tracing::debug!(
                session = done.id(),
                final_count = done.final_count(),
                "Submission resolved without polling",
            );
            self.inner.reconciler.on_session_complete(done).await;
        }
        tracked
    }

    /// Stop the running session without reconciling. Returns whether one
    /// was running.
    pub fn cancel(&self) -> bool {
        let mut state = self.inner.lock();
        match state.session.cancel() {
            Some(session) => {
                tracing::info!(
                    session = session.id(),
                    outstanding = ?session.tracked().iter().collect::<Vec<_>>(),
                    "Polling session cancelled",
                );
                state.last_stop = Some(StopReason::Cancelled);
                self.inner.publish(&state);
                true
            }
            None => false,
        }
    }

    /// One status refresh outside of any session, applied to every pending
    /// record. Does nothing while a session is running, since its next tick
    /// refreshes anyway. Returns the number of records completed.
    pub async fn refresh_now(&self) -> Result<usize, BackendError> {
        if self.inner.lock().session.is_running() {
            tracing::debug!("Manual refresh skipped: session running");
            return Ok(0);
        }

        let jobs = self
            .inner
            .status
            .list_project_jobs(&self.inner.project_id)
            .await?;

        let mut state = self.inner.lock();
        if state.session.is_running() {
            return Ok(0);
        }
        let mut applied = 0;
        for job in &jobs {
            if let Some(url) = job.resolved_url() {
                if state.aggregate.is_pending(&job.id)
                    && state.aggregate.apply_completion(&job.id, url) == Completion::Applied
                {
                    applied += 1;
                }
            }
        }
        tracing::info!(applied, "Manual refresh applied");
        self.inner.publish(&state);
        Ok(applied)
    }

    /// Forget every record. Refused while a session is running.
    pub fn clear(&self) -> bool {
        let mut state = self.inner.lock();
        if state.session.is_running() {
            return false;
        }
        state.aggregate.clear();
        state.last_stop = None;
        self.inner.publish(&state);
        true
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &Shared) {
        self.snapshots.send_replace(state.snapshot());
    }

    /// Fold `ids` into the running session or start a new one. The caller
    /// publishes.
    fn start_or_extend_locked(self: &Arc<Self>, state: &mut Shared, ids: &[&str]) -> usize {
        let mut accepted = Vec::with_capacity(ids.len());
        for &id in ids {
            if state.aggregate.is_pending(id) {
                accepted.push(id);
            } else {
                tracing::warn!(job_id = id, "Not tracking job: no pending record");
            }
        }

        if state.session.is_running() {
            let added = state.session.extend(accepted.iter().copied());
            tracing::debug!(
                session = state.session.id(),
                added,
                tracked = state.session.pending_count(),
                "Extended polling session",
            );
            return state.session.pending_count();
        }

        if accepted.is_empty() {
            return 0;
        }

        let mut tracked = PendingSet::new();
        for id in accepted {
            tracked.insert(id);
        }
        let session_id = state.allocate_session();
        let deadline = Instant::now() + self.policy.max_window;
        let tick = self.arm(session_id);
        let count = tracked.len();
        state.session.start(session_id, deadline, tracked, tick);
        state.last_stop = None;

        tracing::info!(
            session = session_id,
            tracked = count,
            interval_ms = self.policy.interval.as_millis() as u64,
            "Started polling session",
        );
        count
    }

    fn arm(self: &Arc<Self>, session_id: u64) -> CancelHandle {
        schedule_after(self.policy.interval, Inner::tick(Arc::clone(self), session_id))
    }

    fn tick(self: Arc<Self>, session_id: u64) -> BoxFuture<'static, ()> {
        async move {
            let deadline = {
                let mut state = self.lock();
                match state.session.begin_tick(session_id, Instant::now()) {
                    TickStart::Stale => return,
                    TickStart::Stopped(reason) => {
                        match reason {
                            StopReason::TimedOut => tracing::info!(
                                session = session_id,
                                "Polling session reached its deadline",
                            ),
                            _ => tracing::debug!(session = session_id, "Nothing left to poll"),
                        }
                        state.last_stop = Some(reason);
                        self.publish(&state);
                        return;
                    }
                    TickStart::Poll => {}
                }
                self.publish(&state);
                match state.session.state().map(SessionState::deadline) {
                    Some(deadline) => deadline,
                    None => return,
                }
            };

            // A refresh that outlives the session's deadline ends it.
            let refresh = self.status.list_project_jobs(&self.project_id);
            let Ok(result) = tokio::time::timeout_at(deadline, refresh).await else {
                self.expire(session_id);
                return;
            };

            let done = self.finish_tick(session_id, result);
            if let Some(done) = done {
                self.reconciler.on_session_complete(done).await;
            }
        }
        .boxed()
    }

    /// Stop a session whose refresh was still in flight at its deadline.
    fn expire(&self, session_id: u64) {
        let mut state = self.lock();
        let Some(current) = state.session.draining_mut(session_id) else {
            return;
        };
        tracing::info!(
            session = session_id,
            outstanding = current.tracked().len(),
            "Polling session reached its deadline during a refresh",
        );
        state.session.abandon();
        state.last_stop = Some(StopReason::TimedOut);
        self.publish(&state);
    }

    /// Apply one refresh to the draining session and decide what happens
    /// next. Returns the completion proof when the pending set drained.
    fn finish_tick(
        self: &Arc<Self>,
        session_id: u64,
        result: Result<Vec<RemoteJob>, BackendError>,
    ) -> Option<CompletedSession> {
        let mut state = self.lock();
        let Shared {
            aggregate, session, ..
        } = &mut *state;

        let Some(current) = session.draining_mut(session_id) else {
            tracing::debug!(session = session_id, "Discarding refresh for superseded session");
            return None;
        };

        let jobs = match result {
            Ok(jobs) => jobs,
            Err(e) => {
                tracing::warn!(
                    session = session_id,
                    error = %e,
                    outstanding = current.tracked().len(),
                    "Status refresh failed, stopping session",
                );
                session.abandon();
                state.last_stop = Some(StopReason::PollFailed(e.to_string()));
                self.publish(&state);
                return None;
            }
        };

        let mut newly_completed = 0;
        for job in &jobs {
            let Some(url) = job.resolved_url() else {
                continue;
            };
            if !current.tracked().contains(&job.id) {
                continue;
            }
            let applied = aggregate.apply_completion(&job.id, url) == Completion::Applied;
            current.resolve(&job.id, applied);
            if applied {
                newly_completed += 1;
            }
        }

        let remaining = current.tracked().len();
        tracing::debug!(
            session = session_id,
            completed = newly_completed,
            remaining,
            "Poll tick applied",
        );

        if remaining == 0 {
            let done = session.complete();
            state.last_stop = Some(StopReason::Completed);
            self.publish(&state);
            return done;
        }

        let next = self.arm(session_id);
        session.rearm(next);
        self.publish(&state);
        None
    }
}
