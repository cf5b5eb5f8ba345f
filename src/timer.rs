//! One-shot delayed tasks with explicit cancellation.
//!
//! [`schedule_after`] spawns a task that sleeps for the given delay and then
//! runs a future. The returned [`CancelHandle`] stops it at whichever await
//! point it is parked on, including inside the future itself. Dropping the
//! handle does not cancel the task, so a task may safely replace the handle
//! that refers to itself.

use std::time::Duration;

use futures::future::BoxFuture;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Handle to a task created by [`schedule_after`].
#[derive(Debug)]
pub struct CancelHandle {
    token: CancellationToken,
    join: JoinHandle<()>,
}

impl CancelHandle {
    /// Stop the task. A no-op if it already finished.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// True once the task has returned or been cancelled and unwound.
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

/// Run `task` after `delay` on the current tokio runtime.
pub fn schedule_after(delay: Duration, task: BoxFuture<'static, ()>) -> CancelHandle {
    let token = CancellationToken::new();
    let child = token.clone();
    let join = tokio::spawn(async move {
        tokio::select! {
            _ = child.cancelled() => {}
            _ = async move {
                tokio::time::sleep(delay).await;
                task.await;
            } => {}
        }
    });
    CancelHandle { token, join }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn runs_after_delay() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let handle = schedule_after(
            Duration::from_secs(2),
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            .boxed(),
        );

        tokio::time::sleep(Duration::from_millis(1900)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        tokio::task::yield_now().await;
        assert!(handle.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_before_delay_skips_task() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let handle = schedule_after(
            Duration::from_secs(2),
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            .boxed(),
        );

        handle.cancel();
        assert!(handle.is_cancelled());
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(handle.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_interrupts_running_task() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let handle = schedule_after(
            Duration::from_millis(10),
            async move {
                tokio::time::sleep(Duration::from_secs(60)).await;
                counter.fetch_add(1, Ordering::SeqCst);
            }
            .boxed(),
        );

        tokio::time::sleep(Duration::from_secs(1)).await;
        handle.cancel();
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(handle.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_handle_does_not_cancel() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        drop(schedule_after(
            Duration::from_secs(1),
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            .boxed(),
        ));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
