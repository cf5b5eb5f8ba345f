use std::sync::Arc;

use tokio::sync::broadcast;

use crate::api::BalanceSource;
use crate::model::OrchestratorEvent;
use crate::session::CompletedSession;

/// Post-completion side effects for a drained session: one balance refresh,
/// then one aggregate success notification.
pub struct CompletionReconciler {
    balance: Arc<dyn BalanceSource>,
    events: broadcast::Sender<OrchestratorEvent>,
}

impl CompletionReconciler {
    pub fn new(balance: Arc<dyn BalanceSource>, events: broadcast::Sender<OrchestratorEvent>) -> Self {
        Self { balance, events }
    }

    /// Consumes the completion proof, so it cannot run twice for a session.
    pub async fn on_session_complete(&self, done: CompletedSession) {
        let final_count = done.final_count();
        tracing::info!(session = done.id(), final_count, "Batch complete, reconciling balance");

        // The refreshed balance is read by the UI; a failure here must not
        // swallow the success notice.
        if let Err(e) = self.balance.refresh_balance().await {
            tracing::warn!(session = done.id(), error = %e, "Balance refresh failed");
        }

        let _ = self.events.send(OrchestratorEvent::BatchCompleted {
            session: done.id(),
            final_count,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBalance;

    #[tokio::test]
    async fn refreshes_then_notifies_once() {
        let balance = Arc::new(FakeBalance::default());
        let (tx, mut rx) = broadcast::channel(8);
        let reconciler = CompletionReconciler::new(balance.clone(), tx);

        reconciler
            .on_session_complete(CompletedSession::synchronous(4, 3))
            .await;

        assert_eq!(balance.refreshes(), 1);
        assert_eq!(
            rx.recv().await.unwrap(),
            OrchestratorEvent::BatchCompleted {
                session: 4,
                final_count: 3
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn notifies_even_when_refresh_fails() {
        let balance = Arc::new(FakeBalance::failing());
        let (tx, mut rx) = broadcast::channel(8);
        let reconciler = CompletionReconciler::new(balance.clone(), tx);

        reconciler
            .on_session_complete(CompletedSession::synchronous(1, 1))
            .await;

        assert_eq!(balance.refreshes(), 1);
        assert!(matches!(
            rx.recv().await.unwrap(),
            OrchestratorEvent::BatchCompleted { final_count: 1, .. }
        ));
    }

    #[tokio::test]
    async fn no_subscribers_is_not_an_error() {
        let balance = Arc::new(FakeBalance::default());
        let (tx, rx) = broadcast::channel(8);
        drop(rx);
        let reconciler = CompletionReconciler::new(balance.clone(), tx);

        reconciler
            .on_session_complete(CompletedSession::synchronous(1, 2))
            .await;
        assert_eq!(balance.refreshes(), 1);
    }
}
