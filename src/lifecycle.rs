use crate::store::CallStore;
use crate::twilio_types::CallStatus;

use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Watches provider status signals and moves sessions through
/// `active -> terminated -> removed`.  Termination is idempotent and removal
/// is deferred by a grace period so late webhooks for a just-ended call can
/// still be answered instead of crashing on a missing session.
pub struct LifecycleController {
    store: Arc<CallStore>,
    grace: Duration,
}

impl LifecycleController {
    pub fn new(store: Arc<CallStore>, grace: Duration) -> Self {
        Self { store, grace }
    }

    pub fn on_status(&self, call_sid: &str, status: &CallStatus) {
        if !status.is_terminal() {
            debug!(call_sid=%call_sid, status=?status, "ignoring non-terminal status");
            return;
        }
        self.terminate(call_sid);
    }

    /// Terminates a session now, whatever prompted it (terminal provider
    /// status or the caller saying goodbye), and schedules its removal.
    pub fn terminate(&self, call_sid: &str) {
        self.store.mark_terminated(call_sid);
        self.store.schedule_removal(call_sid, self.grace);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SessionStatus;

    use tokio::time::sleep;

    const GRACE: Duration = Duration::from_secs(3_600);

    #[tokio::test]
    async fn non_terminal_statuses_are_ignored() {
        let store = Arc::new(CallStore::new());
        store.create_if_absent("CA1", "+15551234567");
        let controller = LifecycleController::new(Arc::clone(&store), GRACE);

        for status in [CallStatus::Queued, CallStatus::Ringing, CallStatus::InProgress] {
            controller.on_status("CA1", &status);
        }
        assert_eq!(store.get("CA1").unwrap().status, SessionStatus::Active);
    }

    #[tokio::test]
    async fn terminal_status_terminates_idempotently() {
        let store = Arc::new(CallStore::new());
        store.create_if_absent("CA1", "+15551234567");
        let controller = LifecycleController::new(Arc::clone(&store), GRACE);

        controller.on_status("CA1", &CallStatus::Completed);
        let ended_at = store.get("CA1").unwrap().ended_at;
        assert!(ended_at.is_some());

        controller.on_status("CA1", &CallStatus::Failed);
        assert_eq!(store.get("CA1").unwrap().ended_at, ended_at);
    }

    #[tokio::test]
    async fn unknown_ids_never_raise() {
        let store = Arc::new(CallStore::new());
        let controller = LifecycleController::new(store, GRACE);
        controller.on_status("CA404", &CallStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn terminated_session_is_removed_after_grace() {
        let store = Arc::new(CallStore::new());
        store.create_if_absent("CA1", "+15551234567");
        let controller = LifecycleController::new(Arc::clone(&store), GRACE);

        controller.on_status("CA1", &CallStatus::Completed);
        assert!(store.get("CA1").is_some());

        sleep(GRACE + Duration::from_secs(1)).await;
        tokio::task::yield_now().await;
        assert!(store.get("CA1").is_none());
    }
}
