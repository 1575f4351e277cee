use crate::types::{CallSession, SessionStatus, Speaker, Turn};

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use time::OffsetDateTime;
use tokio::task;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// In-memory table of call sessions, keyed by call sid.
///
/// Every mutating operation is atomic with respect to a single call id; the
/// map lock is only held for synchronous map access, never across an await,
/// so webhooks for different calls never block one another.  Callers get
/// cloned snapshots back, never references into a session's turn sequence.
pub struct CallStore {
    calls: Mutex<HashMap<String, CallSession>>,
    /// Deferred-removal tasks by call sid, kept so a pending removal can be
    /// cancelled instead of racing a timer.
    pending_removals: Mutex<HashMap<String, task::JoinHandle<()>>>,
}

impl CallStore {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(HashMap::new()),
            pending_removals: Mutex::new(HashMap::new()),
        }
    }

    /// Idempotent creation: a duplicate "call started" delivery finds the
    /// existing session and leaves it unchanged.
    pub fn create_if_absent(&self, call_sid: &str, caller_address: &str) -> CallSession {
        let mut calls = self.calls.lock().unwrap();
        if let Some(existing) = calls.get(call_sid) {
            debug!(call_sid=%call_sid, "session already exists, reusing");
            return existing.clone();
        }
        let session = CallSession::new(call_sid, caller_address);
        calls.insert(call_sid.to_string(), session.clone());
        info!(call_sid=%call_sid, caller=%caller_address, "initialized call session");
        session
    }

    /// Appends a turn to a session's history.  A late webhook for an
    /// already-cleaned-up call is expected; unknown ids are a logged no-op.
    pub fn append_turn(&self, call_sid: &str, speaker: Speaker, text: &str) {
        let mut calls = self.calls.lock().unwrap();
        match calls.get_mut(call_sid) {
            Some(session) => {
                session.turns.push(Turn {
                    speaker,
                    text: text.to_string(),
                    recorded_at: OffsetDateTime::now_utc(),
                });
                debug!(call_sid=%call_sid, speaker=?speaker, "appended turn");
            }
            None => {
                warn!(call_sid=%call_sid, "append_turn for unknown call sid, dropping");
            }
        }
    }

    /// Snapshot of a session's ordered turn history; empty for unknown ids.
    pub fn turns(&self, call_sid: &str) -> Vec<Turn> {
        let calls = self.calls.lock().unwrap();
        calls
            .get(call_sid)
            .map(|session| session.turns.clone())
            .unwrap_or_default()
    }

    pub fn get(&self, call_sid: &str) -> Option<CallSession> {
        let calls = self.calls.lock().unwrap();
        calls.get(call_sid).cloned()
    }

    /// Moves a session to terminated and stamps `ended_at`.  No-op if the
    /// session is unknown or already terminated; the transition never
    /// reverses and the timestamp is set exactly once.
    pub fn mark_terminated(&self, call_sid: &str) {
        let mut calls = self.calls.lock().unwrap();
        match calls.get_mut(call_sid) {
            Some(session) if session.status == SessionStatus::Active => {
                session.status = SessionStatus::Terminated;
                session.ended_at = Some(OffsetDateTime::now_utc());
                info!(call_sid=%call_sid, "call session terminated");
            }
            Some(_) => debug!(call_sid=%call_sid, "session already terminated"),
            None => debug!(call_sid=%call_sid, "mark_terminated for unknown call sid"),
        }
    }

    /// Schedules removal of a session after `after` elapses.  The session is
    /// only removed if it is still terminated at that point, and only one
    /// removal is ever pending per call sid, so repeated terminal status
    /// signals have no further effect.
    pub fn schedule_removal(self: &Arc<Self>, call_sid: &str, after: Duration) {
        let mut pending = self.pending_removals.lock().unwrap();
        if pending.contains_key(call_sid) {
            debug!(call_sid=%call_sid, "removal already scheduled");
            return;
        }
        let store = Arc::clone(self);
        let sid = call_sid.to_string();
        let handle = tokio::spawn(async move {
            sleep(after).await;
            {
                let mut calls = store.calls.lock().unwrap();
                let still_terminated = matches!(
                    calls.get(&sid),
                    Some(session) if session.status == SessionStatus::Terminated
                );
                if still_terminated {
                    calls.remove(&sid);
                    info!(call_sid=%sid, "cleaned up call session");
                } else if calls.contains_key(&sid) {
                    debug!(call_sid=%sid, "session active again, keeping");
                }
            }
            store.pending_removals.lock().unwrap().remove(&sid);
        });
        pending.insert(call_sid.to_string(), handle);
        debug!(call_sid=%call_sid, after=?after, "scheduled session removal");
    }

    /// Aborts a pending removal, if any.
    pub fn cancel_removal(&self, call_sid: &str) {
        let mut pending = self.pending_removals.lock().unwrap();
        if let Some(handle) = pending.remove(call_sid) {
            handle.abort();
            debug!(call_sid=%call_sid, "cancelled pending removal");
        }
    }

    /// Snapshot of all sessions still in the active state.
    pub fn list_active(&self) -> Vec<CallSession> {
        let calls = self.calls.lock().unwrap();
        calls
            .values()
            .filter(|session| session.status == SessionStatus::Active)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn creation_is_idempotent() {
        let store = Arc::new(CallStore::new());
        let first = store.create_if_absent("CA1", "+15551234567");
        store.append_turn("CA1", Speaker::Caller, "hello");
        let second = store.create_if_absent("CA1", "+19998887777");

        // The second delivery reuses the first session unchanged.
        assert_eq!(second.caller_address, first.caller_address);
        assert_eq!(store.turns("CA1").len(), 1);
        assert_eq!(store.list_active().len(), 1);
    }

    #[tokio::test]
    async fn unknown_ids_are_silent_noops() {
        let store = Arc::new(CallStore::new());
        store.append_turn("CA404", Speaker::Caller, "anyone there?");
        store.mark_terminated("CA404");
        store.schedule_removal("CA404", Duration::from_secs(1));
        assert!(store.turns("CA404").is_empty());
        assert!(store.get("CA404").is_none());
    }

    #[tokio::test]
    async fn termination_sets_ended_at_once() {
        let store = Arc::new(CallStore::new());
        store.create_if_absent("CA1", "+15551234567");
        assert!(store.get("CA1").unwrap().ended_at.is_none());

        store.mark_terminated("CA1");
        let ended_at = store.get("CA1").unwrap().ended_at;
        assert!(ended_at.is_some());

        store.mark_terminated("CA1");
        assert_eq!(store.get("CA1").unwrap().ended_at, ended_at);
        assert!(store.list_active().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn removal_fires_after_grace_period() {
        let store = Arc::new(CallStore::new());
        store.create_if_absent("CA1", "+15551234567");
        store.mark_terminated("CA1");
        store.schedule_removal("CA1", Duration::from_secs(3_600));

        sleep(Duration::from_secs(3_599)).await;
        assert!(store.get("CA1").is_some());

        sleep(Duration::from_secs(2)).await;
        tokio::task::yield_now().await;
        assert!(store.get("CA1").is_none());
        assert!(store.turns("CA1").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn removal_skips_sessions_not_terminated() {
        let store = Arc::new(CallStore::new());
        store.create_if_absent("CA1", "+15551234567");
        store.schedule_removal("CA1", Duration::from_secs(60));

        sleep(Duration::from_secs(61)).await;
        tokio::task::yield_now().await;
        assert!(store.get("CA1").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_removal_keeps_session() {
        let store = Arc::new(CallStore::new());
        store.create_if_absent("CA1", "+15551234567");
        store.mark_terminated("CA1");
        store.schedule_removal("CA1", Duration::from_secs(60));
        store.cancel_removal("CA1");

        sleep(Duration::from_secs(61)).await;
        tokio::task::yield_now().await;
        assert!(store.get("CA1").is_some());
    }
}
