use crate::capture::{AudioFetcher, CapturePipeline, RetryPolicy};
use crate::consts::{
    CLOSING_UTTERANCE, FETCH_BACKOFF, FETCH_MAX_ATTEMPTS, GENERATION_BUDGET, RECORDING_SETTLE,
    REMOVAL_GRACE, REPROMPT_UTTERANCE, TERMINATION_PHRASES,
};
use crate::generation::ConversationGenerator;
use crate::lifecycle::LifecycleController;
use crate::store::CallStore;
use crate::transcription::Transcriber;
use crate::turn::TurnCoordinator;
use crate::twilio_types::CallStatus;
use crate::types::CallSession;

use std::sync::Arc;
use tracing::info;

/// What the assistant should do with the line after an audio turn.
pub enum AssistantTurn {
    /// Speak and record the caller's next utterance.
    Continue(String),
    /// The caller ended the conversation: speak the closing line and hang up.
    Close(String),
}

/// Substring check against the fixed set of call-ending phrases.  This is a
/// heuristic: "that's all I wanted to say, not goodbye yet" matches too.
fn is_termination_phrase(transcript: &str) -> bool {
    let lowered = transcript.to_lowercase();
    TERMINATION_PHRASES
        .iter()
        .any(|phrase| lowered.contains(phrase))
}

/// The boundary the webhook route layer talks to.  One method per webhook
/// kind; every method tolerates retried, late, or out-of-order deliveries.
pub struct CallOrchestrator {
    store: Arc<CallStore>,
    turns: TurnCoordinator,
    capture: CapturePipeline,
    lifecycle: LifecycleController,
}

impl CallOrchestrator {
    pub fn new(
        store: Arc<CallStore>,
        generator: Arc<dyn ConversationGenerator>,
        transcriber: Arc<dyn Transcriber>,
        fetcher: Arc<dyn AudioFetcher>,
    ) -> Self {
        let turns = TurnCoordinator::new(Arc::clone(&store), generator, GENERATION_BUDGET);
        let capture = CapturePipeline::new(
            fetcher,
            transcriber,
            RetryPolicy {
                max_attempts: FETCH_MAX_ATTEMPTS,
                settle: RECORDING_SETTLE,
                backoff: FETCH_BACKOFF,
            },
        );
        let lifecycle = LifecycleController::new(Arc::clone(&store), REMOVAL_GRACE);
        Self {
            store,
            turns,
            capture,
            lifecycle,
        }
    }

    /// First inbound-call signal.  Idempotent; the provider retrying the
    /// very first webhook just finds the session already there.
    pub fn on_call_started(&self, call_sid: &str, caller_address: &str) -> CallSession {
        self.store.create_if_absent(call_sid, caller_address)
    }

    /// A caller utterance already in text form.
    pub async fn on_caller_utterance(&self, call_sid: &str, text: &str) -> String {
        self.turns.next_utterance(call_sid, text).await
    }

    /// A completed recording reference.  Runs the capture pipeline, then
    /// checks for a caller-initiated goodbye before handing the transcript
    /// to the turn coordinator.
    pub async fn on_audio_captured(&self, call_sid: &str, recording_url: &str) -> AssistantTurn {
        let Some(transcript) = self.capture.capture_to_text(recording_url, call_sid).await else {
            return AssistantTurn::Continue(REPROMPT_UTTERANCE.to_string());
        };

        if is_termination_phrase(&transcript) {
            info!(call_sid=%call_sid, "caller ended the conversation");
            self.lifecycle.terminate(call_sid);
            return AssistantTurn::Close(CLOSING_UTTERANCE.to_string());
        }

        AssistantTurn::Continue(self.turns.next_utterance(call_sid, &transcript).await)
    }

    pub fn on_status_signal(&self, call_sid: &str, status: &CallStatus) {
        self.lifecycle.on_status(call_sid, status);
    }

    /// Diagnostics snapshot of all active sessions.
    pub fn active_sessions(&self) -> Vec<CallSession> {
        self.store.list_active()
    }
}
