use thiserror::Error;

/// Failure taxonomy for the call orchestrator.
///
/// Collaborator failures (`Fetch`, `Transcription`, `Generation`) are caught
/// at the capture/turn boundaries and converted into spoken fallback
/// utterances; they never fail the webhook exchange itself.  A missing
/// session is not an error anywhere in this crate: late webhooks for
/// already-cleaned-up call ids are an expected race and handled as silent
/// no-ops.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid deployment configuration, e.g. a callback URL Twilio could
    /// never reach.  Fatal for the operation; the call is never placed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Recording download failed (transport error or non-success response).
    /// Retryable per attempt.
    #[error("recording fetch failed: {0}")]
    Fetch(String),

    #[error("transcription failed: {0}")]
    Transcription(String),

    /// Generation provider error, or a response over the time budget.
    #[error("generation failed: {0}")]
    Generation(String),

    /// Twilio REST API failure (call initiation or live-call update).
    #[error("telephony api error: {0}")]
    Provider(String),
}
