use crate::orchestrator::CallOrchestrator;

use serde::Serialize;
use time::OffsetDateTime;

/// Environment-derived settings collected once at startup.
pub struct Config {
    pub twilio_account_sid: String,
    pub twilio_auth_token: String,
    pub twilio_phone_number: String,
    pub openai_api_key: String,
    pub deepgram_api_key: String,
    /// Public base URL of this server, used to build webhook callback URLs
    /// for outbound calls.  Must be a publicly reachable https address.
    pub public_base_url: String,
}

pub struct AppState {
    pub config: Config,
    pub http_client: reqwest::Client,
    pub orchestrator: CallOrchestrator,
}

/// Which side of the conversation produced a turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Caller,
    Assistant,
}

/// One utterance in a call's dialogue history.
#[derive(Clone, Debug, Serialize)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub recorded_at: OffsetDateTime,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Terminated,
}

/// Per-call conversation state, keyed by the Twilio call sid.  The turn
/// sequence is chronological and append-only; all mutation goes through the
/// store's id-scoped operations.
#[derive(Clone, Debug, Serialize)]
pub struct CallSession {
    pub id: String,
    pub caller_address: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub ended_at: Option<OffsetDateTime>,
    pub status: SessionStatus,
    pub turns: Vec<Turn>,
}

impl CallSession {
    pub fn new(id: &str, caller_address: &str) -> Self {
        Self {
            id: id.to_string(),
            caller_address: caller_address.to_string(),
            created_at: OffsetDateTime::now_utc(),
            ended_at: None,
            status: SessionStatus::Active,
            turns: vec![],
        }
    }
}
