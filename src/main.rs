mod capture;
mod deepgram_types;
mod error;
mod generation;
mod handlers;
mod lifecycle;
mod openai_types;
mod orchestrator;
mod outbound;
mod store;
mod transcription;
mod turn;
mod twilio_types;
mod types;

use crate::capture::RecordingFetcher;
use crate::generation::OpenAiGenerator;
use crate::orchestrator::CallOrchestrator;
use crate::store::CallStore;
use crate::transcription::DeepgramTranscriber;
use crate::types::{AppState, Config};

use axum::{
    routing::{get, post},
    Router,
};
use std::env;
use std::sync::Arc;
use tracing_subscriber::prelude::*;

pub mod consts {
    use std::time::Duration;

    pub const APP_GREETING: &str = "Hello! I'm your AI assistant. How can I help you today?";
    pub const REPROMPT_UTTERANCE: &str = "I didn't catch that, please try again.";
    pub const APOLOGY_UTTERANCE: &str =
        "I'm sorry, I didn't catch that. Could you please repeat?";
    pub const CLOSING_UTTERANCE: &str = "Thanks for calling. Goodbye!";
    pub const SYSTEM_PROMPT: &str = "You are a helpful AI assistant in a phone conversation. \
        Keep your responses concise and conversational, as they will be spoken aloud. \
        Avoid using special characters, numbers should be spelled out, and keep responses \
        under one hundred words. Be friendly, helpful, and natural in your speech patterns.";
    /// Caller phrases that end the conversation, matched case-insensitively
    /// as substrings.
    pub const TERMINATION_PHRASES: &[&str] = &[
        "goodbye",
        "bye",
        "end call",
        "hang up",
        "that's all",
        "nothing else",
    ];
    pub const GENERATION_BUDGET: Duration = Duration::from_secs(5);
    /// Recordings race their own finalization at the provider; give them a
    /// moment before the first fetch attempt.
    pub const RECORDING_SETTLE: Duration = Duration::from_millis(1_000);
    pub const FETCH_BACKOFF: Duration = Duration::from_secs(2);
    pub const FETCH_MAX_ATTEMPTS: u32 = 3;
    /// How long a terminated session stays answerable before removal.
    pub const REMOVAL_GRACE: Duration = Duration::from_secs(3_600);
    pub const RECORD_TIMEOUT_SECS: u16 = 5;
    pub const TTS_VOICE: &str = "Polly.Amy-Neural";
    pub const TTS_LANGUAGE: &str = "en-US";
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let subscriber = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_file(true)
                .with_line_number(true),
        )
        .with(tracing_subscriber::filter::Targets::new().with_targets([
            ("hyper", tracing_subscriber::filter::LevelFilter::OFF),
            ("callbot_rs", tracing_subscriber::filter::LevelFilter::DEBUG),
        ]));
    tracing::subscriber::set_global_default(subscriber).unwrap();

    let config = Config {
        twilio_account_sid: env::var("TWILIO_ACCOUNT_SID").expect("TWILIO_ACCOUNT_SID not set!"),
        twilio_auth_token: env::var("TWILIO_AUTH_TOKEN").expect("TWILIO_AUTH_TOKEN not set!"),
        twilio_phone_number: env::var("TWILIO_PHONE_NUMBER").expect("TWILIO_PHONE_NUMBER not set!"),
        openai_api_key: env::var("OPENAI_API_KEY").expect("OPENAI_API_KEY not set!"),
        deepgram_api_key: env::var("DEEPGRAM_API_KEY").expect("DEEPGRAM_API_KEY not set!"),
        public_base_url: env::var("PUBLIC_BASE_URL").expect("PUBLIC_BASE_URL not set!"),
    };
    let http_client = reqwest::Client::new();

    let store = Arc::new(CallStore::new());
    let orchestrator = CallOrchestrator::new(
        Arc::clone(&store),
        Arc::new(OpenAiGenerator::new(
            config.openai_api_key.clone(),
            http_client.clone(),
        )),
        Arc::new(DeepgramTranscriber::new(
            config.deepgram_api_key.clone(),
            http_client.clone(),
        )),
        Arc::new(RecordingFetcher::new(
            config.twilio_account_sid.clone(),
            config.twilio_auth_token.clone(),
            http_client.clone(),
        )),
    );

    let app_state = Arc::new(AppState {
        config,
        http_client,
        orchestrator,
    });

    let app = Router::new()
        .route("/twilio/voice", post(handlers::voice_webhook))
        .route("/twilio/recording/:call_sid", post(handlers::recording_webhook))
        .route(
            "/twilio/transcription/:call_sid",
            post(handlers::transcription_webhook),
        )
        .route("/twilio/status", post(handlers::status_webhook))
        .route("/start-call", post(handlers::start_call))
        .route("/calls", get(handlers::active_calls))
        .route("/health", get(handlers::health))
        .with_state(app_state);

    let port = env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("0.0.0.0:{port}").parse().unwrap();
    tracing::info!(addr=%addr, "call bot listening");
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await
        .unwrap();
}
