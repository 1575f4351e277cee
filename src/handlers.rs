use crate::consts::{APP_GREETING, RECORD_TIMEOUT_SECS, TTS_LANGUAGE, TTS_VOICE};
use crate::orchestrator::AssistantTurn;
use crate::outbound;
use crate::twilio_types::{
    wrap_twiml, HangupAction, RecordAction, Response, ResponseAction, SayAction,
    TwilioRecordingPayload, TwilioStatusPayload, TwilioTranscriptionPayload, TwilioVoicePayload,
};
use crate::types::AppState;

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{debug, error, info, trace};

fn say_action(text: &str) -> ResponseAction {
    ResponseAction::Say(SayAction {
        text: text.to_string(),
        voice: Some(TTS_VOICE.to_string()),
        language: Some(TTS_LANGUAGE.to_string()),
    })
}

fn record_action(call_sid: &str) -> ResponseAction {
    ResponseAction::Record(RecordAction {
        action: format!("/twilio/recording/{call_sid}"),
        method: Some("POST".to_string()),
        timeout: Some(RECORD_TIMEOUT_SECS),
    })
}

/// Speak, then record the caller's next utterance.
pub fn gather_twiml(text: &str, call_sid: &str) -> String {
    let response = Response {
        actions: vec![say_action(text), record_action(call_sid)],
    };
    wrap_twiml(xmlserde::xml_serialize(response))
}

/// Speak a closing line and end the call.
fn hangup_twiml(text: &str) -> String {
    let response = Response {
        actions: vec![say_action(text), ResponseAction::Hangup(HangupAction {})],
    };
    wrap_twiml(xmlserde::xml_serialize(response))
}

fn twiml_response(twiml: String) -> (StatusCode, HeaderMap, String) {
    trace!("twiml: '{}'", twiml);
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, "application/xml".parse().unwrap());
    (StatusCode::OK, headers, twiml)
}

/// Incoming-call webhook: greet the caller and start the record loop.
pub async fn voice_webhook(
    State(app_state): State<Arc<AppState>>,
    body: String,
) -> impl IntoResponse {
    trace!(body=%body, "voice request body");
    let payload = match serde_urlencoded::from_str::<TwilioVoicePayload>(&body) {
        Ok(payload) => payload,
        Err(e) => {
            error!(error=%e, "failed to deserialize Twilio voice payload");
            // The caller must still hear something.
            return twiml_response(hangup_twiml(
                "Sorry, there was an error. Please try again later.",
            ));
        }
    };
    info!(call_sid=%payload.call_sid, from=%payload.from, "incoming call");

    app_state
        .orchestrator
        .on_call_started(&payload.call_sid, &payload.from);

    twiml_response(gather_twiml(APP_GREETING, &payload.call_sid))
}

/// Recording-complete webhook: run the captured audio through the pipeline
/// and answer with the assistant's next utterance.
pub async fn recording_webhook(
    State(app_state): State<Arc<AppState>>,
    Path(call_sid): Path<String>,
    body: String,
) -> impl IntoResponse {
    let payload = match serde_urlencoded::from_str::<TwilioRecordingPayload>(&body) {
        Ok(payload) => payload,
        Err(e) => {
            error!(call_sid=%call_sid, error=%e, "failed to deserialize recording payload");
            return twiml_response(hangup_twiml(
                "Sorry, there was an error processing your message.",
            ));
        }
    };
    debug!(call_sid=%call_sid, url=%payload.recording_url, "recording completed");

    match app_state
        .orchestrator
        .on_audio_captured(&call_sid, &payload.recording_url)
        .await
    {
        AssistantTurn::Continue(text) => twiml_response(gather_twiml(&text, &call_sid)),
        AssistantTurn::Close(text) => twiml_response(hangup_twiml(&text)),
    }
}

/// Provider transcription callback: the caller's words arrive as text.  The
/// original webhook exchange is long gone, so the reply is pushed into the
/// live call over the REST API.
pub async fn transcription_webhook(
    State(app_state): State<Arc<AppState>>,
    Path(call_sid): Path<String>,
    body: String,
) -> impl IntoResponse {
    let payload = match serde_urlencoded::from_str::<TwilioTranscriptionPayload>(&body) {
        Ok(payload) => payload,
        Err(e) => {
            error!(call_sid=%call_sid, error=%e, "failed to deserialize transcription payload");
            return (StatusCode::OK, "OK");
        }
    };
    let text = payload.transcription_text.unwrap_or_default();
    debug!(call_sid=%call_sid, transcription=%text, "got transcription callback");
    if text.trim().is_empty() {
        return (StatusCode::OK, "OK");
    }

    let reply = app_state.orchestrator.on_caller_utterance(&call_sid, &text).await;
    let twiml = gather_twiml(&reply, &call_sid);
    if let Err(e) = outbound::respond_to_call(
        &app_state.config,
        &app_state.http_client,
        &call_sid,
        twiml,
    )
    .await
    {
        // Logged only; the webhook exchange itself must not fail.
        error!(call_sid=%call_sid, error=%e, "failed to deliver reply to live call");
    }

    (StatusCode::OK, "OK")
}

/// Call status webhook.
pub async fn status_webhook(
    State(app_state): State<Arc<AppState>>,
    body: String,
) -> impl IntoResponse {
    let payload = match serde_urlencoded::from_str::<TwilioStatusPayload>(&body) {
        Ok(payload) => payload,
        Err(e) => {
            error!(error=%e, "failed to deserialize status payload");
            return (StatusCode::OK, "OK");
        }
    };
    info!(call_sid=%payload.call_sid, status=?payload.call_status, "call status update");

    app_state
        .orchestrator
        .on_status_signal(&payload.call_sid, &payload.call_status);

    (StatusCode::OK, "OK")
}

#[derive(Deserialize)]
pub struct StartCallRequest {
    pub phone_number: String,
}

#[derive(Serialize)]
pub struct StartCallResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_sid: Option<String>,
    pub message: String,
}

/// Kicks off an outbound call to the given number.
pub async fn start_call(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<StartCallRequest>,
) -> impl IntoResponse {
    if request.phone_number.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(StartCallResponse {
                success: false,
                call_sid: None,
                message: "Phone number is required".to_string(),
            }),
        );
    }
    match outbound::start_call(&app_state.config, &app_state.http_client, &request.phone_number)
        .await
    {
        Ok(call_sid) => (
            StatusCode::OK,
            Json(StartCallResponse {
                success: true,
                call_sid: Some(call_sid),
                message: "Call initiated successfully".to_string(),
            }),
        ),
        Err(e) => {
            error!(error=%e, "failed to start call");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(StartCallResponse {
                    success: false,
                    call_sid: None,
                    message: "Failed to start call".to_string(),
                }),
            )
        }
    }
}

/// Diagnostics: all sessions still active.
pub async fn active_calls(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(app_state.orchestrator.active_sessions())
}

pub async fn health() -> impl IntoResponse {
    let timestamp = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default();
    Json(serde_json::json!({ "status": "OK", "timestamp": timestamp }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gather_twiml_speaks_then_records() {
        let twiml = gather_twiml("Hi. How may I help you?", "CA1");
        let say_at = twiml.find("<Say").unwrap();
        let record_at = twiml.find("<Record").unwrap();
        assert!(say_at < record_at);
        assert!(twiml.contains("action=\"/twilio/recording/CA1\""));
    }

    #[test]
    fn hangup_twiml_speaks_then_hangs_up() {
        let twiml = hangup_twiml("Thanks for calling. Goodbye!");
        let say_at = twiml.find("<Say").unwrap();
        let hangup_at = twiml.find("<Hangup").unwrap();
        assert!(say_at < hangup_at);
    }
}
