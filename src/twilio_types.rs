pub fn wrap_twiml(twiml: String) -> String {
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>{twiml}")
}

mod twiml {
    use xmlserde_derives::XmlSerialize;

    #[derive(PartialEq, Eq, XmlSerialize)]
    #[xmlserde(root = b"Response")]
    pub struct Response {
        #[xmlserde(ty = "untag")]
        pub actions: Vec<ResponseAction>,
    }

    #[derive(PartialEq, Eq, XmlSerialize)]
    pub enum ResponseAction {
        #[xmlserde(name = b"Say")]
        Say(SayAction),
        #[xmlserde(name = b"Record")]
        Record(RecordAction),
        #[xmlserde(name = b"Hangup")]
        Hangup(HangupAction),
    }

    #[derive(PartialEq, Eq, XmlSerialize, Default)]
    pub struct SayAction {
        #[xmlserde(ty = "text")]
        pub text: String,
        #[xmlserde(name = b"voice", ty = "attr")]
        pub voice: Option<String>,
        #[xmlserde(name = b"language", ty = "attr")]
        pub language: Option<String>,
    }

    /// The `<Record>` verb: capture the caller's next utterance and post the
    /// recording reference to `action`.
    #[derive(PartialEq, Eq, XmlSerialize, Default)]
    pub struct RecordAction {
        #[xmlserde(name = b"action", ty = "attr")]
        pub action: String,
        #[xmlserde(name = b"method", ty = "attr")]
        pub method: Option<String>,
        #[xmlserde(name = b"timeout", ty = "attr")]
        pub timeout: Option<u16>,
    }

    #[derive(PartialEq, Eq, XmlSerialize, Default)]
    pub struct HangupAction {}
}
pub use twiml::*;

mod webhook {
    use serde::Deserialize;

    #[derive(Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
    #[serde(rename_all = "kebab-case")]
    pub enum CallStatus {
        Queued,
        Initiated,
        Ringing,
        InProgress,
        Completed,
        Busy,
        Failed,
        NoAnswer,
        Canceled,
    }

    impl CallStatus {
        /// Whether this status ends a call's life.  Intermediate progress
        /// statuses carry no lifecycle consequence for the orchestrator.
        pub fn is_terminal(&self) -> bool {
            matches!(
                self,
                CallStatus::Completed
                    | CallStatus::Failed
                    | CallStatus::Busy
                    | CallStatus::NoAnswer
            )
        }
    }

    #[derive(Deserialize, Debug)]
    #[serde(rename_all = "kebab-case")]
    pub enum CallDirection {
        Inbound,
        OutboundApi,
        OutboundDial,
    }

    /// Form payload Twilio posts when a call reaches the voice webhook.
    #[allow(dead_code)]
    #[derive(Deserialize, Debug)]
    #[serde(rename_all = "PascalCase")]
    pub struct TwilioVoicePayload {
        pub account_sid: String,
        pub call_sid: String,
        pub call_status: CallStatus,
        pub direction: CallDirection,
        pub from: String,
        pub from_city: Option<String>,
        pub from_country: Option<String>,
        pub from_state: Option<String>,
        pub from_zip: Option<String>,
        pub to: String,
    }

    /// Form payload posted to a `<Record>` verb's action URL once the
    /// recording has been finalized on Twilio's side.
    #[allow(dead_code)]
    #[derive(Deserialize, Debug)]
    #[serde(rename_all = "PascalCase")]
    pub struct TwilioRecordingPayload {
        pub recording_url: String,
        pub recording_sid: Option<String>,
        pub recording_duration: Option<String>,
    }

    /// Form payload for Twilio's own transcription callback.
    #[allow(dead_code)]
    #[derive(Deserialize, Debug)]
    #[serde(rename_all = "PascalCase")]
    pub struct TwilioTranscriptionPayload {
        pub transcription_text: Option<String>,
        pub transcription_status: Option<String>,
        pub recording_sid: Option<String>,
    }

    #[derive(Deserialize, Debug)]
    #[serde(rename_all = "PascalCase")]
    pub struct TwilioStatusPayload {
        pub call_sid: String,
        pub call_status: CallStatus,
    }
}
pub use webhook::*;

mod rest {
    use serde::Deserialize;

    /// Subset of the call resource the REST API returns on call creation.
    #[allow(dead_code)]
    #[derive(Deserialize, Debug)]
    pub struct CallResource {
        pub sid: String,
        pub status: Option<String>,
    }
}
pub use rest::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn say_record_twiml_shape() {
        let response = Response {
            actions: vec![
                ResponseAction::Say(SayAction {
                    text: "Hi there.".to_string(),
                    voice: Some("Polly.Amy-Neural".to_string()),
                    language: Some("en-US".to_string()),
                }),
                ResponseAction::Record(RecordAction {
                    action: "/twilio/recording/CA1".to_string(),
                    method: Some("POST".to_string()),
                    timeout: Some(5),
                }),
            ],
        };
        let twiml = wrap_twiml(xmlserde::xml_serialize(response));
        assert!(twiml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(twiml.contains("Hi there.</Say>"));
        assert!(twiml.contains("action=\"/twilio/recording/CA1\""));
        assert!(twiml.contains("timeout=\"5\""));
    }

    #[test]
    fn hangup_twiml_shape() {
        let response = Response {
            actions: vec![
                ResponseAction::Say(SayAction {
                    text: "Goodbye.".to_string(),
                    ..Default::default()
                }),
                ResponseAction::Hangup(HangupAction {}),
            ],
        };
        let twiml = wrap_twiml(xmlserde::xml_serialize(response));
        assert!(twiml.contains("Goodbye.</Say>"));
        assert!(twiml.contains("<Hangup"));
    }

    #[test]
    fn status_payload_parses_from_form() {
        let payload: TwilioStatusPayload =
            serde_urlencoded::from_str("CallSid=CA1&CallStatus=no-answer&Extra=ignored").unwrap();
        assert_eq!(payload.call_sid, "CA1");
        assert_eq!(payload.call_status, CallStatus::NoAnswer);
        assert!(payload.call_status.is_terminal());
    }

    #[test]
    fn progress_statuses_are_not_terminal() {
        for status in [
            CallStatus::Queued,
            CallStatus::Initiated,
            CallStatus::Ringing,
            CallStatus::InProgress,
            CallStatus::Canceled,
        ] {
            assert!(!status.is_terminal());
        }
        for status in [
            CallStatus::Completed,
            CallStatus::Failed,
            CallStatus::Busy,
            CallStatus::NoAnswer,
        ] {
            assert!(status.is_terminal());
        }
    }
}
