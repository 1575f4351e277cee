use crate::deepgram_types::PrerecordedResponse;
use crate::error::Error;

use async_trait::async_trait;
use tracing::{debug, error};

/// Turns recorded audio bytes into text.  `Ok(None)` means the provider
/// answered but produced no usable transcript, which callers treat the same
/// as silence.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &[u8]) -> Result<Option<String>, Error>;
}

pub struct DeepgramTranscriber {
    api_key: String,
    http_client: reqwest::Client,
}

impl DeepgramTranscriber {
    pub fn new(api_key: String, http_client: reqwest::Client) -> Self {
        Self {
            api_key,
            http_client,
        }
    }
}

#[async_trait]
impl Transcriber for DeepgramTranscriber {
    async fn transcribe(&self, audio: &[u8]) -> Result<Option<String>, Error> {
        let url = "https://api.deepgram.com/v1/listen";
        let resp = self
            .http_client
            .post(url)
            .query(&[
                ("model", "nova-2"),
                ("language", "en-US"),
                ("smart_format", "true"),
                ("punctuate", "true"),
            ])
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Token {}", self.api_key),
            )
            .header(reqwest::header::CONTENT_TYPE, "audio/mpeg")
            .body(audio.to_vec())
            .send()
            .await
            .map_err(|e| {
                error!(error=%e, "failed to send request to Deepgram");
                Error::Transcription("request to Deepgram failed".to_string())
            })?;
        if !resp.status().is_success() {
            let status = resp.status();
            error!(status=%status, "Deepgram returned non-success status");
            return Err(Error::Transcription(format!("Deepgram returned {status}")));
        }
        let resp = resp.json::<PrerecordedResponse>().await.map_err(|e| {
            error!(error=%e, "failed to deserialize Deepgram response");
            Error::Transcription("Deepgram response deserialization failed".to_string())
        })?;

        let transcript = resp
            .results
            .channels
            .first()
            .and_then(|channel| channel.alternatives.first())
            .map(|alternative| alternative.transcript.trim().to_string())
            .filter(|transcript| !transcript.is_empty());
        debug!(transcript=?transcript, "got transcription result");
        Ok(transcript)
    }
}
