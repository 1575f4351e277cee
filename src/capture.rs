use crate::error::Error;
use crate::transcription::Transcriber;

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, warn};

/// Downloads the audio bytes behind a recording reference.
#[async_trait]
pub trait AudioFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, Error>;
}

/// Fetches Twilio recordings, which require account credentials.
pub struct RecordingFetcher {
    account_sid: String,
    auth_token: String,
    http_client: reqwest::Client,
}

impl RecordingFetcher {
    pub fn new(account_sid: String, auth_token: String, http_client: reqwest::Client) -> Self {
        Self {
            account_sid,
            auth_token,
            http_client,
        }
    }
}

#[async_trait]
impl AudioFetcher for RecordingFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, Error> {
        let resp = self
            .http_client
            .get(url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .send()
            .await
            .map_err(|e| Error::Fetch(format!("transport error: {e}")))?;
        if !resp.status().is_success() {
            return Err(Error::Fetch(format!("recording GET returned {}", resp.status())));
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| Error::Fetch(format!("failed to read recording body: {e}")))?;
        Ok(bytes.to_vec())
    }
}

/// Fixed-schedule retry: wait `settle` before the first attempt, then retry
/// failed attempts up to `max_attempts` total with `backoff` between them.
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub settle: Duration,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, Error>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        sleep(self.settle).await;
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => break Ok(value),
                Err(e) if attempt < self.max_attempts => {
                    warn!(error=%e, attempt, "{what} attempt failed, retrying");
                    attempt += 1;
                    sleep(self.backoff).await;
                }
                Err(e) => break Err(e),
            }
        }
    }
}

/// Converts a recording reference into caller text.
///
/// The fetch races Twilio's recording finalization, so it runs under the
/// retry policy.  Any failure along the way degrades to `None`; callers
/// treat that like an empty transcript and re-prompt rather than drop the
/// call.
pub struct CapturePipeline {
    fetcher: Arc<dyn AudioFetcher>,
    transcriber: Arc<dyn Transcriber>,
    policy: RetryPolicy,
}

impl CapturePipeline {
    pub fn new(
        fetcher: Arc<dyn AudioFetcher>,
        transcriber: Arc<dyn Transcriber>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            fetcher,
            transcriber,
            policy,
        }
    }

    pub async fn capture_to_text(&self, recording_url: &str, call_sid: &str) -> Option<String> {
        let fetcher = Arc::clone(&self.fetcher);
        let url = recording_url.to_string();
        let audio = self
            .policy
            .run("recording fetch", move || {
                let fetcher = Arc::clone(&fetcher);
                let url = url.clone();
                async move { fetcher.fetch(&url).await }
            })
            .await;
        let audio = match audio {
            Ok(audio) => audio,
            Err(e) => {
                error!(call_sid=%call_sid, error=%e, "audio unavailable");
                return None;
            }
        };
        debug!(call_sid=%call_sid, bytes = audio.len(), "fetched recording");

        match self.transcriber.transcribe(&audio).await {
            Ok(Some(transcript)) if !transcript.trim().is_empty() => Some(transcript),
            Ok(_) => {
                debug!(call_sid=%call_sid, "empty transcript");
                None
            }
            Err(e) => {
                error!(call_sid=%call_sid, error=%e, "transcription failed");
                None
            }
        }
    }
}
