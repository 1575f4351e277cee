use crate::error::Error;
use crate::openai_types::{OpenAIBatchResponse, OpenAIMessage, OpenAIPayload};
use crate::types::{Speaker, Turn};

use async_trait::async_trait;
use tracing::{debug, error};

/// Produces the assistant's next utterance from the conversation so far.
/// The time budget is owned by the turn coordinator, not the implementation.
#[async_trait]
pub trait ConversationGenerator: Send + Sync {
    async fn generate(&self, system_prompt: &str, turns: &[Turn]) -> Result<String, Error>;
}

pub struct OpenAiGenerator {
    api_key: String,
    http_client: reqwest::Client,
}

impl OpenAiGenerator {
    pub fn new(api_key: String, http_client: reqwest::Client) -> Self {
        Self {
            api_key,
            http_client,
        }
    }
}

/// Maps the dialogue history to the chat message list the API expects.
fn conversation_messages(system_prompt: &str, turns: &[Turn]) -> Vec<OpenAIMessage> {
    let mut messages = vec![OpenAIMessage {
        role: "system".to_string(),
        content: system_prompt.to_string(),
    }];
    for turn in turns {
        let role = match turn.speaker {
            Speaker::Caller => "user",
            Speaker::Assistant => "assistant",
        };
        messages.push(OpenAIMessage {
            role: role.to_string(),
            content: turn.text.clone(),
        });
    }
    messages
}

#[async_trait]
impl ConversationGenerator for OpenAiGenerator {
    async fn generate(&self, system_prompt: &str, turns: &[Turn]) -> Result<String, Error> {
        let url = "https://api.openai.com/v1/chat/completions";
        let payload = OpenAIPayload {
            model: "gpt-4o".to_string(),
            messages: conversation_messages(system_prompt, turns),
            // Responses are spoken aloud; keep them short.
            max_tokens: Some(100),
            temperature: Some(0.6),
        };
        let key = self.api_key.as_str();
        let resp = self
            .http_client
            .post(url)
            .header(reqwest::header::AUTHORIZATION, format!("Bearer {key}"))
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                error!(error=%e, "failed to send request to OpenAI");
                Error::Generation("request to OpenAI failed".to_string())
            })?;
        if !resp.status().is_success() {
            let status = resp.status();
            error!(status=%status, "OpenAI returned non-success status");
            return Err(Error::Generation(format!("OpenAI returned {status}")));
        }
        let resp = resp.json::<OpenAIBatchResponse>().await.map_err(|e| {
            error!(error=%e, "failed to deserialize OpenAI response");
            Error::Generation("OpenAI response deserialization failed".to_string())
        })?;
        let choice = resp
            .choices
            .first()
            .ok_or_else(|| Error::Generation("OpenAI response had no choices".to_string()))?;
        debug!(reply=%choice.message.content, "got generated reply");
        Ok(choice.message.content.to_string())
    }
}
